//! Stale pull request policy.
//!
//! [`evaluate`] is a pure function of one pull request snapshot, the policy
//! thresholds and the time the run started. Executing the resulting
//! [`Decision`] is left to [`crate::sweep`].

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::types::{KnownLabel, PullRequest};

/// Thresholds for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Days without activity after which a PR is stale.
    pub inactivity_days: u32,
    /// Days a warned PR may stay stale before it is closed.
    pub warning_period_days: u32,
    /// Domain used to synthesise an author address when none is public.
    pub fallback_email_domain: String,
}

impl PolicyConfig {
    pub fn inactivity(&self) -> Duration {
        Duration::days(i64::from(self.inactivity_days))
    }

    pub fn warning_period(&self) -> Duration {
        Duration::days(i64::from(self.warning_period_days))
    }

    /// PRs last updated strictly before this instant are stale.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.inactivity()
    }
}

/// Why a PR is left alone or only has its warning cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    OptedOut,
    Active,
    WithinGracePeriod,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::OptedOut => write!(f, "opted out with '{}'", KnownLabel::DoNotStale),
            Reason::Active => write!(f, "active"),
            Reason::WithinGracePeriod => write!(f, "still within the warning period"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ignore(Reason),
    RemoveWarning(Reason),
    Warn,
    Close,
}

/// Decides what to do with `pr`.
///
/// Opt-out wins over everything, then activity, then the warning state.
/// The grace period is measured from the PR's last update rather than from
/// when the warning label was applied.
pub fn evaluate(pr: &PullRequest, policy: &PolicyConfig, now: DateTime<Utc>) -> Decision {
    let warned = pr.has_known_label(KnownLabel::StaleWarning);

    if pr.has_known_label(KnownLabel::DoNotStale) {
        return if warned {
            Decision::RemoveWarning(Reason::OptedOut)
        } else {
            Decision::Ignore(Reason::OptedOut)
        };
    }

    if pr.updated_at >= policy.stale_cutoff(now) {
        return if warned {
            Decision::RemoveWarning(Reason::Active)
        } else {
            Decision::Ignore(Reason::Active)
        };
    }

    if !warned {
        return Decision::Warn;
    }

    if now - pr.updated_at > policy.warning_period() {
        Decision::Close
    } else {
        Decision::Ignore(Reason::WithinGracePeriod)
    }
}
