use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use tracing::{debug, error, info, warn};

use crate::{
    github::Forge,
    notify::{Mailer, Notice},
    policy::{Decision, PolicyConfig, Reason, evaluate},
    recipient::resolve_recipient,
    types::{KnownLabel, Outcome, PullRequest, RunSummary},
};

/// Runs one stale sweep over every open pull request.
///
/// Listing the pull requests is the only fatal step. Failures while acting
/// on an individual PR are logged and counted, and the sweep moves on. With
/// `dry_run` set, decisions are logged but nothing is mutated or sent.
pub async fn run<F, M>(
    forge: &F,
    mailer: &M,
    policy: &PolicyConfig,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<RunSummary>
where
    F: Forge + Sync,
    M: Mailer + Sync + ?Sized,
{
    let prs = forge
        .open_pull_requests()
        .await
        .context("Failed to fetch open pull requests")?;

    info!(
        count = prs.len(),
        cutoff = %policy.stale_cutoff(now),
        dry_run,
        "Starting stale sweep"
    );

    let sweep = Sweep {
        forge,
        mailer,
        policy,
        now,
        dry_run,
    };

    let mut summary = RunSummary {
        dry_run,
        ..RunSummary::default()
    };
    for pr in &prs {
        summary.record(sweep.process(pr).await);
    }

    Ok(summary)
}

struct Sweep<'a, F, M: ?Sized> {
    forge: &'a F,
    mailer: &'a M,
    policy: &'a PolicyConfig,
    now: DateTime<Utc>,
    dry_run: bool,
}

impl<F, M> Sweep<'_, F, M>
where
    F: Forge + Sync,
    M: Mailer + Sync + ?Sized,
{
    async fn process(&self, pr: &PullRequest) -> Outcome {
        info!(
            pr = pr.number,
            title = %pr.title,
            updated = %HumanTime::from(pr.updated_at - self.now),
            "Processing pull request"
        );

        match evaluate(pr, self.policy, self.now) {
            Decision::Ignore(reason) => {
                info!(pr = pr.number, "No action: {}", reason);
                Outcome::Unchanged
            }
            Decision::RemoveWarning(reason) => self.clear_warning(pr, reason).await,
            Decision::Warn => self.warn(pr).await,
            Decision::Close => self.close(pr).await,
        }
    }

    async fn clear_warning(&self, pr: &PullRequest, reason: Reason) -> Outcome {
        let label = pr
            .matching_label(KnownLabel::StaleWarning.as_str())
            .unwrap_or(KnownLabel::StaleWarning.as_str());

        if self.dry_run {
            info!(pr = pr.number, label, "Dry run: would remove label ({})", reason);
            return Outcome::WarningCleared;
        }

        match self.forge.remove_label(pr.number, label).await {
            Ok(()) => {
                info!(pr = pr.number, label, "Removed label ({})", reason);
                Outcome::WarningCleared
            }
            Err(e) => {
                error!(pr = pr.number, label, error = %format!("{e:#}"), "Failed to remove label");
                Outcome::Failed
            }
        }
    }

    async fn warn(&self, pr: &PullRequest) -> Outcome {
        let label = KnownLabel::StaleWarning.as_str();

        if self.dry_run {
            info!(pr = pr.number, label, "Dry run: would send stale warning and add label");
            return Outcome::Warned;
        }

        if let Err(e) = self.notify(pr, &Notice::stale_warning(pr)).await {
            error!(pr = pr.number, error = %format!("{e:#}"), "Failed to send stale warning");
            return Outcome::Failed;
        }

        match self.forge.add_label(pr.number, label).await {
            Ok(()) => {
                info!(pr = pr.number, label, "Warned author and added label");
                Outcome::Warned
            }
            Err(e) => {
                error!(pr = pr.number, label, error = %format!("{e:#}"), "Failed to add label");
                Outcome::Failed
            }
        }
    }

    async fn close(&self, pr: &PullRequest) -> Outcome {
        if self.dry_run {
            info!(pr = pr.number, "Dry run: would close and notify author");
            return Outcome::Closed;
        }

        if let Err(e) = self.forge.close_pull_request(pr.number).await {
            error!(pr = pr.number, error = %format!("{e:#}"), "Failed to close pull request");
            return Outcome::Failed;
        }
        info!(pr = pr.number, "Closed pull request after the warning period");

        // The close stands even if the author cannot be told about it.
        if let Err(e) = self.notify(pr, &Notice::closed(pr)).await {
            error!(pr = pr.number, error = %format!("{e:#}"), "Failed to send closure notice");
        }
        Outcome::Closed
    }

    /// Sends `notice` to the PR author. An author without a usable address
    /// is logged and skipped rather than treated as a failure.
    async fn notify(&self, pr: &PullRequest, notice: &Notice) -> Result<()> {
        let Some(recipient) = self.recipient(pr).await else {
            warn!(
                pr = pr.number,
                login = %pr.author.login,
                "Email could not be determined for author; skipping notice"
            );
            return Ok(());
        };

        info!(pr = pr.number, recipient = %recipient, subject = %notice.subject, "Sending email");
        self.mailer.send(&recipient, notice).await
    }

    async fn recipient(&self, pr: &PullRequest) -> Option<String> {
        let mut author = pr.author.clone();

        if author.email.is_none() && !author.login.is_empty() {
            match self.forge.public_email(&author.login).await {
                Ok(email) => author.email = email,
                Err(e) => warn!(
                    pr = pr.number,
                    login = %author.login,
                    error = %format!("{e:#}"),
                    "Public email lookup failed; using fallback domain"
                ),
            }
        }

        let recipient = resolve_recipient(&author, &self.policy.fallback_email_domain);
        if let Some(address) = &recipient {
            debug!(login = %author.login, address = %address, public = author.email.is_some(), "Resolved recipient");
        }
        recipient
    }
}
