//! Stalepr: stale pull request sweeper.
//!
//! Scans a repository's open pull requests, emails the authors of inactive
//! ones a one-time warning recorded as a `stale-warning` label, and closes
//! PRs that remain inactive past the warning period. PRs labelled
//! `do not stale` are exempt.

pub mod config;
pub mod github;
pub mod notify;
pub mod policy;
pub mod recipient;
pub mod sweep;
pub mod types;

pub use config::{Settings, parse_args};
pub use github::{Forge, GitHub, setup_github_client};
pub use notify::{DryRunMailer, Mailer, Notice, SmtpMailer, SmtpSettings, TlsPolicy, mailer_for};
pub use policy::{Decision, PolicyConfig, Reason, evaluate};
pub use recipient::resolve_recipient;
pub use sweep::run;
pub use types::{Author, KnownLabel, Outcome, PrState, PullRequest, Repo, RepoError, RunSummary};
