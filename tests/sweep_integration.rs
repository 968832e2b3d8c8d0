use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use stalepr::{
    Author, Forge, Mailer, Notice, PolicyConfig, PrState, PullRequest, RunSummary, SmtpSettings,
    TlsPolicy, mailer_for, run,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    AddLabel(u64, String),
    RemoveLabel(u64, String),
    Close(u64),
    LookupEmail(String),
}

/// Forge that serves canned PRs and records every call.
#[derive(Default)]
struct MockForge {
    prs: Vec<PullRequest>,
    fail_listing: bool,
    fail_close: HashSet<u64>,
    fail_add_label: HashSet<u64>,
    fail_remove_label: HashSet<u64>,
    public_emails: HashMap<String, String>,
    calls: Mutex<Vec<Call>>,
}

impl MockForge {
    fn new(prs: Vec<PullRequest>) -> Self {
        Self {
            prs,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change state on the host; email lookups are read-only.
    fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::LookupEmail(_)))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Forge for MockForge {
    async fn authenticated_user(&self) -> Result<String> {
        Ok("stale-bot".to_string())
    }

    async fn open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        if self.fail_listing {
            anyhow::bail!("401 Bad credentials");
        }
        Ok(self.prs.clone())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(Call::AddLabel(number, label.to_string()));
        if self.fail_add_label.contains(&number) {
            anyhow::bail!("label add rejected");
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(Call::RemoveLabel(number, label.to_string()));
        if self.fail_remove_label.contains(&number) {
            anyhow::bail!("label remove rejected");
        }
        Ok(())
    }

    async fn close_pull_request(&self, number: u64) -> Result<()> {
        self.record(Call::Close(number));
        if self.fail_close.contains(&number) {
            anyhow::bail!("close rejected");
        }
        Ok(())
    }

    async fn public_email(&self, login: &str) -> Result<Option<String>> {
        self.record(Call::LookupEmail(login.to_string()));
        Ok(self.public_emails.get(login).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentMail {
    recipient: String,
    subject: String,
}

/// Mailer that records attempts and fails for chosen recipients.
#[derive(Default)]
struct MockMailer {
    failing_recipients: HashSet<String>,
    attempts: Mutex<Vec<SentMail>>,
}

impl MockMailer {
    fn failing_for(recipient: &str) -> Self {
        Self {
            failing_recipients: HashSet::from([recipient.to_string()]),
            ..Self::default()
        }
    }

    fn attempts(&self) -> Vec<SentMail> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
        self.attempts.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: notice.subject.clone(),
        });
        if self.failing_recipients.contains(recipient) {
            anyhow::bail!("554 Transaction failed");
        }
        Ok(())
    }
}

fn policy() -> PolicyConfig {
    PolicyConfig {
        inactivity_days: 30,
        warning_period_days: 7,
        fallback_email_domain: "example.com".to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn pr(number: u64, login: &str, updated_at: DateTime<Utc>, labels: &[&str]) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change {number}"),
        author: Author::new(login),
        updated_at,
        state: PrState::Open,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        url: format!("https://github.com/owner/repo/pull/{number}"),
    }
}

async fn sweep(forge: &MockForge, mailer: &MockMailer) -> RunSummary {
    run(forge, mailer, &policy(), now(), false).await.unwrap()
}

#[tokio::test]
async fn test_stale_pr_is_warned_and_labelled() {
    let forge = MockForge::new(vec![pr(12, "Bob", date(2024, 4, 1), &[])]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(
        mailer.attempts(),
        vec![SentMail {
            recipient: "bob@example.com".to_string(),
            subject: "Your pull request #12 is stale".to_string(),
        }]
    );
    assert_eq!(
        forge.mutations(),
        vec![Call::AddLabel(12, "stale-warning".to_string())]
    );
    assert_eq!(summary.warned, 1);
    assert_eq!(summary.examined, 1);
}

#[tokio::test]
async fn test_failed_warning_does_not_add_label() {
    let forge = MockForge::new(vec![pr(12, "bob", date(2024, 4, 1), &[])]);
    let mailer = MockMailer::failing_for("bob@example.com");

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(mailer.attempts().len(), 1);
    assert!(forge.mutations().is_empty());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.warned, 0);
}

#[tokio::test]
async fn test_label_failure_after_warning_counts_as_failed() {
    let mut forge = MockForge::new(vec![pr(12, "bob", date(2024, 4, 1), &[])]);
    forge.fail_add_label.insert(12);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(mailer.attempts().len(), 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_warned_pr_past_grace_period_is_closed_and_author_notified() {
    let forge = MockForge::new(vec![pr(12, "bob", date(2024, 4, 1), &["stale-warning"])]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(forge.mutations(), vec![Call::Close(12)]);
    assert_eq!(
        mailer.attempts(),
        vec![SentMail {
            recipient: "bob@example.com".to_string(),
            subject: "Your pull request #12 has been closed".to_string(),
        }]
    );
    assert_eq!(summary.closed, 1);
}

#[tokio::test]
async fn test_failed_close_sends_no_notice() {
    let mut forge = MockForge::new(vec![pr(12, "bob", date(2024, 4, 1), &["stale-warning"])]);
    forge.fail_close.insert(12);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(forge.mutations(), vec![Call::Close(12)]);
    assert!(mailer.attempts().is_empty());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.closed, 0);
}

#[tokio::test]
async fn test_close_stands_when_notice_fails() {
    let forge = MockForge::new(vec![pr(12, "bob", date(2024, 4, 1), &["stale-warning"])]);
    let mailer = MockMailer::failing_for("bob@example.com");

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(forge.mutations(), vec![Call::Close(12)]);
    assert_eq!(mailer.attempts().len(), 1);
    assert_eq!(summary.closed, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_active_pr_with_warning_has_label_removed() {
    let forge = MockForge::new(vec![pr(13, "carol", date(2024, 5, 30), &["stale-warning"])]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(
        forge.mutations(),
        vec![Call::RemoveLabel(13, "stale-warning".to_string())]
    );
    assert!(mailer.attempts().is_empty());
    assert_eq!(summary.warnings_cleared, 1);
}

#[tokio::test]
async fn test_active_pr_without_warning_is_untouched() {
    let forge = MockForge::new(vec![pr(13, "carol", now() - Duration::days(30), &[])]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert!(forge.calls().is_empty());
    assert!(mailer.attempts().is_empty());
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn test_opted_out_pr_only_has_warning_removed() {
    let forge = MockForge::new(vec![
        pr(14, "dave", date(2023, 1, 1), &["do not stale", "stale-warning"]),
        pr(15, "erin", date(2023, 1, 1), &["Do Not Stale"]),
    ]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(
        forge.calls(),
        vec![Call::RemoveLabel(14, "stale-warning".to_string())]
    );
    assert!(mailer.attempts().is_empty());
    assert_eq!(summary.warnings_cleared, 1);
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn test_label_removed_with_its_own_spelling() {
    let forge = MockForge::new(vec![pr(16, "frank", date(2024, 5, 30), &["Stale-Warning"])]);
    let mailer = MockMailer::default();

    sweep(&forge, &mailer).await;

    assert_eq!(
        forge.mutations(),
        vec![Call::RemoveLabel(16, "Stale-Warning".to_string())]
    );
}

#[tokio::test]
async fn test_warned_pr_within_grace_period_is_untouched() {
    let forge = MockForge::new(vec![pr(
        17,
        "grace",
        now() - Duration::days(40),
        &["stale-warning"],
    )]);
    let mailer = MockMailer::default();
    let policy = PolicyConfig {
        warning_period_days: 45,
        ..policy()
    };

    let summary = run(&forge, &mailer, &policy, now(), false).await.unwrap();

    assert!(forge.calls().is_empty());
    assert!(mailer.attempts().is_empty());
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn test_public_email_preferred_over_fallback() {
    let mut forge = MockForge::new(vec![pr(18, "Heidi", date(2024, 4, 1), &[])]);
    forge
        .public_emails
        .insert("Heidi".to_string(), "heidi@personal.test".to_string());
    let mailer = MockMailer::default();

    sweep(&forge, &mailer).await;

    assert_eq!(mailer.attempts()[0].recipient, "heidi@personal.test");
    assert_eq!(forge.calls()[0], Call::LookupEmail("Heidi".to_string()));
}

#[tokio::test]
async fn test_author_without_login_is_labelled_without_mail() {
    let forge = MockForge::new(vec![pr(19, "", date(2024, 4, 1), &[])]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert!(mailer.attempts().is_empty());
    assert_eq!(
        forge.calls(),
        vec![Call::AddLabel(19, "stale-warning".to_string())]
    );
    assert_eq!(summary.warned, 1);
}

#[tokio::test]
async fn test_failure_on_one_pr_does_not_stop_the_sweep() {
    let mut forge = MockForge::new(vec![
        pr(20, "ivan", date(2024, 5, 30), &["stale-warning"]),
        pr(21, "judy", date(2024, 4, 1), &["stale-warning"]),
        pr(22, "mallory", date(2024, 4, 1), &[]),
    ]);
    forge.fail_remove_label.insert(20);
    forge.fail_close.insert(21);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(
        forge.mutations(),
        vec![
            Call::RemoveLabel(20, "stale-warning".to_string()),
            Call::Close(21),
            Call::AddLabel(22, "stale-warning".to_string()),
        ]
    );
    assert_eq!(summary.examined, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.warned, 1);
}

#[tokio::test]
async fn test_listing_failure_aborts_the_run() {
    let mut forge = MockForge::new(vec![pr(23, "oscar", date(2024, 4, 1), &[])]);
    forge.fail_listing = true;
    let mailer = MockMailer::default();

    let err = run(&forge, &mailer, &policy(), now(), false)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Bad credentials"));
    assert!(forge.calls().is_empty());
    assert!(mailer.attempts().is_empty());
}

#[tokio::test]
async fn test_dry_run_mutates_nothing() {
    let forge = MockForge::new(vec![
        pr(24, "peggy", date(2024, 4, 1), &[]),
        pr(25, "trent", date(2024, 4, 1), &["stale-warning"]),
        pr(26, "victor", date(2024, 5, 30), &["stale-warning"]),
    ]);
    let mailer = MockMailer::default();

    let summary = run(&forge, &mailer, &policy(), now(), true).await.unwrap();

    assert!(forge.mutations().is_empty());
    assert!(mailer.attempts().is_empty());
    assert!(summary.dry_run);
    assert_eq!(summary.warned, 1);
    assert_eq!(summary.closed, 1);
    assert_eq!(summary.warnings_cleared, 1);
}

#[tokio::test]
async fn test_dry_run_starts_without_usable_smtp_settings() {
    let settings = SmtpSettings {
        host: "smtp.example.com".to_string(),
        port: 587,
        username: "stale-bot".to_string(),
        password: "secret".to_string(),
        from: None,
        tls: TlsPolicy::Opportunistic,
    };
    let mailer = mailer_for(&settings, true).unwrap();
    let forge = MockForge::new(vec![pr(27, "walter", date(2024, 4, 1), &[])]);

    let summary = run(&forge, mailer.as_ref(), &policy(), now(), true)
        .await
        .unwrap();

    assert!(forge.calls().is_empty());
    assert_eq!(summary.warned, 1);
}

#[tokio::test]
async fn test_no_open_pull_requests() {
    let forge = MockForge::new(vec![]);
    let mailer = MockMailer::default();

    let summary = sweep(&forge, &mailer).await;

    assert_eq!(summary, RunSummary::default());
}
