use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{Octocrab, models, params};
use tracing::{debug, info, warn};

use crate::types::{Author, PrState, PullRequest, Repo};

const PER_PAGE: u8 = 100;

/// Repository host operations the stale sweep depends on.
#[async_trait]
pub trait Forge {
    /// Login of the authenticated user; doubles as a connectivity check.
    async fn authenticated_user(&self) -> Result<String>;

    /// Every open pull request, across all pages.
    async fn open_pull_requests(&self) -> Result<Vec<PullRequest>>;

    async fn add_label(&self, number: u64, label: &str) -> Result<()>;

    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    async fn close_pull_request(&self, number: u64) -> Result<()>;

    /// Public profile email of `login`, if the user exposes one.
    async fn public_email(&self, login: &str) -> Result<Option<String>>;
}

/// [`Forge`] backed by the GitHub REST API for a single repository.
pub struct GitHub {
    client: Octocrab,
    repo: Repo,
}

impl GitHub {
    pub fn new(client: Octocrab, repo: Repo) -> Self {
        Self { client, repo }
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }
}

/// Creates a GitHub client authenticated with a personal access token
/// against `base_url` (github.com or an Enterprise API root).
pub fn setup_github_client(token: &str, base_url: &str) -> Result<Octocrab> {
    Octocrab::builder()
        .base_uri(base_url)
        .with_context(|| format!("Invalid GitHub base URL: '{}'", base_url))?
        .personal_token(token.to_string())
        .build()
        .context("Failed to create GitHub client")
}

fn convert_pull_request(pr: models::pulls::PullRequest) -> Result<PullRequest> {
    let updated_at = pr
        .updated_at
        .or(pr.created_at)
        .with_context(|| format!("PR #{} has no updated or created timestamp", pr.number))?;

    // List responses never carry the author's email; it is looked up per
    // user when a notice is about to be sent.
    let author = pr
        .user
        .map(|user| Author::new(user.login))
        .unwrap_or_else(|| Author::new(""));

    let state = match pr.state {
        Some(models::IssueState::Closed) => PrState::Closed,
        _ => PrState::Open,
    };

    Ok(PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author,
        updated_at,
        state,
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| label.name)
            .collect(),
        url: pr.html_url.map(|url| url.to_string()).unwrap_or_default(),
    })
}

fn collect_page(prs: Vec<models::pulls::PullRequest>, out: &mut Vec<PullRequest>) {
    for pr in prs {
        let number = pr.number;
        match convert_pull_request(pr) {
            Ok(pr) if pr.state == PrState::Open => out.push(pr),
            Ok(_) => debug!(pr = number, "Skipping pull request that is no longer open"),
            Err(e) => warn!(pr = number, error = %e, "Skipping pull request"),
        }
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn authenticated_user(&self) -> Result<String> {
        let user = self
            .client
            .current()
            .user()
            .await
            .context("Failed to retrieve authenticated user")?;
        Ok(user.login)
    }

    async fn open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let mut page_count = 1;
        debug!(repo = %self.repo, page = page_count, "Fetching pull requests");

        let mut page = self
            .client
            .pulls(self.repo.owner(), self.repo.name())
            .list()
            .state(params::State::Open)
            .per_page(PER_PAGE)
            .send()
            .await
            .with_context(|| format!("Failed to list pull requests in {}", self.repo))?;

        let mut prs = Vec::new();
        loop {
            collect_page(std::mem::take(&mut page.items), &mut prs);
            if page.next.is_none() {
                break;
            }

            page_count += 1;
            debug!(repo = %self.repo, page = page_count, "Fetching pull requests");
            match self
                .client
                .get_page::<models::pulls::PullRequest>(&page.next)
                .await
                .with_context(|| format!("Failed to list pull requests in {}", self.repo))?
            {
                Some(next) => page = next,
                None => break,
            }
        }

        info!(repo = %self.repo, count = prs.len(), "Fetched open pull requests");
        Ok(prs)
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        self.client
            .issues(self.repo.owner(), self.repo.name())
            .add_labels(number, &[label.to_string()])
            .await
            .with_context(|| format!("Failed to add label '{}' to PR #{}", label, number))?;
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.client
            .issues(self.repo.owner(), self.repo.name())
            .remove_label(number, label)
            .await
            .with_context(|| format!("Failed to remove label '{}' from PR #{}", label, number))?;
        Ok(())
    }

    async fn close_pull_request(&self, number: u64) -> Result<()> {
        self.client
            .issues(self.repo.owner(), self.repo.name())
            .update(number)
            .state(models::IssueState::Closed)
            .send()
            .await
            .with_context(|| format!("Failed to close PR #{}", number))?;
        Ok(())
    }

    async fn public_email(&self, login: &str) -> Result<Option<String>> {
        let profile = self
            .client
            .users(login)
            .profile()
            .await
            .with_context(|| format!("Failed to look up GitHub user '{}'", login))?;
        Ok(profile.email.filter(|email| !email.is_empty()))
    }
}
