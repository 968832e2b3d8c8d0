use std::fmt;

use chrono::{DateTime, Utc};

/// Labels that carry meaning for the stale sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownLabel {
    /// Applied by maintainers to exempt a PR from staleness entirely.
    DoNotStale,
    /// Applied by this tool once a stale warning has been sent.
    StaleWarning,
}

impl KnownLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownLabel::DoNotStale => "do not stale",
            KnownLabel::StaleWarning => "stale-warning",
        }
    }
}

impl fmt::Display for KnownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    EmptyOwner,
    EmptyName,
    InvalidCharacter(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::EmptyOwner => write!(f, "repository owner must not be empty"),
            RepoError::EmptyName => write!(f, "repository name must not be empty"),
            RepoError::InvalidCharacter(part) => {
                write!(f, "'{}' must not contain '/' or whitespace", part)
            }
        }
    }
}

impl std::error::Error for RepoError {}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into().trim().to_string();
        let name = name.into().trim().to_string();

        if owner.is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.is_empty() {
            return Err(RepoError::EmptyName);
        }
        for part in [&owner, &name] {
            if part.contains('/') || part.chars().any(char::is_whitespace) {
                return Err(RepoError::InvalidCharacter(part.clone()));
            }
        }

        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The user who opened a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub login: String,
    /// Public profile email, when the host exposes one.
    pub email: Option<String>,
}

impl Author {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
}

/// Snapshot of an open pull request as listed by the forge.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: Author,
    pub updated_at: DateTime<Utc>,
    pub state: PrState,
    pub labels: Vec<String>,
    pub url: String,
}

impl PullRequest {
    /// Label names are matched case-insensitively, as GitHub does.
    pub fn has_label(&self, name: &str) -> bool {
        self.matching_label(name).is_some()
    }

    /// The label as spelled on the PR, which may differ in case from `name`.
    pub fn matching_label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn has_known_label(&self, label: KnownLabel) -> bool {
        self.has_label(label.as_str())
    }
}

/// What the sweep did with a single pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    WarningCleared,
    Warned,
    Closed,
    Failed,
}

/// Per-run tally reported once every pull request has been examined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub examined: usize,
    pub unchanged: usize,
    pub warnings_cleared: usize,
    pub warned: usize,
    pub closed: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: Outcome) {
        self.examined += 1;
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::WarningCleared => self.warnings_cleared += 1,
            Outcome::Warned => self.warned += 1,
            Outcome::Closed => self.closed += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}
