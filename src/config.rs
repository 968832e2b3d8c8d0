use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    notify::{SmtpSettings, TlsPolicy},
    policy::PolicyConfig,
    types::Repo,
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Parser, Debug)]
#[command(
    name = "stalepr",
    about = "Warn the authors of inactive pull requests by email, then close the PRs if they stay inactive"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct ConfigArgs {
    /// GitHub API token
    #[arg(
        long,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help_heading = "GitHub",
        value_name = "TOKEN"
    )]
    pub github_token: String,

    /// GitHub API base URL (e.g. https://api.github.com/)
    #[arg(long, env = "GITHUB_BASE_URL", help_heading = "GitHub", value_name = "URL")]
    pub github_base_url: String,

    /// Repository owner
    #[arg(long, env = "GITHUB_OWNER", help_heading = "GitHub")]
    pub owner: String,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO", help_heading = "GitHub")]
    pub repo: String,

    /// Days without activity after which a PR is stale
    #[arg(
        long,
        env = "DAYS_INACTIVE",
        value_parser = clap::value_parser!(u32).range(1..),
        help_heading = "Policy",
        value_name = "DAYS"
    )]
    pub days_inactive: u32,

    /// Days a warned PR may stay stale before it is closed
    #[arg(
        long,
        env = "WARNING_PERIOD",
        value_parser = clap::value_parser!(u32).range(1..),
        help_heading = "Policy",
        value_name = "DAYS"
    )]
    pub warning_period: u32,

    /// Fallback email domain, used when an author has no public email
    #[arg(
        long,
        env = "EMAIL_DOMAIN",
        default_value = DEFAULT_EMAIL_DOMAIN,
        help_heading = "Policy",
        value_name = "DOMAIN"
    )]
    pub email_domain: String,

    /// SMTP server address
    #[arg(long, env = "SMTP_SERVER", help_heading = "SMTP", value_name = "HOST")]
    pub smtp_server: String,

    /// SMTP server port
    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT, help_heading = "SMTP")]
    pub smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "SMTP_USER", help_heading = "SMTP")]
    pub smtp_user: String,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true, help_heading = "SMTP")]
    pub smtp_password: String,

    /// Transport encryption for the SMTP session
    #[arg(
        long,
        env = "SMTP_TLS",
        value_enum,
        default_value_t = TlsPolicy::Opportunistic,
        help_heading = "SMTP"
    )]
    pub smtp_tls: TlsPolicy,

    /// Sender address (defaults to the SMTP username)
    #[arg(long, env = "SMTP_FROM", help_heading = "SMTP", value_name = "ADDRESS")]
    pub from: Option<String>,

    /// Log what would happen without changing labels, closing PRs or sending mail
    #[arg(
        long,
        env = "DRY_RUN",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

impl ConfigArgs {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("--github-token", &self.github_token),
            ("--github-base-url", &self.github_base_url),
            ("--owner", &self.owner),
            ("--repo", &self.repo),
            ("--smtp-server", &self.smtp_server),
            ("--smtp-user", &self.smtp_user),
            ("--smtp-password", &self.smtp_password),
            ("--email-domain", &self.email_domain),
        ];
        for (flag, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Missing required parameter {}", flag);
            }
        }

        let base_url = url::Url::parse(&self.github_base_url)
            .with_context(|| format!("Invalid GitHub base URL: '{}'", self.github_base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            anyhow::bail!(
                "GitHub base URL must use http or https, got: '{}'",
                self.github_base_url
            );
        }

        if self.email_domain.contains('@') {
            anyhow::bail!(
                "Email domain must not contain '@', got: '{}'",
                self.email_domain
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub token: String,
    pub base_url: String,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub repo: Repo,
    pub github: GitHubSettings,
    pub policy: PolicyConfig,
    pub smtp: SmtpSettings,
    pub dry_run: bool,
}

fn build_settings(args: ConfigArgs) -> Result<Settings> {
    args.validate()?;

    let repo = Repo::new(&args.owner, &args.repo).map_err(|e| {
        anyhow::anyhow!(
            "Invalid repository '{}/{}': {}",
            args.owner,
            args.repo,
            e
        )
    })?;

    Ok(Settings {
        repo,
        github: GitHubSettings {
            token: args.github_token,
            base_url: args.github_base_url,
        },
        policy: PolicyConfig {
            inactivity_days: args.days_inactive,
            warning_period_days: args.warning_period,
            fallback_email_domain: args.email_domain.trim().to_string(),
        },
        smtp: SmtpSettings {
            host: args.smtp_server,
            port: args.smtp_port,
            username: args.smtp_user,
            password: args.smtp_password,
            from: args.from.filter(|from| !from.trim().is_empty()),
            tls: args.smtp_tls,
        },
        dry_run: args.dry_run,
    })
}

/// Parses command-line arguments, falling back to environment variables for
/// anything not given as a flag, and validates the result.
pub fn parse_args<I, T>(args: I) -> Result<Settings>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = ConfigArgs::try_parse_from(args)?;
    build_settings(args)
}
