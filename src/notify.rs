//! Email notifications to pull request authors.
//!
//! [`Notice`] renders the two fixed templates. [`Mailer`] is the delivery
//! seam; [`SmtpMailer`] implements it over SMTP with an explicit
//! [`TlsPolicy`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::types::PullRequest;

/// How the SMTP session negotiates transport encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TlsPolicy {
    /// Abort delivery unless STARTTLS succeeds.
    Required,
    /// Use STARTTLS when the server offers it, otherwise continue in clear text.
    #[default]
    Opportunistic,
    /// Never upgrade the connection.
    Never,
}

impl TlsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsPolicy::Required => "required",
            TlsPolicy::Opportunistic => "opportunistic",
            TlsPolicy::Never => "never",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; the SMTP username is used when absent.
    pub from: Option<String>,
    pub tls: TlsPolicy,
}

impl SmtpSettings {
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

/// A plain-text message addressed to a pull request author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn stale_warning(pr: &PullRequest) -> Self {
        Self {
            subject: format!("Your pull request #{} is stale", pr.number),
            body: format!(
                "Hello {},\n\n\
                 Your pull request #{} has been inactive for a while. Please update it \
                 within the next few days, or it may be closed.\n\n\
                 PR Link: {}\n\n\
                 Best regards,\n\
                 The Bot",
                pr.author.login, pr.number, pr.url
            ),
        }
    }

    pub fn closed(pr: &PullRequest) -> Self {
        Self {
            subject: format!("Your pull request #{} has been closed", pr.number),
            body: format!(
                "Hello {},\n\n\
                 Your pull request #{} has been closed due to inactivity.\n\n\
                 PR Link: {}\n\n\
                 If you wish to continue working, please feel free to reopen it or \
                 submit a new pull request.\n\n\
                 Best regards,\n\
                 The Bot",
                pr.author.login, pr.number, pr.url
            ),
        }
    }
}

/// Delivers a notice to a single recipient.
#[async_trait]
pub trait Mailer {
    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from: Mailbox = settings
            .sender()
            .parse()
            .with_context(|| format!("Invalid sender address: '{}'", settings.sender()))?;

        let tls = match settings.tls {
            TlsPolicy::Required => Tls::Required(tls_parameters(&settings.host)?),
            TlsPolicy::Opportunistic => {
                warn!(
                    host = %settings.host,
                    "SMTP TLS is opportunistic; credentials and mail may be sent in clear text if the server does not offer STARTTLS"
                );
                Tls::Opportunistic(tls_parameters(&settings.host)?)
            }
            TlsPolicy::Never => {
                warn!(
                    host = %settings.host,
                    "SMTP TLS is disabled; credentials and mail are sent in clear text"
                );
                Tls::None
            }
        };

        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(tls)
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }
}

/// Stands in for SMTP delivery during a dry run.
pub struct DryRunMailer;

#[async_trait]
impl Mailer for DryRunMailer {
    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
        info!(recipient, subject = %notice.subject, "Dry run: not sending email");
        Ok(())
    }
}

/// Builds the mailer for a run. A dry run never touches the SMTP settings,
/// so an unusable sender or TLS setup does not stop it from starting.
pub fn mailer_for(settings: &SmtpSettings, dry_run: bool) -> Result<Box<dyn Mailer + Send + Sync>> {
    if dry_run {
        return Ok(Box::new(DryRunMailer));
    }
    Ok(Box::new(SmtpMailer::new(settings)?))
}

fn tls_parameters(host: &str) -> Result<TlsParameters> {
    TlsParameters::new(host.to_string())
        .with_context(|| format!("Failed to configure TLS for SMTP server '{}'", host))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, notice: &Notice) -> Result<()> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address: '{}'", recipient))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notice.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body.clone())
            .context("Failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("Failed to send email via SMTP")?;

        info!(recipient, subject = %notice.subject, "Email sent");
        Ok(())
    }
}
