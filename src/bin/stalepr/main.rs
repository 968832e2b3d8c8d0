mod display;

use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use display::write_summary;
use stalepr::{Forge, GitHub, Settings, mailer_for, parse_args, run, setup_github_client};
use tracing::{debug, error, info};

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn sweep(settings: Settings) -> anyhow::Result<()> {
    let client = setup_github_client(&settings.github.token, &settings.github.base_url)?;
    let github = GitHub::new(client, settings.repo.clone());

    let login = github
        .authenticated_user()
        .await
        .context("GitHub connection test failed")?;
    info!(user = %login, base_url = %settings.github.base_url, "Authenticated with GitHub");

    let mailer = mailer_for(&settings.smtp, settings.dry_run)?;

    let summary = run(
        &github,
        mailer.as_ref(),
        &settings.policy,
        Utc::now(),
        settings.dry_run,
    )
    .await?;

    write_summary(github.repo(), &summary, &mut std::io::stdout())?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Loaded before tracing so RUST_LOG may come from .env too.
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => error!(error = %e, "Failed to load .env file"),
    }

    let settings = match parse_args(std::env::args()) {
        Ok(settings) => settings,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            }
            error!("Invalid configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        repo = %settings.repo,
        days_inactive = settings.policy.inactivity_days,
        warning_period = settings.policy.warning_period_days,
        smtp_tls = settings.smtp.tls.as_str(),
        "Starting stale pull request sweep"
    );

    match sweep(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
