//! Embeds build information for `stalepr --version`.
//!
//! `BUILD_INFO_HUMAN` is `<crate version> (<git version>) <rustc version>`,
//! where the git version is `git describe --tags --always --dirty` when a
//! tag is reachable, and `v<crate version>-<timestamp>-<commit>[+dirty]`
//! otherwise. Components that cannot be determined are left out.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    let version = env!("CARGO_PKG_VERSION");
    let build_info = [
        Some(version.to_string()),
        git_version(version).map(|v| format!("({v})")),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={build_info}");
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn git(args: &[&str]) -> Option<String> {
    command_output("git", args)
}

/// `None` when git is unavailable or this is not a checkout.
fn is_dirty() -> Option<bool> {
    let status = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let status = String::from_utf8_lossy(&status.stdout);

    // `cargo install --git` drops .cargo-ok into the checkout.
    Some(
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .any(|path| path != ".cargo-ok"),
    )
}

fn git_version(version: &str) -> Option<String> {
    let described = git(&["describe", "--tags", "--always", "--dirty"])?;
    if described.contains('v') || described.contains("-g") {
        return Some(described);
    }

    let commit = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = is_dirty().unwrap_or(false);

    // Clean builds are stamped with the commit time so they are reproducible.
    let timestamp = if dirty {
        None
    } else {
        git(&["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
    .unwrap_or_else(Utc::now)
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty { "+dirty" } else { "" };
    Some(format!("v{version}-{timestamp}-{commit}{suffix}"))
}
