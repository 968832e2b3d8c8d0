use std::io::Write;

use anyhow::Result;
use stalepr::{Repo, RunSummary};

fn summary_rows(summary: &RunSummary) -> Vec<(&'static str, usize)> {
    let (warned, closed, cleared) = if summary.dry_run {
        ("Would warn", "Would close", "Would clear warning")
    } else {
        ("Warned", "Closed", "Warning cleared")
    };

    vec![
        ("Examined", summary.examined),
        (warned, summary.warned),
        (closed, summary.closed),
        (cleared, summary.warnings_cleared),
        ("Unchanged", summary.unchanged),
        ("Failed", summary.failed),
    ]
}

/// Writes the end-of-run report.
pub fn write_summary<W: Write>(repo: &Repo, summary: &RunSummary, writer: &mut W) -> Result<()> {
    let heading = if summary.dry_run {
        format!("Stale sweep of {} (dry run)", repo)
    } else {
        format!("Stale sweep of {}", repo)
    };
    writeln!(writer, "{}", heading)?;
    writeln!(writer, "{}", "-".repeat(heading.len()))?;

    let rows = summary_rows(summary);
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, count) in rows {
        writeln!(writer, "{:<width$}  {}", name, count, width = width)?;
    }

    Ok(())
}
