//! Plain-text rendering of batch reports and stored rows.

use std::fmt::Write as _;

use stockpile_core::{
  report::{RunStatus, StepState},
  row::Row,
};
use stockpile_sync::{BatchReport, SecurityOutcome};

fn status_label(status: RunStatus) -> &'static str {
  match status {
    RunStatus::Completed => "completed",
    RunStatus::SkippedFresh => "fresh",
    RunStatus::Cancelled => "cancelled",
  }
}

/// One line per security plus a trailing summary.
pub fn render_batch(report: &BatchReport) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<10} {:<10} {:>8} {:>8} {:>7} {:>7}  FAILED",
    "SYMBOL", "STATUS", "WRITTEN", "SKIPPED", "PRUNED", "WIPED"
  );

  for outcome in &report.securities {
    match outcome {
      SecurityOutcome::Synced(run) => {
        let totals = run.totals();
        let failed = run
          .entities
          .iter()
          .filter(|e| e.state == StepState::Failed)
          .map(|e| e.kind.to_string())
          .collect::<Vec<_>>()
          .join(",");
        let _ = writeln!(
          out,
          "{:<10} {:<10} {:>8} {:>8} {:>7} {:>7}  {}",
          run.symbol.as_str(),
          status_label(run.status),
          totals.written,
          totals.skipped,
          totals.pruned,
          totals.wiped,
          if failed.is_empty() { "-" } else { failed.as_str() },
        );
      }
      SecurityOutcome::OpenFailed { symbol, message } => {
        let _ = writeln!(out, "{:<10} {:<10} {message}", symbol.as_str(), "error");
      }
    }
  }

  let _ = writeln!(
    out,
    "\n{} securities, {} fresh, {} with failures",
    report.securities.len(),
    report.skipped_fresh(),
    report.failures().count(),
  );
  out
}

/// One JSON object per line.
pub fn render_rows(rows: &[Row]) -> anyhow::Result<String> {
  let mut out = String::new();
  for row in rows {
    out.push_str(&serde_json::to_string(row)?);
    out.push('\n');
  }
  Ok(out)
}
