use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use csv2thesis_core::{ReferenceCache, ThesisDraft};
use csv2thesis_extract::ExtractError;

use crate::logging;
use crate::policy::DecisionPolicy;
use crate::reader::RawRow;
use crate::resolve::{resolve_row, ResolveOptions, RowOutcome};
use crate::sink::CommitSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowReport {
    pub row_index: usize,
    pub outcome: Outcome,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_seen: usize,
    pub interrupted: bool,
    /// Row to pass to `--start-from` after an interrupt.
    pub next_row: Option<usize>,
    /// One entry per skipped or failed row, in source order.
    pub rows: Vec<RowReport>,
}

impl RunSummary {
    pub fn print(&self) {
        logging::info("======== import summary ========");
        logging::info(format!(
            "done {}, skipped {}, failed {} (rows seen: {})",
            self.done, self.skipped, self.failed, self.total_seen
        ));
        for report in &self.rows {
            let label = match report.outcome {
                Outcome::Skipped => "skipped",
                Outcome::Failed => "failed",
            };
            logging::info(format!(
                "row {} {label}: {}",
                report.row_index, report.message
            ));
        }
        if let Some(next) = self.next_row {
            logging::info(format!(
                "interrupted: resume with --start-from {next}"
            ));
        }
    }
}

pub struct BatchOptions {
    pub start_from: usize,
    pub resolve: ResolveOptions,
    pub throttle_ms: u64,
}

/// Run every row at or past the start offset through the resolver.
///
/// Per-row failures of any kind become Failed reports and the loop moves
/// on; a cancellation observed between rows stops cleanly with the next
/// unprocessed row recorded for resumption.
pub fn run_batch(
    rows: &[RawRow],
    extract: &dyn Fn(&RawRow) -> Result<ThesisDraft, ExtractError>,
    cache: &mut ReferenceCache,
    policy: &mut dyn DecisionPolicy,
    sink: &mut dyn CommitSink,
    options: &BatchOptions,
    cancel: &AtomicBool,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for row in rows {
        if row.index < options.start_from {
            continue;
        }
        if cancel.load(Ordering::Relaxed) {
            summary.interrupted = true;
            summary.next_row = Some(row.index);
            logging::stage("batch", "cancellation observed, stopping");
            break;
        }
        summary.total_seen += 1;
        logging::stage("row", format!("processing row {}", row.index));
        let outcome = match extract(row) {
            Err(err) => RowOutcome::Failed {
                message: format!("extraction failed: {err}"),
            },
            Ok(draft) => {
                for warning in &draft.warnings {
                    logging::stage("extract", format!("row {}: {warning}", row.index));
                }
                match resolve_row(&draft, cache, policy, sink, &options.resolve) {
                    Ok(outcome) => outcome,
                    Err(err) => RowOutcome::Failed {
                        message: format!("{err:#}"),
                    },
                }
            }
        };
        match outcome {
            RowOutcome::Done { thesis_id } => {
                summary.done += 1;
                logging::stage(
                    "row",
                    format!("row {} done (thesis #{thesis_id})", row.index),
                );
            }
            RowOutcome::Skipped { message } => {
                summary.skipped += 1;
                logging::stage("row", format!("row {} skipped: {message}", row.index));
                summary.rows.push(RowReport {
                    row_index: row.index,
                    outcome: Outcome::Skipped,
                    message,
                });
            }
            RowOutcome::Failed { message } => {
                summary.failed += 1;
                logging::stage("row", format!("row {} failed: {message}", row.index));
                summary.rows.push(RowReport {
                    row_index: row.index,
                    outcome: Outcome::Failed,
                    message,
                });
            }
        }
        if options.throttle_ms > 0 {
            thread::sleep(Duration::from_millis(options.throttle_ms));
        }
    }
    summary
}
