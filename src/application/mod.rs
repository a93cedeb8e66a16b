//! Application layer - Use cases that coordinate the mirror's phases.
//!
//! This layer sequences manifest reading, local state, fetching, unpacking
//! and analysis. Printing is left to the CLI layer.

mod clean;
mod download;
mod reconcile;
mod refresh;
mod report;

pub use clean::CleanAction;
pub use download::{DownloadAction, DownloadOptions, DownloadSummary};
pub use reconcile::{ReconcileAction, ReconcileOutcome, ReconcileSummary};
pub use refresh::refresh_manifest;
pub use report::{PROGRESS_EVERY, REPORT_FILE, ReportAction, ReportRecord, ReportStats};
