//! Orchestrator - the scan engine
//!
//! One [`ScanEngine`] run owns its progress counters, its result board and
//! its telemetry; nothing is process-global.

mod engine;
mod progress;
mod sink;
mod telemetry;

pub use engine::{shutdown_signal, ScanEngine, ScanOptions};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use sink::{RecentResults, ResultBoard};
pub use telemetry::{
    capacity_for_rows, format_duration, format_eta, recent_capacity, render_panel, ScanSummary,
    SummaryFormat,
};
