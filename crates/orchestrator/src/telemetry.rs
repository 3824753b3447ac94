//! Live status panel and final summary

use colored::Colorize;
use crossterm::{cursor, queue, terminal};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::sink::ResultBoard;

const BAR_WIDTH: usize = 40;
/// Rows taken by everything except the recent-results list.
const PANEL_OVERHEAD_ROWS: u16 = 16;
const MIN_RECENT: usize = 5;
const MAX_RECENT: usize = 50;
const FALLBACK_RECENT: usize = 10;
const NEVER: u64 = u64::MAX;
const ETA_UNKNOWN: &str = "--";

/// Number of recent results shown for a terminal of `rows` rows.
pub fn capacity_for_rows(rows: u16) -> usize {
    (rows.saturating_sub(PANEL_OVERHEAD_ROWS) as usize).clamp(MIN_RECENT, MAX_RECENT)
}

/// Recent-results capacity for the current terminal.
pub fn recent_capacity() -> usize {
    match terminal::size() {
        Ok((_, rows)) => capacity_for_rows(rows),
        Err(e) => {
            warn!("terminal size unavailable ({}), showing {} results", e, FALLBACK_RECENT);
            FALLBACK_RECENT
        }
    }
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        format!("{}h {}m {}s", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60)
    }
}

/// ETA text; whole seconds, or the sentinel when throughput is zero.
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => format_duration(Duration::from_secs(eta.as_secs())),
        None => ETA_UNKNOWN.to_string(),
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).floor();
    let filled = if filled.is_finite() { filled.clamp(0.0, BAR_WIDTH as f64) as usize } else { 0 };
    let empty = BAR_WIDTH - filled;
    format!("{}{}", "━".repeat(filled).green(), "─".repeat(empty).white())
}

/// Render the status panel followed by the recent results.
pub fn render_panel(
    snap: &ProgressSnapshot,
    recent: &[String],
    capacity: usize,
    output: Option<&Path>,
) -> String {
    let mut out = String::new();
    let rule = "─".repeat(68);

    out.push_str(&format!("{}\n", rule.blue()));
    out.push_str(&format!(
        " {} [{}] {}\n",
        "SCANNING".bold(),
        progress_bar(snap.percent()),
        format!("{:.1}%", snap.percent()).magenta()
    ));
    out.push_str(&format!("{}\n", rule.blue()));
    out.push_str(&format!(
        " {} {:<7} {} {:<7} {} {:<8.0}\n",
        "Success:".green(),
        snap.succeeded,
        "Failed:".red(),
        snap.failed(),
        "Speed:".magenta(),
        snap.rate()
    ));
    out.push_str(&format!(
        " {} {:<12} {} {}/{}   {} {}\n",
        "ETA:".yellow(),
        format_eta(snap.eta()),
        "Scanned:".cyan(),
        snap.completed,
        snap.total,
        "Elapsed:".cyan(),
        format_duration(Duration::from_secs(snap.elapsed.as_secs()))
    ));
    out.push_str(&format!("{}\n\n", rule.blue()));

    out.push_str(&format!("{}\n", format!("LATEST {} RESULTS:", capacity).green().bold()));
    if recent.is_empty() {
        out.push_str(&format!("{}\n", "Waiting for results...".cyan()));
    } else {
        for line in recent {
            out.push_str(line);
            out.push('\n');
        }
    }

    if let Some(path) = output {
        out.push_str(&format!("\n{} {}\n", "Results saved to:".green(), path.display().to_string().cyan()));
    }
    out
}

/// Final run report.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub total: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_percent: f64,
    pub failed_percent: f64,
    pub elapsed_seconds: f64,
    pub hosts_per_second: f64,
    pub output: Option<PathBuf>,
    pub interrupted: bool,
}

impl ScanSummary {
    pub fn new(snap: &ProgressSnapshot, output: Option<&Path>, interrupted: bool) -> Self {
        let share = |n: u64| {
            if snap.total == 0 {
                0.0
            } else {
                n as f64 / snap.total as f64 * 100.0
            }
        };
        Self {
            total: snap.total,
            completed: snap.completed,
            succeeded: snap.succeeded,
            failed: snap.failed(),
            success_percent: share(snap.succeeded),
            failed_percent: share(snap.failed()),
            elapsed_seconds: snap.elapsed.as_secs_f64(),
            hosts_per_second: snap.rate(),
            output: output.map(Path::to_path_buf),
            interrupted,
        }
    }

    pub fn render_text(&self) -> String {
        let title = if self.interrupted { "SCAN INTERRUPTED" } else { "SCAN COMPLETED" };
        let mut out = String::new();
        out.push_str(&format!("\n{}\n\n", title.green().bold()));
        out.push_str(&format!("{}\n", "Statistics:".blue().bold()));
        out.push_str(&format!("   - Total: {} hosts ({} scanned)\n", self.total, self.completed));
        out.push_str(&format!(
            "   - Successful: {} ({:.1}%)\n",
            self.succeeded.to_string().green(),
            self.success_percent
        ));
        out.push_str(&format!(
            "   - Failed: {} ({:.1}%)\n",
            self.failed.to_string().red(),
            self.failed_percent
        ));
        out.push_str(&format!(
            "   - Time Elapsed: {}\n",
            format_duration(Duration::from_secs_f64(self.elapsed_seconds))
        ));
        out.push_str(&format!("   - Average Speed: {:.1} hosts/sec\n", self.hosts_per_second));
        if let Some(path) = &self.output {
            out.push_str(&format!("\n{} {}\n", "Results saved to:".green(), path.display().to_string().cyan()));
        }
        out
    }
}

/// How the final summary is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

/// Throttled redraw of the live panel.
pub(crate) struct Telemetry {
    progress: Arc<ProgressTracker>,
    board: Arc<ResultBoard>,
    interval: Duration,
    last_draw: AtomicU64,
    drawing: Mutex<()>,
    live: bool,
}

impl Telemetry {
    pub(crate) fn new(
        progress: Arc<ProgressTracker>,
        board: Arc<ResultBoard>,
        interval: Duration,
        live: bool,
    ) -> Self {
        Self {
            progress,
            board,
            interval,
            last_draw: AtomicU64::new(NEVER),
            drawing: Mutex::new(()),
            live,
        }
    }

    /// Claim the refresh slot; false when the last draw is too recent.
    fn gate_open(&self) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        let now = self.progress.elapsed().as_nanos() as u64;
        let last = self.last_draw.load(Ordering::Acquire);
        if last != NEVER && now.saturating_sub(last) < self.interval.as_nanos() as u64 {
            return false;
        }
        self.last_draw
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn begin(&self) {
        if self.live {
            let mut stdout = io::stdout();
            let _ = queue!(stdout, cursor::Hide);
            let _ = stdout.flush();
        }
        self.refresh();
    }

    /// Redraw the panel unless throttled, idle (no targets) or another
    /// worker is already drawing.
    pub(crate) fn refresh(&self) {
        if !self.live || self.progress.total() == 0 || !self.gate_open() {
            return;
        }
        let Some(_guard) = self.drawing.try_lock() else {
            return;
        };

        let panel = render_panel(
            &self.progress.snapshot(),
            &self.board.recent_lines(),
            self.board.capacity(),
            self.board.output_path(),
        );
        let mut stdout = io::stdout().lock();
        let _ = queue!(
            stdout,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        );
        let _ = stdout.write_all(panel.as_bytes());
        let _ = stdout.flush();
    }

    /// Replace the panel with the summary and restore the cursor.
    pub(crate) fn finish(&self, summary: &ScanSummary, format: SummaryFormat) {
        let _guard = self.drawing.lock();
        let mut stdout = io::stdout().lock();
        if self.live {
            let _ = queue!(
                stdout,
                terminal::Clear(terminal::ClearType::All),
                cursor::MoveTo(0, 0),
                cursor::Show
            );
        }

        let text = match format {
            SummaryFormat::Text => summary.render_text(),
            SummaryFormat::Json => match serde_json::to_string_pretty(summary) {
                Ok(json) => format!("{json}\n"),
                Err(e) => {
                    warn!("cannot encode summary as JSON: {}", e);
                    summary.render_text()
                }
            },
        };
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}
