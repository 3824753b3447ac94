//! Scan engine - worker pool, progress and shutdown

use anyhow::{Context, Result};
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{info, instrument};

use relayscan_common::{Probe, Target};

use crate::progress::ProgressTracker;
use crate::sink::{ResultBoard, TargetSink};
use crate::telemetry::{recent_capacity, ScanSummary, SummaryFormat, Telemetry};

/// Work queue slots per worker.
const QUEUE_FACTOR: usize = 10;

/// Per-run options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Append successful lines here.
    pub output: Option<PathBuf>,
    /// Minimum gap between panel redraws; zero redraws on every completion.
    pub stat_interval: Duration,
    pub summary_format: SummaryFormat,
    /// Draw the live panel. Defaults to whether stdout is a terminal.
    pub live: bool,
    /// Recent results kept on screen; computed from the terminal when unset.
    pub recent_capacity: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            output: None,
            stat_interval: Duration::from_secs(1),
            summary_format: SummaryFormat::Text,
            live: std::io::stdout().is_terminal(),
            recent_capacity: None,
        }
    }
}

/// Runs one probe over a target list with a fixed pool of workers.
pub struct ScanEngine {
    workers: usize,
    probe: Arc<dyn Probe>,
    options: ScanOptions,
}

impl ScanEngine {
    /// Create an engine with `workers` parallel workers (at least one).
    pub fn new(workers: usize, probe: Arc<dyn Probe>) -> Self {
        Self {
            workers: workers.max(1),
            probe,
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Probe every target, stopping early on Ctrl-C / SIGTERM.
    pub async fn run(&self, targets: Vec<Target>) -> Result<ScanSummary> {
        self.run_until(targets, shutdown_signal()).await
    }

    /// Probe every target, or stop as soon as `shutdown` resolves.
    ///
    /// On shutdown the in-flight probes are aborted before the summary is
    /// taken, so nothing is recorded after this returns.
    #[instrument(skip_all, fields(probe = self.probe.name(), targets = targets.len()))]
    pub async fn run_until<F>(&self, targets: Vec<Target>, shutdown: F) -> Result<ScanSummary>
    where
        F: Future<Output = ()>,
    {
        let progress = Arc::new(ProgressTracker::new(targets.len()));
        let capacity = self.options.recent_capacity.unwrap_or_else(recent_capacity);
        let board = Arc::new(
            ResultBoard::new(capacity, self.options.output.clone()).with_echo(!self.options.live),
        );
        let telemetry = Arc::new(Telemetry::new(
            progress.clone(),
            board.clone(),
            self.options.stat_interval,
            self.options.live,
        ));

        info!(
            "Starting {} scan: {} targets, {} workers",
            self.probe.name(),
            targets.len(),
            self.workers
        );

        let (tx, rx) = mpsc::channel::<Target>(self.workers * QUEUE_FACTOR);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            let rx = rx.clone();
            let probe = self.probe.clone();
            let board = board.clone();
            let progress = progress.clone();
            let telemetry = telemetry.clone();

            workers.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(target) = next else {
                        break; // queue closed and drained
                    };

                    let sink = TargetSink::new(&board);
                    probe.probe(&target, &sink).await;
                    progress.finish_target(sink.succeeded());
                    telemetry.refresh();
                }
            });
        }

        telemetry.begin();

        let feed = async {
            for target in targets {
                if tx.send(target).await.is_err() {
                    break;
                }
            }
            drop(tx);
            while let Some(joined) = workers.join_next().await {
                joined.context("scan worker panicked")?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let interrupted = tokio::select! {
            res = feed => {
                res?;
                false
            }
            _ = shutdown => true,
        };

        // Nothing may touch the board or the screen once the summary is taken.
        if interrupted {
            workers.shutdown().await;
        }

        let summary = ScanSummary::new(&progress.snapshot(), board.output_path(), interrupted);
        telemetry.finish(&summary, self.options.summary_format);
        info!(
            "Scan {}: {}/{} succeeded",
            if interrupted { "interrupted" } else { "finished" },
            summary.succeeded,
            summary.total
        );
        Ok(summary)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix. Never resolves if signal
/// handlers cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
