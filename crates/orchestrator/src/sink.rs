//! Result sink: recent-results ring buffer plus optional output file.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use relayscan_common::ResultSink;

/// Fixed-capacity FIFO keeping the most recent lines.
#[derive(Debug)]
pub struct RecentResults {
    capacity: usize,
    items: VecDeque<String>,
}

impl RecentResults {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `line`, evicting the oldest entry when full.
    pub fn push(&mut self, line: String) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(line);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.items.iter()
    }
}

/// Shared sink for one run.
///
/// The ring buffer and the output file sit behind separate locks so a slow
/// file append never blocks the panel.
pub struct ResultBoard {
    recent: Mutex<RecentResults>,
    output: Option<PathBuf>,
    output_lock: Mutex<()>,
    echo: bool,
}

impl ResultBoard {
    pub fn new(capacity: usize, output: Option<PathBuf>) -> Self {
        Self {
            recent: Mutex::new(RecentResults::new(capacity)),
            output,
            output_lock: Mutex::new(()),
            echo: false,
        }
    }

    /// Print successes to stdout as they arrive (used when no live panel is drawn).
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn capacity(&self) -> usize {
        self.recent.lock().capacity()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Copy of the buffered lines, oldest first.
    pub fn recent_lines(&self) -> Vec<String> {
        self.recent.lock().iter().cloned().collect()
    }

    fn push(&self, line: String) {
        self.recent.lock().push(line);
    }

    fn append_output(&self, line: &str) {
        let Some(path) = &self.output else {
            return;
        };

        let _guard = self.output_lock.lock();
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = written {
            warn!("cannot append to {}: {}", path.display(), e);
        }
    }
}

impl ResultSink for ResultBoard {
    fn record_success(&self, line: String) {
        self.append_output(&line);
        if self.echo {
            println!("{line}");
        }
        self.push(line);
    }

    fn log(&self, line: String) {
        self.push(line);
    }
}

/// Per-target view of the board that remembers whether anything succeeded.
pub(crate) struct TargetSink<'a> {
    board: &'a ResultBoard,
    hit: AtomicBool,
}

impl<'a> TargetSink<'a> {
    pub(crate) fn new(board: &'a ResultBoard) -> Self {
        Self {
            board,
            hit: AtomicBool::new(false),
        }
    }

    pub(crate) fn succeeded(&self) -> bool {
        self.hit.load(Ordering::SeqCst)
    }
}

impl ResultSink for TargetSink<'_> {
    fn record_success(&self, line: String) {
        self.hit.store(true, Ordering::SeqCst);
        self.board.record_success(line);
    }

    fn log(&self, line: String) {
        self.board.log(line);
    }
}
