//! Pipeline context: queues, shared counters, cancellation and the progress collaborator seam.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::utils::config::StreamingChannelCap;

/// Receives progress and framing callbacks from the pipeline. Implementations must not block:
/// they are called from fetcher threads and the sink thread.
pub trait ProgressSink: Send + Sync {
    /// Page count is known; `total_pages` pages will be processed.
    fn start(&self, total_pages: usize);
    /// `completed` pages are done (monotonic; abandoned pages count as done).
    fn page_done(&self, completed: usize);
    /// Called right before an output line is written.
    fn clear(&self) {}
    /// Called right after an output line is written.
    fn redraw(&self) {}
    /// Run finished (normally or cancelled).
    fn finish(&self) {}
}

/// Progress sink that renders nothing.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total_pages: usize) {}
    fn page_done(&self, _completed: usize) {}
}

/// Shared cancellation flag. Set by the Ctrl+C handler or by the sink when output fails.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep for `dur`, waking early if cancelled. Returns true if cancelled.
    pub fn sleep(&self, dur: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + dur;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

/// Counters written by fetchers. `completed` is the one the progress display follows.
pub struct PageProgress {
    completed: AtomicUsize,
    failed: AtomicUsize,
    lines: AtomicUsize,
    sink: Arc<dyn ProgressSink>,
}

impl PageProgress {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            lines: AtomicUsize::new(0),
            sink,
        }
    }

    /// Mark one page done (fetched and drained, or abandoned) and notify the sink.
    pub fn page_done(&self, abandoned: bool) -> usize {
        if abandoned {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let n = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.sink.page_done(n);
        n
    }

    pub fn line_fetched(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn lines(&self) -> usize {
        self.lines.load(Ordering::Relaxed)
    }
}

/// The three queues of a run. Page indices → fetchers → raw lines → processors → results → sink.
pub struct PipelineChannels {
    pub page_tx: Sender<usize>,
    pub page_rx: Receiver<usize>,
    pub line_tx: Sender<String>,
    pub line_rx: Receiver<String>,
    pub result_tx: Sender<String>,
    pub result_rx: Receiver<String>,
}

/// Page queue is sized to the fetcher count; line and result queues to a few thousand for backpressure.
pub fn create_pipeline_channels(page_workers: usize) -> PipelineChannels {
    let (page_tx, page_rx) = bounded::<usize>(page_workers.max(1));
    let (line_tx, line_rx) = bounded::<String>(StreamingChannelCap::RAW_LINES);
    let (result_tx, result_rx) = bounded::<String>(StreamingChannelCap::RESULTS);
    PipelineChannels {
        page_tx,
        page_rx,
        line_tx,
        line_rx,
        result_tx,
        result_rx,
    }
}

/// Send on a queue whose receivers must outlive every producer. A closed queue here means the
/// shutdown order was broken, which is a bug, not a runtime condition.
pub(crate) fn push<T>(tx: &Sender<T>, value: T, queue: &str) {
    if tx.send(value).is_err() {
        panic!("{queue} queue closed while a producer was still sending");
    }
}
