//! Progress bar for the page fetch, rendered with kdam on stderr.

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::pipeline::ProgressSink;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Update the bar's total (known once the page count arrives). Refreshes the display.
pub fn set_bar_total(pb: &ProgressBar, total: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        bar.total = total;
        let _ = bar.refresh();
    }
}

/// Create a page bar with an unknown total; [`set_bar_total`] fills it in.
pub fn create_progress_bar(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " pages"
    )))
}

/// [`ProgressSink`] backed by a kdam bar.
///
/// Every call uses `try_lock`: a contended update is skipped, never waited for. `page_done`
/// carries the absolute count, so a skipped update is corrected by the next one.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: create_progress_bar("Fetching CDX pages"),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn start(&self, total_pages: usize) {
        set_bar_total(&self.bar, total_pages);
    }

    fn page_done(&self, completed: usize) {
        if let Ok(mut bar) = self.bar.try_lock() {
            let _ = bar.update_to(completed);
        }
    }

    fn clear(&self) {
        if let Ok(mut bar) = self.bar.try_lock() {
            let _ = bar.clear();
        }
    }

    fn redraw(&self) {
        if let Ok(mut bar) = self.bar.try_lock() {
            let _ = bar.refresh();
        }
    }

    fn finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            let _ = bar.refresh();
            eprintln!();
        }
    }
}
