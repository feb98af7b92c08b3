use anyhow::Result;
use std::thread::JoinHandle;

use super::context::PageProgress;

/// Join every handle of a worker pool, then report whether any of them panicked.
/// All handles are joined even after a panic so shutdown order downstream is kept.
pub fn join_workers(handles: Vec<JoinHandle<()>>, stage: &str) -> Result<()> {
    let panicked = handles
        .into_iter()
        .map(JoinHandle::join)
        .filter(|r| r.is_err())
        .count();
    if panicked > 0 {
        return Err(anyhow::anyhow!("{panicked} {stage} thread(s) panicked"));
    }
    Ok(())
}

/// Log pages that were abandoned after exhausting retries. Call after joining fetchers.
pub fn report_abandoned_pages(progress: &PageProgress, total: usize) {
    let failed = progress.failed();
    if failed > 0 {
        log::warn!(
            "{} of {} CDX pages could not be fetched; their URLs are missing from the output",
            failed,
            total
        );
    }
}
