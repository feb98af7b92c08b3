use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, warn};
use reqwest::blocking::Response;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::cdx::CdxClient;
use crate::utils::config::FetchConsts;

use super::context::{CancelToken, PageProgress, push};

/// Everything a fetcher needs besides its queues.
pub struct FetchContext {
    pub client: CdxClient,
    pub progress: Arc<PageProgress>,
    pub cancel: CancelToken,
    pub retry_backoff: Duration,
}

/// Fetch `page` with up to [`FetchConsts::MAX_ATTEMPTS`] attempts and linear backoff.
/// Returns None when every attempt failed or the run was cancelled.
pub fn fetch_with_retry(
    client: &CdxClient,
    page: usize,
    backoff: Duration,
    cancel: &CancelToken,
) -> Option<Response> {
    let mut last_err = None;
    for attempt in 1..=FetchConsts::MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            return None;
        }
        match client.fetch_page(page) {
            Ok(resp) => return Some(resp),
            Err(err) => {
                if attempt < FetchConsts::MAX_ATTEMPTS {
                    warn!("retrying page {page} (attempt {attempt}) after error: {err}");
                    if cancel.sleep(backoff * attempt) {
                        return None;
                    }
                }
                last_err = Some(err);
            }
        }
    }
    if let Some(err) = last_err {
        error!(
            "giving up on CDX page {page} after {} attempts: {err}",
            FetchConsts::MAX_ATTEMPTS
        );
    }
    None
}

/// Push every non-blank line of the page body onto the raw-line queue.
fn drain_page(resp: Response, page: usize, line_tx: &Sender<String>, progress: &PageProgress) {
    let mut reader = BufReader::new(resp);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    progress.line_fetched();
                    push(line_tx, line.to_string(), "raw-line");
                }
            }
            Err(err) => {
                warn!("error reading CDX page {page}: {err}");
                break;
            }
        }
    }
}

/// Single fetcher: take page indices until the queue closes or the run is cancelled.
fn fetcher_loop(page_rx: Receiver<usize>, line_tx: Sender<String>, ctx: Arc<FetchContext>) {
    while let Ok(page) = page_rx.recv() {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match fetch_with_retry(&ctx.client, page, ctx.retry_backoff, &ctx.cancel) {
            Some(resp) => {
                drain_page(resp, page, &line_tx, &ctx.progress);
                let done = ctx.progress.page_done(false);
                debug!("page {page} done ({done} completed)");
            }
            None if ctx.cancel.is_cancelled() => break,
            None => {
                ctx.progress.page_done(true);
            }
        }
    }
    drop(line_tx);
}

/// Spawn page fetchers. Caller keeps its own `line_tx` and drops it only after joining these.
pub fn spawn_page_fetchers(
    page_rx: Receiver<usize>,
    line_tx: &Sender<String>,
    ctx: Arc<FetchContext>,
    num_threads: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_threads)
        .map(|_| {
            let page_rx = page_rx.clone();
            let line_tx = line_tx.clone();
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || fetcher_loop(page_rx, line_tx, ctx))
        })
        .collect()
}
