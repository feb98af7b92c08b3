use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::engine::cdx::CdxClient;
use crate::pipeline;
use crate::pipeline::context::{CancelToken, PageProgress, ProgressSink};
use crate::pipeline::fetcher::FetchContext;
use crate::pipeline::sink::{Dedup, OutputSinks};
use crate::{OutputMode, PipelineConfig, RunSummary};

/// Main orchestrator: resolve the page count, then stream
/// page indices → fetchers → raw lines → processors → results → sink.
///
/// Queues close strictly in that order: the page queue after dispatch, the raw-line queue after
/// every fetcher is joined, the results queue after every processor is joined.
pub fn run_pipeline(
    config: &PipelineConfig,
    sinks: OutputSinks,
    progress_sink: Arc<dyn ProgressSink>,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    if config.mode == OutputMode::Subdomains && config.base_domain.is_none() {
        warn!(
            "no base domain could be derived from {:?}; nothing to do for subdomain mode",
            config.url_pattern
        );
        sinks.finish()?;
        return Ok(RunSummary::default());
    }

    let client = CdxClient::new(&config.endpoint, &config.cdx_pattern, config.timeout)?;
    let pages = client.page_count()?;
    debug!("CDX reports {pages} page(s) for {}", client.cdx_pattern());
    if pages == 0 {
        info!("No pages reported by CDX; nothing to do.");
        sinks.finish()?;
        return Ok(RunSummary::default());
    }

    progress_sink.start(pages);
    let progress = Arc::new(PageProgress::new(Arc::clone(&progress_sink)));
    let config = Arc::new(config.clone());
    let fetchers = config.page_workers.min(pages).max(1);
    let channels = pipeline::create_pipeline_channels(fetchers);

    let sink_handle = pipeline::spawn_sink(
        channels.result_rx,
        Dedup::new(config.mode, config.base_domain.as_deref()),
        sinks,
        Arc::clone(&progress_sink),
        cancel.clone(),
    );
    let processor_handles = pipeline::spawn_line_processors(
        channels.line_rx,
        &channels.result_tx,
        &config,
        config.workers,
    );
    let fetcher_handles = pipeline::spawn_page_fetchers(
        channels.page_rx,
        &channels.line_tx,
        Arc::new(FetchContext {
            client,
            progress: Arc::clone(&progress),
            cancel: cancel.clone(),
            retry_backoff: config.retry_backoff,
        }),
        fetchers,
    );

    for page in 0..pages {
        // A failed send means every fetcher already left (cancelled or panicked).
        if cancel.is_cancelled() || channels.page_tx.send(page).is_err() {
            break;
        }
    }
    drop(channels.page_tx);

    let fetch_res = pipeline::join_workers(fetcher_handles, "page fetcher");
    drop(channels.line_tx);
    let process_res = pipeline::join_workers(processor_handles, "line processor");
    drop(channels.result_tx);
    let sink_res = sink_handle
        .join()
        .map_err(|_| anyhow::anyhow!("sink thread panicked"));
    progress_sink.finish();

    fetch_res?;
    process_res?;
    let values_written = sink_res??;
    pipeline::report_abandoned_pages(&progress, pages);

    Ok(RunSummary {
        pages_total: pages,
        pages_completed: progress.completed(),
        pages_failed: progress.failed(),
        lines_fetched: progress.lines(),
        values_written,
        cancelled: cancel.is_cancelled(),
    })
}
