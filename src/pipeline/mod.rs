//! Pipeline components: context, fetchers, processors, sink, orchestration.

pub mod context;
pub mod error_handler;
pub mod fetcher;
pub mod orchestrator;
pub mod processor;
pub mod sink;

pub use context::{
    CancelToken, NoProgress, PageProgress, PipelineChannels, ProgressSink,
    create_pipeline_channels,
};
pub use error_handler::{join_workers, report_abandoned_pages};
pub use fetcher::{FetchContext, fetch_with_retry, spawn_page_fetchers};
pub use orchestrator::run_pipeline;
pub use processor::spawn_line_processors;
pub use sink::{Dedup, OutputSinks, run_sink, spawn_sink};
