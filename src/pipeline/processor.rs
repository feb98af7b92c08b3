use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::PipelineConfig;
use crate::engine::transform::process_line;

use super::context::push;

/// Single line processor: read raw lines, filter and transform, send derived values on result_tx.
fn processor_loop(line_rx: Receiver<String>, result_tx: Sender<String>, config: Arc<PipelineConfig>) {
    while let Ok(line) = line_rx.recv() {
        for value in process_line(&line, &config.filter, config.mode) {
            push(&result_tx, value, "results");
        }
    }
    drop(result_tx);
}

/// Spawn line processors. Caller keeps its own `result_tx` and drops it only after joining these.
pub fn spawn_line_processors(
    line_rx: Receiver<String>,
    result_tx: &Sender<String>,
    config: &Arc<PipelineConfig>,
    num_threads: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_threads)
        .map(|_| {
            let line_rx = line_rx.clone();
            let result_tx = result_tx.clone();
            let config = Arc::clone(config);
            thread::spawn(move || processor_loop(line_rx, result_tx, config))
        })
        .collect()
}
