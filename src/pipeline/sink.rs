//! Streaming dedup and output: the single consumer of the results queue.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{error, info};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::OutputMode;
use crate::engine::transform::{path_segments, subdomain_of};

use super::context::{CancelToken, ProgressSink};

/// Where output lines go: a primary writer (stdout for the CLI) plus an optional file mirror.
pub struct OutputSinks {
    primary: Box<dyn Write + Send>,
    mirror: Option<(PathBuf, BufWriter<File>)>,
}

impl OutputSinks {
    pub fn new(primary: Box<dyn Write + Send>) -> Self {
        Self {
            primary,
            mirror: None,
        }
    }

    /// Stdout, mirrored to `path` when given. The file is created (truncated) immediately.
    pub fn stdout(path: Option<&Path>) -> Result<Self> {
        let sinks = Self::new(Box::new(io::stdout()));
        match path {
            Some(p) => sinks.with_file(p),
            None => Ok(sinks),
        }
    }

    pub fn with_file(mut self, path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("create output file {}", path.display()))?;
        self.mirror = Some((path.to_path_buf(), BufWriter::new(file)));
        Ok(self)
    }

    /// Write one line to every sink and flush so partial output survives an interrupted run.
    pub fn write_line(&mut self, value: &str) -> io::Result<()> {
        writeln!(self.primary, "{value}")?;
        self.primary.flush()?;
        if let Some((_, file)) = self.mirror.as_mut() {
            writeln!(file, "{value}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Flush and close. Logs where the file mirror was saved.
    pub fn finish(mut self) -> Result<()> {
        self.primary.flush().context("flush output")?;
        if let Some((path, mut file)) = self.mirror.take() {
            file.flush()
                .with_context(|| format!("flush output file {}", path.display()))?;
            drop(file);
            info!("Saved results to {}", path.display());
        }
        Ok(())
    }
}

enum DedupKey {
    /// Whole value, case-sensitive.
    Exact,
    /// Lower-cased host of strict subdomains of the base. `None` base admits nothing.
    Subdomains(Option<String>),
    /// Each path segment independently.
    PathSegments,
}

/// Per-run dedup state. Owned by the sink thread only.
pub struct Dedup {
    key: DedupKey,
    seen: HashSet<String>,
}

impl Dedup {
    pub fn new(mode: OutputMode, base_domain: Option<&str>) -> Self {
        let key = match mode {
            OutputMode::Subdomains => DedupKey::Subdomains(
                base_domain
                    .map(str::to_ascii_lowercase)
                    .filter(|b| !b.is_empty()),
            ),
            OutputMode::ExtractPaths => DedupKey::PathSegments,
            _ => DedupKey::Exact,
        };
        Self {
            key,
            seen: HashSet::new(),
        }
    }

    /// Values derived from `value` that haven't been seen yet, in order.
    pub fn admit(&mut self, value: &str) -> Vec<String> {
        let candidates = match &self.key {
            DedupKey::Exact => vec![value.to_string()],
            DedupKey::Subdomains(None) => Vec::new(),
            DedupKey::Subdomains(Some(base)) => subdomain_of(value, base).into_iter().collect(),
            DedupKey::PathSegments => path_segments(value),
        };
        candidates
            .into_iter()
            .filter(|c| self.seen.insert(c.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Drain `result_rx` until it closes, writing each new value. Returns the number of lines written.
///
/// A write failure cancels the run and stops output, but the queue is still drained so upstream
/// workers never see it closed.
pub fn run_sink(
    result_rx: Receiver<String>,
    mut dedup: Dedup,
    mut sinks: OutputSinks,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
) -> Result<usize> {
    let mut written = 0_usize;
    let mut write_error: Option<io::Error> = None;
    while let Ok(value) = result_rx.recv() {
        if write_error.is_some() {
            continue;
        }
        for out in dedup.admit(&value) {
            progress.clear();
            let res = sinks.write_line(&out);
            progress.redraw();
            if let Err(err) = res {
                error!("writing output failed, stopping: {err}");
                cancel.cancel();
                write_error = Some(err);
                break;
            }
            written += 1;
        }
    }
    if let Some(err) = write_error {
        return Err(err).context("write output");
    }
    sinks.finish()?;
    Ok(written)
}

pub fn spawn_sink(
    result_rx: Receiver<String>,
    dedup: Dedup,
    sinks: OutputSinks,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
) -> JoinHandle<Result<usize>> {
    thread::spawn(move || run_sink(result_rx, dedup, sinks, progress, cancel))
}
