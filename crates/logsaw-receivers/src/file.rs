use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;
use tracing::{info, warn};

use logsaw_types::LogEvent;

use crate::codec::{decode_line, encode_event};
use crate::error::ReceiverError;
use crate::sink::EventSink;

/// Events handed to the container per lock acquisition
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Outcome of a completed file load
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    pub path: PathBuf,
    pub loaded: usize,
    pub visible: usize,
    /// Lines that could not be decoded
    pub skipped: usize,
}

/// Loads JSON-lines files into the container on a background thread
pub struct FileLoader {
    sink: EventSink,
    batch_size: usize,
}

impl FileLoader {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Start loading `path` on a dedicated thread.
    ///
    /// A load cannot be cancelled once started.
    pub fn spawn(&self, path: impl Into<PathBuf>) -> Result<FileLoad, ReceiverError> {
        let path = path.into();
        let (tx, rx) = oneshot::channel();
        let sink = self.sink.clone();
        let batch_size = self.batch_size;
        let thread_path = path.clone();

        thread::Builder::new()
            .name("logsaw-file-loader".to_string())
            .spawn(move || {
                let result = load_file(&thread_path, &sink, batch_size);
                let _ = tx.send(result);
            })?;

        Ok(FileLoad { path, result: rx })
    }
}

/// A load running on its own thread
pub struct FileLoad {
    path: PathBuf,
    result: oneshot::Receiver<Result<LoadSummary, ReceiverError>>,
}

impl FileLoad {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the load to finish
    pub async fn finished(self) -> Result<LoadSummary, ReceiverError> {
        self.result
            .await
            .map_err(|_| ReceiverError::LoadAborted(self.path))?
    }

    /// Block the current thread until the load finishes
    pub fn wait(self) -> Result<LoadSummary, ReceiverError> {
        self.result
            .blocking_recv()
            .map_err(|_| ReceiverError::LoadAborted(self.path))?
    }
}

/// Read a JSON-lines file into the sink in batches, skipping malformed lines
pub fn load_file(path: &Path, sink: &EventSink, batch_size: usize) -> Result<LoadSummary, ReceiverError> {
    let file = File::open(path).map_err(|source| ReceiverError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Loading events from file");

    let mut summary = LoadSummary {
        path: path.to_path_buf(),
        loaded: 0,
        visible: 0,
        skipped: 0,
    };
    let mut batch = Vec::with_capacity(batch_size);

    for (index, line) in BufReader::new(file).lines().enumerate() {
        match decode_line(&line?) {
            Ok(Some(event)) => batch.push(event),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), line = index + 1, error = %e, "Skipping malformed line");
                summary.skipped += 1;
            }
        }

        if batch.len() >= batch_size {
            summary.loaded += batch.len();
            summary.visible += sink.publish_batch(std::mem::take(&mut batch));
        }
    }

    if !batch.is_empty() {
        summary.loaded += batch.len();
        summary.visible += sink.publish_batch(batch);
    }
    sink.flush();

    info!(
        path = %path.display(),
        loaded = summary.loaded,
        skipped = summary.skipped,
        "File load complete"
    );
    Ok(summary)
}

/// Write events as JSON lines; returns how many were written
pub fn export_events<W: Write>(writer: W, events: &[Arc<LogEvent>]) -> Result<usize, ReceiverError> {
    let mut writer = BufWriter::new(writer);
    for event in events {
        writeln!(writer, "{}", encode_event(event)?)?;
    }
    writer.flush()?;
    Ok(events.len())
}

/// Export to a file, replacing it if it exists
pub fn export_to_file(path: &Path, events: &[Arc<LogEvent>]) -> Result<usize, ReceiverError> {
    let file = File::create(path).map_err(|source| ReceiverError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let written = export_events(file, events)?;
    info!(path = %path.display(), written, "Exported events");
    Ok(written)
}
