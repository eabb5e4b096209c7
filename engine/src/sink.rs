use std::io::Write;
use std::sync::Arc;

use corelib::models::ConfirmedOnset;
use parking_lot::Mutex;

use crate::error::SinkError;

/// Append-only destination for confirmed onsets.
pub trait OnsetSink {
    fn emit(&mut self, onset: &ConfirmedOnset) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every record in memory. Used by tests and replays.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<ConfirmedOnset>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ConfirmedOnset] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ConfirmedOnset> {
        self.records
    }
}

impl OnsetSink for MemorySink {
    fn emit(&mut self, onset: &ConfirmedOnset) -> Result<(), SinkError> {
        self.records.push(onset.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
///
/// Each record is encoded in full before anything reaches the writer, so an
/// encoding failure never leaves a partial line behind.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OnsetSink for JsonlSink<W> {
    fn emit(&mut self, onset: &ConfirmedOnset) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(onset)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Cloneable handle serializing writes from several pipelines into one sink.
///
/// Only writes are serialized; each pipeline still makes its own decisions.
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: OnsetSink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Runs `f` with the underlying sink locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Recovers the sink once every other handle is gone.
    pub fn try_unwrap(self) -> Result<S, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<S: OnsetSink> OnsetSink for SharedSink<S> {
    fn emit(&mut self, onset: &ConfirmedOnset) -> Result<(), SinkError> {
        self.inner.lock().emit(onset)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.inner.lock().flush()
    }
}
