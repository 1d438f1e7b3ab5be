use super::{AggregateRecorder, Record, Recorder};
use log::trace;

/// Buffered recorder.
///
/// Keeps every record in memory. Written records are the per-step records of the
/// trainer, stored records the per-episode summaries.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    stored: Vec<Record>,
    last_flush: Option<i64>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the written records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Returns an iterator over the stored records.
    pub fn iter_stored(&self) -> std::slice::Iter<Record> {
        self.stored.iter()
    }

    /// Returns the step given to the last call of [`AggregateRecorder::flush`].
    pub fn last_flush(&self) -> Option<i64> {
        self.last_flush
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

impl AggregateRecorder for BufferedRecorder {
    fn store(&mut self, record: Record) {
        self.stored.push(record);
    }

    fn flush(&mut self, step: i64) {
        trace!("Flush {} stored records at step {}", self.stored.len(), step);
        self.last_flush = Some(step);
    }
}
