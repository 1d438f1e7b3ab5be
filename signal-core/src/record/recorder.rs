use super::Record;

/// Destination of the per-step records.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// Destination of the per-episode records.
///
/// Records are kept by [`AggregateRecorder::store`] until the trainer calls
/// [`AggregateRecorder::flush`] at the end of an episode or when a run is aborted.
pub trait AggregateRecorder {
    /// Keeps a record until the next flush.
    fn store(&mut self, record: Record);

    /// Writes out the kept records, tagged with `step`.
    fn flush(&mut self, step: i64);
}
