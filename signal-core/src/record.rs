//! Types and traits for recording training metrics.
//!
//! The [`Trainer`](crate::Trainer) writes a [`Record`] for every environment step and
//! stores one for every episode. Recorders decide where the records go.
//!
//! ```rust
//! use signal_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("env_steps", RecordValue::Scalar(1.0));
//! record.insert("reward", RecordValue::Scalar(-0.5));
//! record.insert("state", RecordValue::Array1(vec![0.0, 2.0, 2.0]));
//! assert_eq!(record.get_scalar("reward").unwrap(), -0.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
