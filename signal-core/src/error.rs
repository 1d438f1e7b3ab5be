//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum SignalError {
    /// The length of a state vector does not match the input size of a model.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Input size of the model.
        expected: usize,
        /// Length of the given vector.
        actual: usize,
    },

    /// A decision was requested for a light in the middle of a transition.
    #[error("Illegal action requested for light {light} in phase {phase}")]
    IllegalAction {
        /// Light identifier.
        light: String,
        /// Phase of the light when the decision was requested.
        phase: usize,
    },

    /// The simulator connection failed.
    #[error("Simulator unavailable: {0}")]
    SimulatorUnavailable(String),

    /// The simulator does not know the light.
    #[error("Unknown traffic light: {0}")]
    UnknownLight(String),

    /// A weight blob could not be imported.
    #[error("Weight format error: {0}")]
    WeightFormat(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

/// Returns [`SignalError::DimensionMismatch`] if `actual != expected`.
pub fn check_dim(expected: usize, actual: usize) -> Result<(), SignalError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SignalError::DimensionMismatch { expected, actual })
    }
}
