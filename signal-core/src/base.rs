//! Core functionalities.
mod agent;
mod replay_buffer;
mod simulator;
pub use agent::{Agent, Policy};
pub use replay_buffer::ReplayBufferBase;
use serde::{Deserialize, Serialize};
pub use simulator::Simulator;
use std::ops::Index;

/// Observation assembled from simulator readings.
///
/// The dimensionality is fixed for the lifetime of a training run. Models check it
/// against their input size and fail with
/// [`SignalError::DimensionMismatch`](crate::error::SignalError::DimensionMismatch)
/// rather than truncating or padding.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct StateVector(Vec<f32>);

impl StateVector {
    /// Returns a vector of zeros with the given length.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0f32; len])
    }

    /// Returns the number of features.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the vector has no features.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the features as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Consumes the vector and returns the features.
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for StateVector {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

impl Index<usize> for StateVector {
    type Output = f32;

    fn index(&self, ix: usize) -> &f32 {
        &self.0[ix]
    }
}

/// One observed `(s_t, a_t, r_t, s_t+1, terminal)` tuple.
///
/// A transition is immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State in which the action was taken.
    pub state: StateVector,

    /// Index of the action taken.
    pub action: usize,

    /// Reward observed after the action.
    pub reward: f32,

    /// State after the environment step.
    pub next_state: StateVector,

    /// Flag denoting the end of an episode.
    pub terminal: bool,
}

impl Transition {
    /// Constructs a [`Transition`].
    pub fn new(
        state: StateVector,
        action: usize,
        reward: f32,
        next_state: StateVector,
        terminal: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
        }
    }
}
