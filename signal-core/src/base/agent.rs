//! Agent.
use super::{ReplayBufferBase, StateVector};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Approximates action values and takes the greedy action.
pub trait Policy {
    /// Returns the dimension of the state vector the model expects.
    fn in_dim(&self) -> usize;

    /// Returns the number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Returns the action values of all actions in the given state.
    fn action_values(&self, state: &StateVector) -> Result<Vec<f32>>;

    /// Returns the index of the action with the highest value.
    fn best_action(&self, state: &StateVector) -> Result<usize>;
}

/// Represents a trainable action-value model for a single intersection.
///
/// Each intersection owns its agent and its replay buffer. The trainer pushes the
/// transitions produced by the intersection into the buffer, then calls
/// [`Agent::opt_with_record`].
pub trait Agent<R: ReplayBufferBase>: Policy {
    /// Performs an optimization step.
    ///
    /// `buffer` holds the transitions of this intersection; the most recently pushed
    /// one is the transition produced at the current environment step.
    fn opt(&mut self, buffer: &mut R) -> Result<()> {
        let _ = self.opt_with_record(buffer)?;
        Ok(())
    }

    /// Performs an optimization step and returns some information.
    ///
    /// Returns `None` if the step was skipped, for example because the buffer is empty.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>>;

    /// Copies the parameters of the online model to the target model.
    ///
    /// Models without a target copy ignore the call.
    fn sync_target(&mut self) -> Result<()> {
        Ok(())
    }

    /// Serializes the parameters into an opaque blob.
    fn export_weights(&self) -> Result<Vec<u8>>;

    /// Restores the parameters from a blob created by [`Agent::export_weights`].
    fn import_weights(&mut self, blob: &[u8]) -> Result<()>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
