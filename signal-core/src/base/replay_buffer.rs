//! Replay buffer interface.
use super::Transition;

/// Interface of buffers storing the transitions of an intersection.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Self;

    /// Returns the configuration of the `index`-th of several buffers sharing `config`.
    fn config_for(config: &Self::Config, _index: usize) -> Self::Config {
        config.clone()
    }

    /// Pushes a transition, evicting the oldest one if the buffer is full.
    fn push(&mut self, tr: Transition);

    /// Returns the current number of transitions in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the most recently pushed transition.
    fn newest(&self) -> Option<&Transition>;

    /// Samples `min(size, len)` distinct transitions uniformly at random.
    ///
    /// Sampling copies the transitions and does not change the buffer. An empty
    /// buffer yields an empty batch.
    fn batch(&mut self, size: usize) -> Vec<Transition>;

    /// Removes all transitions.
    fn clear(&mut self);
}
