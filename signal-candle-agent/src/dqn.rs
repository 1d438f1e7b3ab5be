//! Shallow action-value network with a target copy.
mod base;
mod config;
mod model;
pub use base::Dqn;
pub use config::DqnConfig;
pub use model::{DqnModel, DqnModelConfig};
