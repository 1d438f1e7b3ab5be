//! Linear action-value model.
mod base;
mod config;
pub use base::LinearQ;
pub use config::{LinearQConfig, WeightInit};
