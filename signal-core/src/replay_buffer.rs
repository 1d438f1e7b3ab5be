//! Experience replay.
mod base;
mod config;
pub use base::ExperienceReplay;
pub use config::ExperienceReplayConfig;
