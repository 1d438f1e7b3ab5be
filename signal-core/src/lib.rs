#![warn(missing_docs)]
//! Core of a reinforcement learning harness for adaptive traffic signal control.
//!
//! Every controlled light of a [`Simulator`] is driven by its own [`Agent`], an
//! action-value model choosing between the two green phases of the light. The
//! [`Trainer`] runs episodes, assembles [`StateVector`]s from simulator readings,
//! computes rewards, explores with [`EpsilonGreedy`](explorer::EpsilonGreedy) and
//! trains each agent on the transitions of its own light, stored in its own
//! [`ExperienceReplay`](replay_buffer::ExperienceReplay).
//!
//! Model implementations live in separate crates.
pub mod error;
pub mod explorer;
pub mod observation;
pub mod phase;
pub mod record;
pub mod replay_buffer;
pub mod reward;
pub mod scripted;

mod base;
pub use base::{Agent, Policy, ReplayBufferBase, Simulator, StateVector, Transition};

mod trainer;
pub use trainer::{
    EpisodeSummary, Intersection, StepOutcome, Trainer, TrainerConfig, TrainingReport,
    TrainingState,
};
