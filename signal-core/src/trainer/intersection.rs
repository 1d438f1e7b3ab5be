//! Per-light learning state.
use crate::{record::Record, Agent, ReplayBufferBase, Transition};
use anyhow::Result;
use log::{debug, info, warn};
use std::path::Path;

/// A controlled light together with its model and its replay buffer.
///
/// Models and buffers are never shared between lights.
pub struct Intersection<A, R>
where
    A: Agent<R>,
    R: ReplayBufferBase,
{
    light: String,
    agent: A,
    buffer: R,
}

impl<A, R> Intersection<A, R>
where
    A: Agent<R>,
    R: ReplayBufferBase,
{
    /// Creates an intersection with an empty buffer.
    pub fn new(light: impl Into<String>, agent: A, buffer_config: &R::Config) -> Self {
        Self {
            light: light.into(),
            agent,
            buffer: R::build(buffer_config),
        }
    }

    /// Returns the identifier of the light.
    pub fn light(&self) -> &str {
        &self.light
    }

    /// Returns the agent.
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Returns the agent.
    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }

    /// Returns the replay buffer.
    pub fn buffer(&self) -> &R {
        &self.buffer
    }

    /// Consumes the intersection and returns the agent.
    pub fn into_agent(self) -> A {
        self.agent
    }

    /// Stores a transition and trains the model on it.
    ///
    /// The target copy is synchronized before training if `sync` is `true`.
    pub fn learn(&mut self, tr: Transition, sync: bool) -> Result<Option<Record>> {
        self.buffer.push(tr);
        if sync {
            debug!("Synchronize the target model of light {}", self.light);
            self.agent.sync_target()?;
        }
        let record = self.agent.opt_with_record(&mut self.buffer)?;
        Ok(record.map(|r| r.with_prefix(&self.light)))
    }

    /// Saves the model under `<model_dir>/<light>`.
    pub fn save(&self, model_dir: &Path) {
        let path = model_dir.join(&self.light);
        match self.agent.save_params(&path) {
            Ok(()) => info!("Saved the model in {:?}.", &path),
            Err(e) => warn!("Failed to save the model in {:?}: {}", &path, e),
        }
    }
}
