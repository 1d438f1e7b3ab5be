//! Train per-light [`Agent`]s on a [`Simulator`].
//!
//! A training run is a sequence of episodes. Each episode resets the lights and the
//! observation, then runs a fixed number of environment steps. At every step
//!
//! 1. lights whose decision is due and whose phase admits a decision pick an action
//!    with the epsilon-greedy explorer, the others hold their program,
//! 2. the actions are applied and the simulator advances one step,
//! 3. the new state and the reward are read from the simulator,
//! 4. each light that acted stores its transition and trains its own model,
//! 5. epsilon decays and the step record is written.
//!
//! At the end of the episode the diagnostics are logged, stored in the recorder and
//! flushed, and all vehicles are removed from the network.
mod config;
mod intersection;
mod state;
use crate::{
    error::check_dim,
    observation::ObservationBuilder,
    phase::{apply_action, initial_phase, legal_actions, N_ACTIONS},
    record::{AggregateRecorder, Record, RecordValue, Recorder},
    reward::{measure, Measurement},
    Agent, ReplayBufferBase, Simulator, StateVector, Transition,
};
use anyhow::{bail, Result};
use chrono::Local;
pub use config::TrainerConfig;
pub use intersection::Intersection;
use log::{error, info, warn};
pub use state::{EpisodeSummary, TrainingReport, TrainingState};
use std::path::Path;

/// Outcome of a single environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// State observed after the step.
    pub next_state: StateVector,

    /// Reward and diagnostics of the step.
    pub measurement: Measurement,

    /// Action of each light, `None` if the light held its program.
    pub actions: Vec<Option<usize>>,

    /// Number of phase switches started at the step.
    pub n_switches: usize,

    /// Step record, including the records of the optimization steps.
    pub record: Record,
}

/// Manages the training loop of the agents controlling the lights of a simulator.
pub struct Trainer<S, A, R>
where
    S: Simulator,
    A: Agent<R>,
    R: ReplayBufferBase,
{
    config: TrainerConfig,
    sim: S,
    intersections: Vec<Intersection<A, R>>,
    lights: Vec<String>,
    detectors: Vec<String>,
    lanes: Vec<String>,
    observation: ObservationBuilder,
}

impl<S, A, R> Trainer<S, A, R>
where
    S: Simulator,
    A: Agent<R>,
    R: ReplayBufferBase,
{
    /// Constructs a trainer.
    ///
    /// `agents` gives one model per controlled light, in the order of
    /// [`Simulator::controlled_lights`]. Each light gets its own replay buffer built
    /// from [`ReplayBufferBase::config_for`] applied to `replay_buffer_config`. Fails with
    /// [`SignalError::DimensionMismatch`](crate::error::SignalError::DimensionMismatch)
    /// if the input size of a model differs from the dimension of the state vector.
    pub fn build(
        config: TrainerConfig,
        mut sim: S,
        agents: Vec<A>,
        replay_buffer_config: &R::Config,
    ) -> Result<Self> {
        let lights = sim.controlled_lights()?;
        let detectors = sim.detectors()?;
        let lanes = sim.lanes()?;

        if agents.len() != lights.len() {
            bail!(
                "{} agents were given for {} controlled lights",
                agents.len(),
                lights.len()
            );
        }

        let observation = ObservationBuilder::new(
            lights.len(),
            detectors.len(),
            config.history_len,
            config.detector_window,
            config.use_detectors,
        );
        let state_dim = observation.state_dim();
        for agent in agents.iter() {
            check_dim(agent.in_dim(), state_dim)?;
            check_dim(N_ACTIONS, agent.n_actions())?;
        }
        info!(
            "{} lights, {} detectors, {} lanes, state dimension {}",
            lights.len(),
            detectors.len(),
            lanes.len(),
            state_dim
        );

        let intersections = lights
            .iter()
            .zip(agents)
            .enumerate()
            .map(|(i, (light, agent))| {
                let buffer_config = R::config_for(replay_buffer_config, i);
                Intersection::new(light.clone(), agent, &buffer_config)
            })
            .collect();

        let config = TrainerConfig {
            decision_interval: config.decision_interval.max(1),
            target_sync_interval: config.target_sync_interval.max(1),
            ..config
        };

        Ok(Self {
            config,
            sim,
            intersections,
            lights,
            detectors,
            lanes,
            observation,
        })
    }

    /// Returns the dimension of the state vector.
    pub fn state_dim(&self) -> usize {
        self.observation.state_dim()
    }

    /// Returns the identifiers of the controlled lights.
    pub fn lights(&self) -> &[String] {
        &self.lights
    }

    /// Returns the intersections, in the order of the lights.
    pub fn intersections(&self) -> &[Intersection<A, R>] {
        &self.intersections
    }

    /// Returns the simulator.
    pub fn simulator(&self) -> &S {
        &self.sim
    }

    /// Consumes the trainer and returns the simulator and the trained agents.
    pub fn into_parts(self) -> (S, Vec<A>) {
        let agents = self
            .intersections
            .into_iter()
            .map(Intersection::into_agent)
            .collect();
        (self.sim, agents)
    }

    fn save_models(&self, model_dir: &Path) {
        for ix in self.intersections.iter() {
            ix.save(model_dir);
        }
    }

    /// Performs an environment step from state `s` at step `t` of the episode.
    pub fn step(
        &mut self,
        t: usize,
        s: &StateVector,
        terminal: bool,
        state: &mut TrainingState,
    ) -> Result<StepOutcome> {
        let decide = t % self.config.decision_interval == 0;

        // Decisions
        let mut actions = Vec::with_capacity(self.lights.len());
        for (light, ix) in self.lights.iter().zip(self.intersections.iter()) {
            let action = match decide {
                false => None,
                true => {
                    let legal = legal_actions(self.sim.phase(light)?);
                    match legal.is_empty() {
                        true => None,
                        false => state
                            .explorer
                            .action(ix.agent(), s, &legal, &mut state.rng)?,
                    }
                }
            };
            actions.push(action);
        }

        // Environment step
        let mut n_switches = 0;
        for (light, action) in self.lights.iter().zip(actions.iter()) {
            if apply_action(&mut self.sim, light, *action)? {
                n_switches += 1;
            }
        }
        self.sim.advance()?;
        let next_state = self
            .observation
            .observe(&mut self.sim, &self.lights, &self.detectors)?;
        let measurement = measure(
            &mut self.sim,
            &self.lanes,
            &self.config.reward,
            self.config.waiting_metric,
        )?;

        // Optimization of the lights that acted
        let sync = state.env_steps % self.config.target_sync_interval == 0;
        let mut record = Record::empty();
        for (ix, action) in self.intersections.iter_mut().zip(actions.iter()) {
            if let Some(a) = action {
                let tr = Transition::new(
                    s.clone(),
                    *a,
                    measurement.reward,
                    next_state.clone(),
                    terminal,
                );
                if let Some(r) = ix.learn(tr, sync)? {
                    record.merge_inplace(r);
                }
            }
        }

        state.explorer.decay();
        state.env_steps += 1;

        record.insert("env_steps", RecordValue::Scalar(state.env_steps as f32));
        record.insert("reward", RecordValue::Scalar(measurement.reward));
        record.insert("state", RecordValue::Array1(next_state.as_slice().to_vec()));
        record.insert(
            "actions",
            RecordValue::Array1(
                actions
                    .iter()
                    .map(|a| a.map_or(-1.0, |a| a as f32))
                    .collect(),
            ),
        );
        record.insert("n_switches", RecordValue::Scalar(n_switches as f32));

        Ok(StepOutcome {
            next_state,
            measurement,
            actions,
            n_switches,
            record,
        })
    }

    /// Runs an episode and returns the updated state with the episode diagnostics.
    pub fn run_episode<Rec>(
        &mut self,
        mut state: TrainingState,
        recorder: &mut Rec,
    ) -> Result<(TrainingState, EpisodeSummary)>
    where
        Rec: Recorder + AggregateRecorder,
    {
        // Reset
        self.observation.reset();
        for light in self.lights.iter() {
            self.sim.set_phase(light, initial_phase())?;
        }
        let mut s = StateVector::zeros(self.observation.state_dim());
        let mut cumulative_reward = 0f32;
        let mut total_waiting = 0f32;
        let mut total_emission = 0f32;
        let mut n_switches = 0;

        let max_steps = self.config.max_steps;
        for t in 0..max_steps {
            let terminal = self.config.mark_episode_end && t + 1 == max_steps;
            let outcome = self.step(t, &s, terminal, &mut state)?;

            cumulative_reward += outcome.measurement.reward;
            total_waiting += outcome.measurement.waiting;
            total_emission += outcome.measurement.emission;
            n_switches += outcome.n_switches;
            recorder.write(outcome.record);
            s = outcome.next_state;
        }

        // Terminate
        let steps = max_steps.max(1) as f32;
        let avg_waiting = total_waiting / steps;
        let avg_emission = total_emission / steps;
        let (moving_avg_waiting, moving_avg_emission) =
            state.push_averages(avg_waiting, avg_emission);
        let summary = EpisodeSummary {
            episode: state.episodes,
            steps: max_steps,
            cumulative_reward,
            avg_waiting,
            avg_emission,
            moving_avg_waiting,
            moving_avg_emission,
            n_switches,
            eps: state.explorer.eps(),
            finished_at: Local::now(),
        };
        info!(
            "Episode {} completed with average emission {:.1}, average waiting {:.1}, reward {:.2}, epsilon {:.4}",
            summary.episode,
            summary.moving_avg_emission,
            summary.moving_avg_waiting,
            summary.cumulative_reward,
            summary.eps
        );

        recorder.store(summary.to_record());
        recorder.flush(state.episodes as _);
        self.sim.remove_all_vehicles()?;
        state.episodes += 1;

        Ok((state, summary))
    }

    /// Runs the training loop.
    ///
    /// On any error the records are flushed, the network is cleared and the
    /// connection to the simulator is released before the error is returned.
    pub fn train<Rec>(&mut self, recorder: &mut Rec) -> Result<TrainingReport>
    where
        Rec: Recorder + AggregateRecorder,
    {
        let mut state = TrainingState::new(&self.config);
        let mut summaries = Vec::with_capacity(self.config.n_episodes);
        let model_dir = self.config.model_dir.clone();

        for episode in 0..self.config.n_episodes {
            state = match self.run_episode(state, recorder) {
                Ok((state, summary)) => {
                    summaries.push(summary);
                    state
                }
                Err(e) => return Err(self.abort(e, episode, recorder)),
            };

            if let (Some(dir), Some(interval)) = (&model_dir, self.config.save_interval) {
                if interval > 0 && state.episodes % interval == 0 {
                    self.save_models(Path::new(dir));
                }
            }
        }

        if let Some(dir) = &model_dir {
            self.save_models(Path::new(dir));
        }
        self.sim.close()?;

        Ok(TrainingReport { summaries, state })
    }

    fn abort<Rec>(&mut self, e: anyhow::Error, episode: usize, recorder: &mut Rec) -> anyhow::Error
    where
        Rec: AggregateRecorder,
    {
        error!("Training aborted in episode {}: {:#}", episode, e);
        recorder.flush(episode as _);
        if let Err(e) = self.sim.remove_all_vehicles() {
            warn!("Failed to clear the network: {:#}", e);
        }
        if let Err(e) = self.sim.close() {
            warn!("Failed to close the simulator: {:#}", e);
        }
        e
    }
}
