//! Configuration of [`Trainer`](super::Trainer).
use crate::{
    explorer::EpsilonGreedyConfig,
    reward::{RewardConfig, WaitingMetric},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of episodes of a training run.
    pub n_episodes: usize,

    /// The number of environment steps of an episode.
    pub max_steps: usize,

    /// Interval of phase decisions in environment steps.
    pub decision_interval: usize,

    /// Interval of target network synchronization in environment steps.
    pub target_sync_interval: usize,

    /// The number of past phases of each light in the state vector.
    pub history_len: usize,

    /// The number of steps over which detector counts are summed.
    pub detector_window: usize,

    /// If `true`, detector totals are included in the state vector.
    pub use_detectors: bool,

    /// The number of episodes over which the reported diagnostics are averaged.
    pub report_window: usize,

    /// Waiting metric of the episode diagnostics.
    pub waiting_metric: WaitingMetric,

    /// Reward.
    pub reward: RewardConfig,

    /// Exploration.
    pub explorer: EpsilonGreedyConfig,

    /// If `true`, transitions of the last step of an episode are terminal.
    pub mark_episode_end: bool,

    /// Where to save the trained models.
    pub model_dir: Option<String>,

    /// Interval of saving the models in episodes.
    pub save_interval: Option<usize>,

    /// Random seed of exploration.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_episodes: 1000,
            max_steps: 500,
            decision_interval: 15,
            target_sync_interval: 10,
            history_len: 5,
            detector_window: 20,
            use_detectors: false,
            report_window: 11,
            waiting_metric: WaitingMetric::TotalWaitingTime,
            reward: RewardConfig::default(),
            explorer: EpsilonGreedyConfig::default(),
            mark_episode_end: false,
            model_dir: None,
            save_interval: None,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of episodes.
    pub fn n_episodes(mut self, v: usize) -> Self {
        self.n_episodes = v;
        self
    }

    /// Sets the number of environment steps of an episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the interval of phase decisions in environment steps.
    pub fn decision_interval(mut self, v: usize) -> Self {
        self.decision_interval = v;
        self
    }

    /// Sets the interval of target network synchronization in environment steps.
    pub fn target_sync_interval(mut self, v: usize) -> Self {
        self.target_sync_interval = v;
        self
    }

    /// Sets the length of the phase history of each light.
    pub fn history_len(mut self, v: usize) -> Self {
        self.history_len = v;
        self
    }

    /// Sets the window of detector counts.
    pub fn detector_window(mut self, v: usize) -> Self {
        self.detector_window = v;
        self
    }

    /// Includes detector totals in the state vector.
    pub fn use_detectors(mut self, v: bool) -> Self {
        self.use_detectors = v;
        self
    }

    /// Sets the number of episodes over which diagnostics are averaged.
    pub fn report_window(mut self, v: usize) -> Self {
        self.report_window = v;
        self
    }

    /// Sets the waiting metric.
    pub fn waiting_metric(mut self, v: WaitingMetric) -> Self {
        self.waiting_metric = v;
        self
    }

    /// Sets the reward configuration.
    pub fn reward(mut self, v: RewardConfig) -> Self {
        self.reward = v;
        self
    }

    /// Sets the exploration configuration.
    pub fn explorer(mut self, v: EpsilonGreedyConfig) -> Self {
        self.explorer = v;
        self
    }

    /// Marks the transitions of the last step of an episode as terminal.
    pub fn mark_episode_end(mut self, v: bool) -> Self {
        self.mark_episode_end = v;
        self
    }

    /// Sets the directory where the models are saved.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the interval of saving the models in episodes.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = Some(v);
        self
    }

    /// Sets the random seed of exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
