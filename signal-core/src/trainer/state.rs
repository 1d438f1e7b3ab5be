//! State threaded through the training loop and episode diagnostics.
use super::TrainerConfig;
use crate::{
    explorer::EpsilonGreedy,
    record::{
        Record,
        RecordValue::{DateTime, Scalar},
    },
};
use chrono::{DateTime as ChronoDateTime, Local};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::VecDeque;

/// Mutable state of a training run.
///
/// The state is passed into each episode and returned from it, so that the
/// episode counter, the global step counter and exploration carry over between
/// episodes while nothing else does.
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Exploration.
    pub explorer: EpsilonGreedy,

    /// Environment steps over all episodes.
    pub env_steps: usize,

    /// Number of finished episodes.
    pub episodes: usize,

    pub(super) rng: StdRng,
    window: usize,
    waiting: VecDeque<f32>,
    emission: VecDeque<f32>,
}

impl TrainingState {
    /// Creates the state at the start of a training run.
    pub fn new(config: &TrainerConfig) -> Self {
        Self {
            explorer: EpsilonGreedy::build(&config.explorer),
            env_steps: 0,
            episodes: 0,
            rng: StdRng::seed_from_u64(config.seed),
            window: config.report_window.max(1),
            waiting: VecDeque::new(),
            emission: VecDeque::new(),
        }
    }

    /// Pushes the averages of a finished episode and returns the moving averages
    /// `(waiting, emission)` over the report window.
    pub(super) fn push_averages(&mut self, waiting: f32, emission: f32) -> (f32, f32) {
        fn push(q: &mut VecDeque<f32>, v: f32, window: usize) -> f32 {
            q.push_back(v);
            if q.len() > window {
                q.pop_front();
            }
            q.iter().sum::<f32>() / q.len() as f32
        }

        (
            push(&mut self.waiting, waiting, self.window),
            push(&mut self.emission, emission, self.window),
        )
    }
}

/// Diagnostics of a finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Index of the episode, starting from 0.
    pub episode: usize,

    /// Number of environment steps in the episode.
    pub steps: usize,

    /// Sum of the rewards of the episode.
    pub cumulative_reward: f32,

    /// Per-step average of the waiting metric.
    pub avg_waiting: f32,

    /// Per-step average of the emission.
    pub avg_emission: f32,

    /// Moving average of `avg_waiting` over the report window.
    pub moving_avg_waiting: f32,

    /// Moving average of `avg_emission` over the report window.
    pub moving_avg_emission: f32,

    /// Number of phase switches started in the episode.
    pub n_switches: usize,

    /// Epsilon at the end of the episode.
    pub eps: f32,

    /// Wall-clock time at which the episode ended.
    pub finished_at: ChronoDateTime<Local>,
}

impl EpisodeSummary {
    /// Converts the summary into a [`Record`].
    pub fn to_record(&self) -> Record {
        Record::from_slice(&[
            ("episode", Scalar(self.episode as f32)),
            ("episode_steps", Scalar(self.steps as f32)),
            ("cumulative_reward", Scalar(self.cumulative_reward)),
            ("avg_waiting", Scalar(self.avg_waiting)),
            ("avg_emission", Scalar(self.avg_emission)),
            ("moving_avg_waiting", Scalar(self.moving_avg_waiting)),
            ("moving_avg_emission", Scalar(self.moving_avg_emission)),
            ("n_switches", Scalar(self.n_switches as f32)),
            ("eps", Scalar(self.eps)),
            ("finished_at", DateTime(self.finished_at)),
        ])
    }
}

/// Result of [`Trainer::train`](super::Trainer::train).
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Summaries of all episodes, in order.
    pub summaries: Vec<EpisodeSummary>,

    /// State at the end of the run.
    pub state: TrainingState,
}
