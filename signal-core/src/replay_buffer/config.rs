//! Configuration of [`ExperienceReplay`](super::ExperienceReplay).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ExperienceReplay`](super::ExperienceReplay).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExperienceReplayConfig {
    /// The maximum number of transitions kept in the buffer.
    pub capacity: usize,

    /// Random seed used for sampling batches.
    pub seed: u64,
}

impl Default for ExperienceReplayConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            seed: 42,
        }
    }
}

impl ExperienceReplayConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Constructs [`ExperienceReplayConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ExperienceReplayConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
