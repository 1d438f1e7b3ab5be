//! Configuration of [`LinearQ`](super::LinearQ).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Initialization of the weights.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WeightInit {
    /// Each entry is drawn uniformly from `[0, 1)`.
    Uniform,

    /// All entries are zero.
    Zeros,
}

/// Configuration of [`LinearQ`](super::LinearQ).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LinearQConfig {
    /// Dimension of the state vector.
    pub in_dim: usize,

    /// Number of actions.
    pub n_actions: usize,

    /// Learning rate of the TD update.
    pub learning_rate: f32,

    /// Discount factor.
    pub discount_factor: f32,

    /// Initialization of the weights.
    pub init: WeightInit,

    /// Random seed of the initialization.
    pub seed: u64,
}

impl Default for LinearQConfig {
    fn default() -> Self {
        Self {
            in_dim: 0,
            n_actions: 2,
            learning_rate: 0.01,
            discount_factor: 0.9,
            init: WeightInit::Uniform,
            seed: 42,
        }
    }
}

impl LinearQConfig {
    /// Sets the dimension of the state vector.
    pub fn in_dim(mut self, v: usize) -> Self {
        self.in_dim = v;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f32) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the initialization of the weights.
    pub fn init(mut self, v: WeightInit) -> Self {
        self.init = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`LinearQConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`LinearQConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
