//! Configuration of [`Dqn`](super::Dqn).
use super::DqnModelConfig;
use crate::{model::SubModel1, util::OutDim, Device};
use anyhow::Result;
use candle_core::Tensor;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    marker::PhantomData,
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn).
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Configuration of the action-value network and its optimizer.
    pub model_config: DqnModelConfig<Q::Config>,

    /// Maximum number of transitions sampled for an optimization step.
    pub batch_size: usize,

    /// Discount factor.
    pub discount_factor: f64,

    /// Device on which the networks are placed.
    pub device: Device,

    /// Random seed of the weight initialization.
    pub seed: u64,

    #[serde(skip)]
    phantom: PhantomData<Q>,
}

impl<Q> Clone for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            model_config: self.model_config.clone(),
            batch_size: self.batch_size,
            discount_factor: self.discount_factor,
            device: self.device,
            seed: self.seed,
            phantom: PhantomData,
        }
    }
}

impl<Q> Default for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            batch_size: 32,
            discount_factor: 0.9,
            device: Device::Cpu,
            seed: 42,
            phantom: PhantomData,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: DqnModelConfig<Q::Config>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Overrides the learning rate of the optimizer.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.model_config = self.model_config.learning_rate(lr);
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(rdr)?)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
