use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{lecun_uniform, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Network and optimizer settings of [`DqnModel`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnModelConfig<Q: OutDim> {
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
}

impl<Q: OutDim> Default for DqnModelConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the network settings.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets the number of actions. No-op until the network settings are given.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = self.q_config.as_mut() {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Overrides the learning rate of the optimizer.
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.opt_config = self.opt_config.learning_rate(lr);
        self
    }

    /// Reads the settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(rdr)?)
    }

    /// Writes the settings to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value network together with its variables and optimizer.
///
/// The variables live in a [`VarMap`], so that two instances built from the same
/// settings have the same variable names and can be copied into each other.
pub struct DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim,
{
    varmap: VarMap,
    q: Q,
    opt: Optimizer,

    // Number of actions
    pub(super) out_dim: usize,
}

impl<Q> DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Builds the network on `device`.
    ///
    /// Weights are drawn with [`lecun_uniform`] from `seed`, biases are zero.
    pub fn build(config: &DqnModelConfig<Q::Config>, device: &Device, seed: u64) -> Result<Self> {
        let q_config = config.q_config.clone().context("q_config is not set.")?;
        let out_dim = q_config.get_out_dim();

        let varmap = VarMap::new();
        let q = Q::build(
            VarBuilder::from_varmap(&varmap, DType::F32, device),
            q_config,
        )?;
        lecun_uniform(&varmap, seed)?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            q,
            opt,
            out_dim,
        })
    }

    /// Returns the action values of a batch of states, shape `(n, out_dim)`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.q.forward(xs)
    }

    /// Applies one optimizer step on `loss`.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Returns the variables of the network.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Writes the variables to a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Saved the network to {:?}", path.as_ref());
        Ok(())
    }

    /// Reads the variables from a file written by [`DqnModel::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Loaded the network from {:?}", path.as_ref());
        Ok(())
    }
}
