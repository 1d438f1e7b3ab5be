//! Gradient descent on the network parameters.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW, SGD};
use serde::{Deserialize, Serialize};

/// Optimizer settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Plain stochastic gradient descent without momentum.
    Sgd {
        /// Learning rate.
        lr: f64,
    },

    /// AdamW with the default moment decays of [`candle_nn`].
    AdamW {
        /// Learning rate.
        lr: f64,

        /// Decoupled weight decay.
        #[serde(default)]
        weight_decay: f64,
    },
}

impl OptimizerConfig {
    /// Builds an optimizer updating `vars`.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        let opt = match *self {
            Self::Sgd { lr } => Optimizer::Sgd(SGD::new(vars, lr)?),
            Self::AdamW { lr, weight_decay } => {
                let params = ParamsAdamW {
                    lr,
                    weight_decay,
                    ..ParamsAdamW::default()
                };
                Optimizer::AdamW(AdamW::new(vars, params)?)
            }
        };
        Ok(opt)
    }

    /// Overrides the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        match &mut self {
            Self::Sgd { lr } | Self::AdamW { lr, .. } => *lr = v,
        }
        self
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Sgd { lr: 0.01 }
    }
}

/// Optimizer of [`candle_nn`] selected by [`OptimizerConfig`].
pub enum Optimizer {
    /// Stochastic gradient descent.
    Sgd(SGD),

    /// AdamW.
    AdamW(AdamW),
}

impl Optimizer {
    /// Computes the gradients of `loss` and updates the variables.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Sgd(opt) => opt.backward_step(loss)?,
            Self::AdamW(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}
