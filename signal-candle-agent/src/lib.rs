//! Action-value models for traffic-light control.
//!
//! * [`LinearQ`](linear::LinearQ): one weight vector per action, trained online with
//!   single-sample semi-gradient TD learning. Implemented with
//!   [ndarray](https://crates.io/crates/ndarray).
//! * [`Dqn`](dqn::Dqn): a shallow network with a target copy, trained on batches
//!   sampled from the replay buffer. Implemented with
//!   [candle](https://crates.io/crates/candle-core).
//!
//! Both implement [`Agent`](signal_core::Agent) and can be trained with
//! [`Trainer`](signal_core::Trainer).
pub mod dqn;
pub mod linear;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Returns the corresponding [`candle_core::Device`].
    pub fn to_candle(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}
