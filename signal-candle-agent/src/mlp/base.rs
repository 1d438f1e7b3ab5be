use super::MlpConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{Init, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
///
/// Weights and biases are created with zeros; see
/// [`lecun_uniform`](crate::util::lecun_uniform) for the initialization of the weights.
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let dims: Vec<usize> = std::iter::once(config.in_dim)
        .chain(config.units.iter().copied())
        .chain(std::iter::once(config.out_dim))
        .collect();
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| -> Result<Linear> {
            let (in_dim, out_dim) = (w[0], w[1]);
            let vs = vs.pp(format!("ln{}", i));
            let ws = vs.get_with_hints((out_dim, in_dim), "weight", Init::Const(0.))?;
            let bs = vs.get_with_hints(out_dim, "bias", Init::Const(0.))?;
            Ok(Linear::new(ws, Some(bs)))
        })
        .collect()
}

/// Multilayer perceptron with ReLU activation function and linear output.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let mut xs = xs.to_device(&self.device)?;
        let n_layers = self.layers.len();

        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i + 1 < n_layers {
                xs = xs.relu()?;
            }
        }

        Ok(xs)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;

        Ok(Self { device, layers })
    }
}
