//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use signal_core::{error::check_dim, StateVector};
mod named_tensors;
pub use named_tensors::NamedTensors;

/// Interface for handling input dimensions.
pub trait InDim {
    /// Returns the input dimension.
    fn get_in_dim(&self) -> usize;
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
///
/// With `tau == 1.0` the source values are copied.
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().unwrap();
    trace!("src");
    let src = src.data().lock().unwrap();

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is missing in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        if tau == 1.0 {
            v_dest.set(t_src)?;
        } else {
            let t_dest = v_dest.as_tensor();
            let t_dest = ((tau * t_src)? + (1.0 - tau) * t_dest)?;
            v_dest.set(&t_dest)?;
        }
    }

    Ok(())
}

/// Draws the weight matrices of `varmap` uniformly from `[-limit, limit)` with
/// `limit = sqrt(3 / fan_in)`.
///
/// Variables whose names end with `weight` and have shape `(fan_out, fan_in)` are
/// initialized, in the order of their names. Biases are left untouched.
pub fn lecun_uniform(varmap: &VarMap, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = varmap.data().lock().unwrap();
    let mut names: Vec<&String> = data.keys().filter(|k| k.ends_with("weight")).collect();
    names.sort();

    for name in names {
        let var = &data[name];
        let (fan_out, fan_in) = var.dims2()?;
        let limit = (3.0 / fan_in.max(1) as f32).sqrt();
        let values: Vec<f32> = (0..fan_out * fan_in)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        var.set(&Tensor::from_vec(values, (fan_out, fan_in), var.device())?)?;
    }

    Ok(())
}

/// Stacks state vectors into a tensor of shape `(n, in_dim)`.
///
/// Fails with a dimension mismatch if a state has another length than `in_dim`.
pub fn states_to_tensor<'a, I>(states: I, in_dim: usize, device: &Device) -> Result<Tensor>
where
    I: IntoIterator<Item = &'a StateVector>,
{
    let mut data = vec![];
    let mut n = 0;
    for s in states {
        check_dim(in_dim, s.len())?;
        data.extend_from_slice(s.as_slice());
        n += 1;
    }
    Ok(Tensor::from_vec(data, (n, in_dim), device)?)
}

/// Returns the index of the largest value, the lowest one on ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;

    fn varmap_with(name: &str, t: &Tensor) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get(t.dims(), name, init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get(name).unwrap().set(t)?;
        Ok(vm)
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + (1.0 - tau) * &t_dest)?;

        let vm_src = varmap_with("var1", &t_src)?;
        let vm_dest = varmap_with("var1", &t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = vm_dest.data().lock().unwrap()["var1"].as_tensor().clone();
        assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

        // Hard copy
        track(&vm_dest, &vm_src, 1.0)?;
        let t_ = vm_dest.data().lock().unwrap()["var1"].as_tensor().clone();
        assert_eq!(t_.to_vec1::<f32>()?, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_track_missing_variable() -> Result<()> {
        let t = Tensor::zeros((2,), DType::F32, &Device::Cpu)?;
        let vm_src = varmap_with("a", &t)?;
        let vm_dest = varmap_with("b", &t)?;
        assert!(track(&vm_dest, &vm_src, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_lecun_uniform() -> Result<()> {
        let t = Tensor::zeros((4, 12), DType::F32, &Device::Cpu)?;
        let vm1 = varmap_with("ln0.weight", &t)?;
        let vm2 = varmap_with("ln0.weight", &t)?;
        lecun_uniform(&vm1, 3)?;
        lecun_uniform(&vm2, 3)?;

        let w1 = vm1.data().lock().unwrap()["ln0.weight"].as_tensor().clone();
        let w2 = vm2.data().lock().unwrap()["ln0.weight"].as_tensor().clone();
        let w1 = w1.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(w1, w2.flatten_all()?.to_vec1::<f32>()?);
        assert!(w1.iter().all(|v| v.abs() <= 0.5));
        assert!(w1.iter().any(|v| *v != 0.0));
        Ok(())
    }

    #[test]
    fn test_states_to_tensor() -> Result<()> {
        let states = vec![StateVector::from(vec![1.0, 2.0]), StateVector::zeros(2)];
        let t = states_to_tensor(states.iter(), 2, &Device::Cpu)?;
        assert_eq!(t.to_vec2::<f32>()?, vec![vec![1.0, 2.0], vec![0.0, 0.0]]);
        assert!(states_to_tensor(states.iter(), 3, &Device::Cpu).is_err());
        Ok(())
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.0, 0.0]), 0);
        assert_eq!(argmax(&[0.0, 1.0, 1.0]), 1);
        assert_eq!(argmax(&[2.0, 1.0]), 0);
    }
}
