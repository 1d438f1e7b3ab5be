use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use signal_core::error::SignalError;
use std::collections::BTreeMap;

/// Named tensors copied out of a [`VarMap`].
///
/// Values are kept on the host as flat `f32` vectors with their shapes, so that
/// they can be serialized independently of the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTensors {
    /// Shape and values of each variable.
    pub named_tensors: BTreeMap<String, (Vec<usize>, Vec<f32>)>,
}

impl NamedTensors {
    /// Copy data of [`VarMap`] to CPU.
    pub fn copy_from(vs: &VarMap) -> Result<Self> {
        let data = vs.data().lock().unwrap();
        let mut named_tensors = BTreeMap::new();
        for (name, var) in data.iter() {
            let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;
            named_tensors.insert(name.clone(), (var.dims().to_vec(), values));
        }
        Ok(Self { named_tensors })
    }

    /// Checks that the names and shapes match the variables of `vs` exactly.
    ///
    /// Fails with [`SignalError::WeightFormat`] otherwise.
    pub fn check(&self, vs: &VarMap) -> Result<()> {
        let data = vs.data().lock().unwrap();
        if data.len() != self.named_tensors.len() {
            return Err(SignalError::WeightFormat(format!(
                "expected {} tensors, got {}",
                data.len(),
                self.named_tensors.len()
            ))
            .into());
        }

        for (name, var) in data.iter() {
            let (dims, values) = self
                .named_tensors
                .get(name)
                .ok_or_else(|| SignalError::WeightFormat(format!("missing tensor {}", name)))?;
            if dims.as_slice() != var.dims() || dims.iter().product::<usize>() != values.len() {
                return Err(SignalError::WeightFormat(format!(
                    "tensor {} has shape {:?}, expected {:?}",
                    name,
                    dims,
                    var.dims()
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Copy named tensors to [`VarMap`].
    ///
    /// Runs [`NamedTensors::check`] first; nothing is copied on failure.
    pub fn copy_to(&self, vs: &VarMap) -> Result<()> {
        self.check(vs)?;
        let data = vs.data().lock().unwrap();
        for (name, var) in data.iter() {
            let (dims, values) = &self.named_tensors[name];
            var.set(&Tensor::from_slice(values, dims.as_slice(), var.device())?)?;
        }

        Ok(())
    }
}
