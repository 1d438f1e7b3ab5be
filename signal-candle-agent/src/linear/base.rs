//! Linear action-value model trained with one-step TD learning.
use super::{LinearQConfig, WeightInit};
use anyhow::{bail, Result};
use log::info;
use ndarray::{Array1, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use signal_core::{
    error::{check_dim, SignalError},
    record::{Record, RecordValue},
    Agent, Policy, ReplayBufferBase, StateVector, Transition,
};
use std::{fs, path::Path};

const WEIGHTS_FILE: &str = "linear_q.bin";

#[derive(Serialize, Deserialize)]
struct Weights {
    weights: Vec<Array1<f32>>,
}

/// Linear action-value model.
///
/// The value of action `a` in state `s` is `weights[a] · s`. The model is trained on
/// every transition as soon as it is produced; only the weight vector of the action
/// taken changes.
///
/// Optimization reads the newest transition of the replay buffer and nothing else,
/// so a buffer of capacity 1 is enough.
pub struct LinearQ {
    in_dim: usize,
    weights: Vec<Array1<f32>>,
    learning_rate: f32,
    discount_factor: f32,
    n_opts: usize,
}

impl LinearQ {
    /// Constructs the model.
    pub fn build(config: &LinearQConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let weights = (0..config.n_actions)
            .map(|_| match config.init {
                WeightInit::Uniform => Array1::from_shape_fn(config.in_dim, |_| rng.gen::<f32>()),
                WeightInit::Zeros => Array1::zeros(config.in_dim),
            })
            .collect();

        Self {
            in_dim: config.in_dim,
            weights,
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            n_opts: 0,
        }
    }

    /// Returns the weight vectors, one per action.
    pub fn weights(&self) -> &[Array1<f32>] {
        &self.weights
    }

    /// Returns the number of updates performed so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Serializes the weight vectors with bincode.
    pub fn encode_weights(&self) -> Result<Vec<u8>> {
        let weights = Weights {
            weights: self.weights.clone(),
        };
        Ok(bincode::serialize(&weights)?)
    }

    /// Restores weight vectors written by [`LinearQ::encode_weights`].
    ///
    /// Fails with [`SignalError::WeightFormat`] if the blob cannot be decoded or the
    /// number or length of the vectors differs; the weights are left unchanged then.
    pub fn decode_weights(&mut self, blob: &[u8]) -> Result<()> {
        let Weights { weights } = bincode::deserialize(blob)
            .map_err(|e| SignalError::WeightFormat(e.to_string()))?;

        if weights.len() != self.weights.len() {
            return Err(SignalError::WeightFormat(format!(
                "expected {} weight vectors, got {}",
                self.weights.len(),
                weights.len()
            ))
            .into());
        }
        if let Some(w) = weights.iter().find(|w| w.len() != self.in_dim) {
            return Err(SignalError::WeightFormat(format!(
                "expected weight vectors of length {}, got {}",
                self.in_dim,
                w.len()
            ))
            .into());
        }

        self.weights = weights;
        Ok(())
    }

    fn input<'a>(&self, state: &'a StateVector) -> Result<ArrayView1<'a, f32>> {
        check_dim(self.in_dim, state.len())?;
        Ok(ArrayView1::from(state.as_slice()))
    }

    /// Applies one semi-gradient TD update and returns the TD error.
    ///
    /// The bootstrapped value is dropped for terminal transitions.
    pub fn update(&mut self, tr: &Transition) -> Result<f32> {
        let x = self.input(&tr.state)?;
        let x_next = self.input(&tr.next_state)?;
        if tr.action >= self.weights.len() {
            bail!(
                "Action {} is out of range for {} actions",
                tr.action,
                self.weights.len()
            );
        }

        let target = match tr.terminal {
            true => tr.reward,
            false => {
                let best_next = self.best_action(&tr.next_state)?;
                tr.reward + self.discount_factor * self.weights[best_next].dot(&x_next)
            }
        };
        let td_err = target - self.weights[tr.action].dot(&x);
        self.weights[tr.action].scaled_add(self.learning_rate * td_err, &x);

        Ok(td_err)
    }
}

impl Policy for LinearQ {
    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn n_actions(&self) -> usize {
        self.weights.len()
    }

    fn action_values(&self, state: &StateVector) -> Result<Vec<f32>> {
        let x = self.input(state)?;
        Ok(self.weights.iter().map(|w| w.dot(&x)).collect())
    }

    /// Ties go to the lower action index.
    fn best_action(&self, state: &StateVector) -> Result<usize> {
        let q = self.action_values(state)?;
        let mut best = 0;
        for a in 1..q.len() {
            if q[a] > q[best] {
                best = a;
            }
        }
        Ok(best)
    }
}

impl<R: ReplayBufferBase> Agent<R> for LinearQ {
    /// Trains the model on the most recent transition in the buffer.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        let td_err = match buffer.newest() {
            None => return Ok(None),
            Some(tr) => self.update(tr)?,
        };
        self.n_opts += 1;

        Ok(Some(Record::from_slice(&[
            ("td_error", RecordValue::Scalar(td_err)),
            ("n_opts", RecordValue::Scalar(self.n_opts as f32)),
        ])))
    }

    fn export_weights(&self) -> Result<Vec<u8>> {
        self.encode_weights()
    }

    fn import_weights(&mut self, blob: &[u8]) -> Result<()> {
        self.decode_weights(blob)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let path = path.join(WEIGHTS_FILE);
        fs::write(&path, self.encode_weights()?)?;
        info!("Save linear model to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let path = path.join(WEIGHTS_FILE);
        self.decode_weights(&fs::read(&path)?)?;
        info!("Load linear model from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::replay_buffer::{ExperienceReplay, ExperienceReplayConfig};
    use tempdir::TempDir;

    fn zeros(in_dim: usize) -> LinearQ {
        LinearQ::build(
            &LinearQConfig::default()
                .in_dim(in_dim)
                .init(WeightInit::Zeros),
        )
    }

    #[test]
    fn test_single_update() -> Result<()> {
        let mut model = zeros(2);
        let tr = Transition::new(
            vec![1.0, 0.0].into(),
            0,
            1.0,
            vec![0.0, 1.0].into(),
            false,
        );
        let td_err = model.update(&tr)?;

        assert_eq!(td_err, 1.0);
        assert_eq!(model.weights()[0].to_vec(), vec![0.01, 0.0]);
        assert_eq!(model.weights()[1].to_vec(), vec![0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_tie_goes_to_lower_index() -> Result<()> {
        let model = zeros(3);
        assert_eq!(model.best_action(&StateVector::from(vec![1.0, 2.0, 3.0]))?, 0);

        let model = LinearQ::build(&LinearQConfig::default().in_dim(3).n_actions(4));
        let state = StateVector::from(vec![0.3, 0.1, 0.7]);
        let a = model.best_action(&state)?;
        assert!(a < 4);
        Ok(())
    }

    #[test]
    fn test_uniform_init_range() {
        let model = LinearQ::build(&LinearQConfig::default().in_dim(50));
        for w in model.weights() {
            assert!(w.iter().all(|v| (0.0..1.0).contains(v)));
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = zeros(4);
        let err = model.best_action(&StateVector::zeros(3)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_opt_uses_newest_transition() -> Result<()> {
        let mut model = zeros(2);
        let mut buffer = ExperienceReplay::build(&ExperienceReplayConfig::default());
        assert!(Agent::<ExperienceReplay>::opt_with_record(&mut model, &mut buffer)?.is_none());

        buffer.push(Transition::new(
            vec![0.0, 1.0].into(),
            1,
            2.0,
            vec![0.0, 0.0].into(),
            false,
        ));
        let record = Agent::<ExperienceReplay>::opt_with_record(&mut model, &mut buffer)?
            .expect("a transition is available");
        assert_eq!(record.get_scalar("td_error")?, 2.0);
        assert_eq!(model.weights()[1].to_vec(), vec![0.0, 0.02]);
        assert_eq!(model.weights()[0].to_vec(), vec![0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_weights_round_trip() -> Result<()> {
        let src = LinearQ::build(&LinearQConfig::default().in_dim(5).seed(7));
        let mut dest = zeros(5);
        let blob = Agent::<ExperienceReplay>::export_weights(&src)?;
        Agent::<ExperienceReplay>::import_weights(&mut dest, &blob)?;
        assert_eq!(src.weights(), dest.weights());

        let dir = TempDir::new("linear_q")?;
        Agent::<ExperienceReplay>::save_params(&src, dir.path())?;
        let mut loaded = zeros(5);
        Agent::<ExperienceReplay>::load_params(&mut loaded, dir.path())?;
        assert_eq!(src.weights(), loaded.weights());
        Ok(())
    }

    #[test]
    fn test_import_rejects_other_shape() -> Result<()> {
        let src = zeros(5);
        let mut dest = zeros(6);
        let blob = Agent::<ExperienceReplay>::export_weights(&src)?;
        let err = Agent::<ExperienceReplay>::import_weights(&mut dest, &blob).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::WeightFormat(_))
        ));

        let err = dest.decode_weights(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::WeightFormat(_))
        ));
        assert!(dest.weights().iter().all(|w| w.len() == 6));
        Ok(())
    }
}
