//! Shallow action-value network trained on replayed batches.
use super::{config::DqnConfig, model::DqnModel};
use crate::{
    model::SubModel1,
    util::{argmax, states_to_tensor, track, InDim, NamedTensors, OutDim},
};
use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::loss::mse;
use log::trace;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use signal_core::{
    error::SignalError,
    record::{Record, RecordValue},
    Agent, Policy, ReplayBufferBase, StateVector, Transition,
};
use std::{fs, iter, path::Path};

#[derive(Serialize, Deserialize)]
struct Weights {
    qnet: NamedTensors,
    qnet_tgt: NamedTensors,
}

/// Action-value network with a target copy.
///
/// Actions are selected greedily with the online network. The target network
/// changes only through [`Agent::sync_target`], which copies the online parameters.
///
/// An optimization step regresses the online network on a batch sampled from the
/// replay buffer. For a transition `(s, a, r, s', terminal)` the label of `s` is the
/// online prediction `Q(s)` with entry `a` replaced by
/// `r + discount * Q(s')[argmax Q_tgt(s')]`: the target network picks the next
/// action and the online network evaluates it. A terminal transition adds the
/// sample `(s', [r; n_actions])`. One gradient step on the mean squared error is
/// applied per call.
pub struct Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InDim + std::fmt::Debug + PartialEq + Clone,
{
    qnet: DqnModel<Q>,
    qnet_tgt: DqnModel<Q>,
    in_dim: usize,
    batch_size: usize,
    discount_factor: f32,
    device: Device,
    n_opts: usize,
}

impl<Q> Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Constructs the agent. The target network starts as a copy of the online one.
    pub fn build(config: &DqnConfig<Q>) -> Result<Self> {
        let device = config.device.to_candle()?;
        let in_dim = config
            .model_config
            .q_config
            .as_ref()
            .context("q_config is not set.")?
            .get_in_dim();
        let qnet = DqnModel::build(&config.model_config, &device, config.seed)?;
        let qnet_tgt = DqnModel::build(&config.model_config, &device, config.seed)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Self {
            qnet,
            qnet_tgt,
            in_dim,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor as f32,
            device,
            n_opts: 0,
        })
    }

    /// Returns the number of optimization steps performed so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    fn predict<'a, I>(&self, model: &DqnModel<Q>, states: I) -> Result<Vec<Vec<f32>>>
    where
        I: IntoIterator<Item = &'a StateVector>,
    {
        let xs = states_to_tensor(states, self.in_dim, &self.device)?;
        Ok(model.forward(&xs)?.to_vec2::<f32>()?)
    }

    /// Returns the action values of the target network.
    pub fn target_action_values(&self, state: &StateVector) -> Result<Vec<f32>> {
        let q = self.predict(&self.qnet_tgt, iter::once(state))?;
        Ok(q.into_iter().next().unwrap_or_default())
    }

    /// Assembles the regression inputs and labels of a batch.
    ///
    /// Returns flat row-major inputs and labels and the number of rows.
    fn training_set(&self, batch: &[Transition]) -> Result<(Vec<f32>, Vec<f32>, usize)> {
        let n_actions = self.qnet.out_dim;
        let q = self.predict(&self.qnet, batch.iter().map(|tr| &tr.state))?;
        let q_next = self.predict(&self.qnet, batch.iter().map(|tr| &tr.next_state))?;
        let q_next_tgt = self.predict(&self.qnet_tgt, batch.iter().map(|tr| &tr.next_state))?;

        let mut xs = Vec::with_capacity(2 * batch.len() * self.in_dim);
        let mut ys = Vec::with_capacity(2 * batch.len() * n_actions);
        let mut rows = 0;

        for (i, tr) in batch.iter().enumerate() {
            if tr.action >= n_actions {
                bail!("Action {} is out of range for {} actions", tr.action, n_actions);
            }
            let best_next = argmax(&q_next_tgt[i]);
            let target = tr.reward + self.discount_factor * q_next[i][best_next];

            let mut label = q[i].clone();
            label[tr.action] = target;
            xs.extend_from_slice(tr.state.as_slice());
            ys.extend(label);
            rows += 1;

            if tr.terminal {
                xs.extend_from_slice(tr.next_state.as_slice());
                ys.extend(iter::repeat(tr.reward).take(n_actions));
                rows += 1;
            }
        }

        Ok((xs, ys, rows))
    }

    /// Applies one gradient step on a batch and returns the loss.
    ///
    /// Returns `None` without touching the parameters if the batch is empty.
    pub fn train_on_batch(&mut self, batch: &[Transition]) -> Result<Option<f32>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let (xs, ys, rows) = self.training_set(batch)?;
        let xs = Tensor::from_vec(xs, (rows, self.in_dim), &self.device)?;
        let ys = Tensor::from_vec(ys, (rows, self.qnet.out_dim), &self.device)?;
        let pred = self.qnet.forward(&xs)?;
        let loss = mse(&pred, &ys)?;
        self.qnet.backward_step(&loss)?;

        let loss = loss.to_scalar::<f32>()?;
        trace!("loss = {}, rows = {}", loss, rows);
        Ok(Some(loss))
    }
}

impl<Q> Policy for Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InDim + std::fmt::Debug + PartialEq + Clone,
{
    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn n_actions(&self) -> usize {
        self.qnet.out_dim
    }

    fn action_values(&self, state: &StateVector) -> Result<Vec<f32>> {
        let q = self.predict(&self.qnet, iter::once(state))?;
        Ok(q.into_iter().next().unwrap_or_default())
    }

    fn best_action(&self, state: &StateVector) -> Result<usize> {
        Ok(argmax(&self.action_values(state)?))
    }
}

impl<Q, R> Agent<R> for Dqn<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InDim + std::fmt::Debug + PartialEq + Clone,
    R: ReplayBufferBase,
{
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        let batch = buffer.batch(self.batch_size);
        let loss = match self.train_on_batch(&batch)? {
            None => return Ok(None),
            Some(loss) => loss,
        };
        self.n_opts += 1;

        Ok(Some(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("batch_size", RecordValue::Scalar(batch.len() as f32)),
            ("n_opts", RecordValue::Scalar(self.n_opts as f32)),
        ])))
    }

    fn sync_target(&mut self) -> Result<()> {
        track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), 1.0)
    }

    fn export_weights(&self) -> Result<Vec<u8>> {
        let weights = Weights {
            qnet: NamedTensors::copy_from(self.qnet.get_varmap())?,
            qnet_tgt: NamedTensors::copy_from(self.qnet_tgt.get_varmap())?,
        };
        Ok(bincode::serialize(&weights)?)
    }

    fn import_weights(&mut self, blob: &[u8]) -> Result<()> {
        let weights: Weights = bincode::deserialize(blob)
            .map_err(|e| SignalError::WeightFormat(e.to_string()))?;
        weights.qnet.check(self.qnet.get_varmap())?;
        weights.qnet_tgt.check(self.qnet_tgt.get_varmap())?;
        weights.qnet.copy_to(self.qnet.get_varmap())?;
        weights.qnet_tgt.copy_to(self.qnet_tgt.get_varmap())?;
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join("qnet.safetensors"))?;
        self.qnet_tgt.save(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join("qnet.safetensors"))?;
        self.qnet_tgt.load(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dqn::DqnModelConfig,
        mlp::{Mlp, MlpConfig},
        opt::OptimizerConfig,
    };
    use signal_core::replay_buffer::{ExperienceReplay, ExperienceReplayConfig};
    use tempdir::TempDir;

    type Agent_ = Dqn<Mlp>;

    fn config(in_dim: usize, seed: u64) -> DqnConfig<Mlp> {
        let model_config = DqnModelConfig::default()
            .q_config(MlpConfig::new(in_dim, vec![], 2))
            .opt_config(OptimizerConfig::Sgd { lr: 0.01 });
        DqnConfig::default().model_config(model_config).seed(seed)
    }

    fn transition(terminal: bool) -> Transition {
        Transition::new(
            vec![0.0, 1.0, 2.0].into(),
            1,
            0.5,
            vec![2.0, 2.0, 0.0].into(),
            terminal,
        )
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_target_starts_as_copy() -> Result<()> {
        let agent = Agent_::build(&config(3, 0))?;
        let s = StateVector::from(vec![1.0, -1.0, 0.5]);
        assert_close(&agent.action_values(&s)?, &agent.target_action_values(&s)?);
        assert!(agent.best_action(&s)? < 2);
        Ok(())
    }

    #[test]
    fn test_empty_batch_is_skipped() -> Result<()> {
        let mut agent = Agent_::build(&config(3, 0))?;
        let s = StateVector::from(vec![1.0, -1.0, 0.5]);
        let before = agent.action_values(&s)?;
        assert_eq!(agent.train_on_batch(&[])?, None);
        assert_eq!(agent.action_values(&s)?, before);

        let mut buffer = ExperienceReplay::build(&ExperienceReplayConfig::default());
        assert!(Agent::<ExperienceReplay>::opt_with_record(&mut agent, &mut buffer)?.is_none());
        assert_eq!(agent.n_opts(), 0);
        Ok(())
    }

    #[test]
    fn test_labels() -> Result<()> {
        let mut agent = Agent_::build(&config(3, 0))?;

        // Move the online network away from the target
        for _ in 0..5 {
            agent.train_on_batch(&[transition(false)])?;
        }
        let tr = transition(false);
        let q = agent.action_values(&tr.state)?;
        let q_next = agent.action_values(&tr.next_state)?;
        let q_next_tgt = agent.target_action_values(&tr.next_state)?;
        assert!(q_next
            .iter()
            .zip(q_next_tgt.iter())
            .any(|(a, b)| (a - b).abs() > 1e-6));

        let batch = vec![tr.clone(), transition(true)];
        let (xs, ys, rows) = agent.training_set(&batch)?;
        assert_eq!(rows, 3);
        assert_eq!(xs.len(), 9);
        assert_eq!(ys.len(), 6);

        let expected = 0.5 + 0.9 * q_next[argmax(&q_next_tgt)];
        assert_close(&ys[0..2], &[q[0], expected]);
        assert_close(&ys[2..4], &[q[0], expected]);

        // Terminal transitions add the next state labelled with the reward
        assert_eq!(&xs[6..9], tr.next_state.as_slice());
        assert_eq!(&ys[4..6], &[0.5, 0.5]);
        Ok(())
    }

    #[test]
    fn test_training_reduces_loss() -> Result<()> {
        let mut agent = Agent_::build(&config(3, 1).discount_factor(0.0))?;
        let batch = vec![transition(false)];
        let first = agent.train_on_batch(&batch)?.unwrap();
        let mut last = first;
        for _ in 0..50 {
            last = agent.train_on_batch(&batch)?.unwrap();
        }
        assert!(last < first);
        Ok(())
    }

    #[test]
    fn test_sync_target() -> Result<()> {
        let mut agent = Agent_::build(&config(3, 0))?;
        let s = StateVector::from(vec![0.0, 1.0, 2.0]);
        for _ in 0..5 {
            agent.train_on_batch(&[transition(false)])?;
        }
        assert_ne!(agent.action_values(&s)?, agent.target_action_values(&s)?);

        Agent::<ExperienceReplay>::sync_target(&mut agent)?;
        assert_eq!(agent.action_values(&s)?, agent.target_action_values(&s)?);
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> Result<()> {
        let agent = Agent_::build(&config(3, 0))?;
        let err = agent.best_action(&StateVector::zeros(4)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));
        Ok(())
    }

    #[test]
    fn test_weights_round_trip() -> Result<()> {
        let mut src = Agent_::build(&config(3, 0))?;
        for _ in 0..3 {
            src.train_on_batch(&[transition(false)])?;
        }
        let s = StateVector::from(vec![1.0, 2.0, 3.0]);

        let blob = Agent::<ExperienceReplay>::export_weights(&src)?;
        let mut dest = Agent_::build(&config(3, 9))?;
        Agent::<ExperienceReplay>::import_weights(&mut dest, &blob)?;
        assert_eq!(src.action_values(&s)?, dest.action_values(&s)?);
        assert_eq!(
            src.target_action_values(&s)?,
            dest.target_action_values(&s)?
        );

        let mut other = Agent_::build(&config(4, 0))?;
        let err = Agent::<ExperienceReplay>::import_weights(&mut other, &blob).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::WeightFormat(_))
        ));

        let dir = TempDir::new("dqn")?;
        Agent::<ExperienceReplay>::save_params(&src, dir.path())?;
        let mut loaded = Agent_::build(&config(3, 5))?;
        Agent::<ExperienceReplay>::load_params(&mut loaded, dir.path())?;
        assert_eq!(src.action_values(&s)?, loaded.action_values(&s)?);
        Ok(())
    }

    #[test]
    fn test_rejected_import_keeps_weights() -> Result<()> {
        let three = Agent_::build(&config(3, 1))?;
        let four = Agent_::build(&config(4, 2))?;
        let blob = bincode::serialize(&Weights {
            qnet: NamedTensors::copy_from(three.qnet.get_varmap())?,
            qnet_tgt: NamedTensors::copy_from(four.qnet_tgt.get_varmap())?,
        })?;

        let mut dest = Agent_::build(&config(3, 0))?;
        let s = StateVector::from(vec![1.0, 2.0, 3.0]);
        let before = dest.action_values(&s)?;
        let before_tgt = dest.target_action_values(&s)?;

        let err = Agent::<ExperienceReplay>::import_weights(&mut dest, &blob).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::WeightFormat(_))
        ));
        assert_eq!(dest.action_values(&s)?, before);
        assert_eq!(dest.target_action_values(&s)?, before_tgt);

        let err = Agent::<ExperienceReplay>::import_weights(&mut dest, &[0, 1, 2]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignalError>(),
            Some(SignalError::WeightFormat(_))
        ));
        Ok(())
    }
}
