//! Epsilon-greedy exploration.
use crate::{Policy, StateVector};
use anyhow::Result;
use log::warn;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// Configuration of [`EpsilonGreedy`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedyConfig {
    /// Epsilon at the start of a training run.
    pub eps_start: f32,

    /// Lower bound of epsilon.
    pub eps_final: f32,

    /// Multiplicative decay applied once per environment step.
    pub decay: f32,
}

impl Default for EpsilonGreedyConfig {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_final: 0.01,
            decay: 0.9999,
        }
    }
}

impl EpsilonGreedyConfig {
    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f32) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the lower bound of epsilon.
    pub fn eps_final(mut self, v: f32) -> Self {
        self.eps_final = v;
        self
    }

    /// Set the decay factor.
    pub fn decay(mut self, v: f32) -> Self {
        self.decay = v;
        self
    }
}

/// Epsilon-greedy action selection over the legal actions of a light.
///
/// Epsilon never increases: [`EpsilonGreedy::decay`] multiplies it by the decay factor
/// and clamps it at `eps_final`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    eps: f32,
    eps_final: f32,
    decay: f32,
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn build(config: &EpsilonGreedyConfig) -> Self {
        Self {
            eps: config.eps_start,
            eps_final: config.eps_final,
            decay: config.decay,
        }
    }

    /// Returns the current epsilon.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Applies one step of decay.
    pub fn decay(&mut self) {
        if self.eps > self.eps_final {
            self.eps = (self.eps * self.decay).max(self.eps_final);
        }
    }

    /// Takes an action among `legal`.
    ///
    /// With probability epsilon a legal action is drawn uniformly, otherwise the
    /// greedy action of `policy` is returned. Returns `None` when `legal` is empty;
    /// the caller then holds the current phase.
    pub fn action<P, R>(
        &self,
        policy: &P,
        state: &StateVector,
        legal: &[usize],
        rng: &mut R,
    ) -> Result<Option<usize>>
    where
        P: Policy + ?Sized,
        R: Rng,
    {
        if legal.is_empty() {
            warn!("Decision requested without legal actions, holding the current phase");
            return Ok(None);
        }

        if rng.gen::<f32>() < self.eps {
            Ok(legal.choose(rng).copied())
        } else {
            Ok(Some(policy.best_action(state)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    struct Constant(usize);

    impl Policy for Constant {
        fn in_dim(&self) -> usize {
            1
        }

        fn n_actions(&self) -> usize {
            2
        }

        fn action_values(&self, _state: &StateVector) -> Result<Vec<f32>> {
            Ok(vec![0.0, 0.0])
        }

        fn best_action(&self, _state: &StateVector) -> Result<usize> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_decay_matches_closed_form() {
        let mut explorer = EpsilonGreedy::build(&EpsilonGreedyConfig::default());
        let mut prev = explorer.eps();
        for n in 1..=50_000 {
            explorer.decay();
            assert!(explorer.eps() <= prev);
            assert!(explorer.eps() >= 0.01);
            prev = explorer.eps();

            if n % 10_000 == 0 {
                let expected = 0.9999f64.powi(n).max(0.01) as f32;
                assert!((explorer.eps() - expected).abs() < 5e-3 * expected);
            }
        }
        assert_eq!(explorer.eps(), 0.01);
    }

    #[test]
    fn test_greedy_when_eps_is_zero() -> Result<()> {
        let config = EpsilonGreedyConfig::default().eps_start(0.0).eps_final(0.0);
        let explorer = EpsilonGreedy::build(&config);
        let mut rng = StdRng::seed_from_u64(0);
        let state = StateVector::zeros(1);
        for _ in 0..100 {
            assert_eq!(explorer.action(&Constant(1), &state, &[0, 1], &mut rng)?, Some(1));
        }
        Ok(())
    }

    #[test]
    fn test_random_action_is_legal() -> Result<()> {
        let explorer = EpsilonGreedy::build(&EpsilonGreedyConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let state = StateVector::zeros(1);
        let mut seen = [false; 2];
        for _ in 0..100 {
            let a = explorer.action(&Constant(5), &state, &[0, 1], &mut rng)?;
            let a = a.expect("legal actions are given");
            seen[a] = true;
        }
        assert!(seen[0] && seen[1]);
        Ok(())
    }

    #[test]
    fn test_no_legal_action_holds() -> Result<()> {
        let explorer = EpsilonGreedy::build(&EpsilonGreedyConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let a = explorer.action(&Constant(0), &StateVector::zeros(1), &[], &mut rng)?;
        assert_eq!(a, None);
        Ok(())
    }
}
