//! Bounded FIFO replay buffer.
use super::ExperienceReplayConfig;
use crate::{ReplayBufferBase, Transition};
use log::warn;
use rand::{rngs::StdRng, seq::index, SeedableRng};

/// Bounded FIFO buffer of transitions with uniform sampling without replacement.
///
/// Transitions are kept in a ring of `capacity` slots. When the buffer is full,
/// pushing a transition overwrites the oldest one.
pub struct ExperienceReplay {
    capacity: usize,

    /// Slot written by the next push.
    i: usize,
    size: usize,
    data: Vec<Transition>,
    rng: StdRng,
}

impl ExperienceReplay {
    /// Returns the maximum number of transitions kept in the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot of the oldest transition.
    fn head(&self) -> usize {
        if self.size < self.capacity {
            0
        } else {
            self.i
        }
    }

    /// Returns an iterator over the transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> + '_ {
        let head = self.head();
        (0..self.size).map(move |k| &self.data[(head + k) % self.capacity])
    }
}

impl ReplayBufferBase for ExperienceReplay {
    type Config = ExperienceReplayConfig;

    fn build(config: &Self::Config) -> Self {
        let capacity = if config.capacity == 0 {
            warn!("Replay buffer capacity 0 is not allowed, using 1");
            1
        } else {
            config.capacity
        };

        Self {
            capacity,
            i: 0,
            size: 0,
            data: Vec::with_capacity(capacity.min(1024)),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Offsets the sampling seed by `index`.
    fn config_for(config: &Self::Config, index: usize) -> Self::Config {
        config.clone().seed(config.seed.wrapping_add(index as u64))
    }

    fn push(&mut self, tr: Transition) {
        if self.data.len() < self.capacity {
            self.data.push(tr);
        } else {
            self.data[self.i] = tr;
        }

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
    }

    fn len(&self) -> usize {
        self.size
    }

    fn newest(&self) -> Option<&Transition> {
        match self.size {
            0 => None,
            _ => Some(&self.data[(self.i + self.capacity - 1) % self.capacity]),
        }
    }

    fn batch(&mut self, size: usize) -> Vec<Transition> {
        let amount = size.min(self.size);
        if amount == 0 {
            return vec![];
        }

        index::sample(&mut self.rng, self.size, amount)
            .into_iter()
            .map(|ix| self.data[ix].clone())
            .collect()
    }

    fn clear(&mut self) {
        self.data.clear();
        self.i = 0;
        self.size = 0;
    }
}
