//! Assembly of [`StateVector`]s from simulator readings.
use crate::{Simulator, StateVector};
use anyhow::Result;

/// Fixed-capacity ring buffer of the most recent values with a running total.
///
/// The buffer starts filled with zeros; every push evicts the oldest value.
#[derive(Clone, Debug)]
pub struct RingBuffer {
    data: Vec<f32>,
    i: usize,
    sum: f32,
}

impl RingBuffer {
    /// Creates a zero-filled buffer.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0f32; capacity],
            i: 0,
            sum: 0.0,
        }
    }

    /// Returns the number of values kept in the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Pushes a value, evicting the oldest one.
    pub fn push(&mut self, v: f32) {
        if self.data.is_empty() {
            return;
        }
        self.sum += v - self.data[self.i];
        self.data[self.i] = v;
        self.i = (self.i + 1) % self.data.len();
    }

    /// Returns the sum of the values in the buffer.
    pub fn sum(&self) -> f32 {
        self.sum
    }

    /// Returns an iterator over the values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let n = self.data.len();
        (0..n).map(move |k| self.data[(self.i + k) % n])
    }

    /// Fills the buffer with zeros.
    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
        self.i = 0;
        self.sum = 0.0;
    }
}

/// Builds the state vector observed after each environment step.
///
/// The layout is `[detector totals] ++ [phase per light] ++ [phase history per light]`,
/// where detector totals are present only if enabled and each history lists the
/// phases of the last `history_len` steps, oldest first.
pub struct ObservationBuilder {
    history: Vec<RingBuffer>,
    detectors: Vec<RingBuffer>,
    use_detectors: bool,
}

impl ObservationBuilder {
    /// Creates a builder for the given numbers of lights and detectors.
    pub fn new(
        n_lights: usize,
        n_detectors: usize,
        history_len: usize,
        detector_window: usize,
        use_detectors: bool,
    ) -> Self {
        Self {
            history: vec![RingBuffer::new(history_len); n_lights],
            detectors: vec![RingBuffer::new(detector_window); n_detectors],
            use_detectors,
        }
    }

    /// Returns the dimension of the state vectors produced by the builder.
    pub fn state_dim(&self) -> usize {
        let n_lights = self.history.len();
        let history_len = self.history.first().map_or(0, |h| h.capacity());
        let n_detectors = match self.use_detectors {
            true => self.detectors.len(),
            false => 0,
        };
        n_detectors + n_lights + history_len * n_lights
    }

    /// Zeroes the phase histories and detector windows.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(RingBuffer::reset);
        self.detectors.iter_mut().for_each(RingBuffer::reset);
    }

    /// Reads the simulator after a step and returns the new state vector.
    pub fn observe<S: Simulator + ?Sized>(
        &mut self,
        sim: &mut S,
        lights: &[String],
        detectors: &[String],
    ) -> Result<StateVector> {
        let mut phases = Vec::with_capacity(lights.len());
        for (light, history) in lights.iter().zip(self.history.iter_mut()) {
            let phase = sim.phase(light)? as f32;
            history.push(phase);
            phases.push(phase);
        }

        for (detector, window) in detectors.iter().zip(self.detectors.iter_mut()) {
            window.push(sim.detector_vehicle_count(detector)? as f32);
        }

        let mut state = Vec::with_capacity(self.state_dim());
        if self.use_detectors {
            state.extend(self.detectors.iter().map(RingBuffer::sum));
        }
        state.extend(phases);
        for history in self.history.iter() {
            state.extend(history.iter());
        }

        Ok(state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedSimulator, ScriptedSimulatorConfig};

    #[test]
    fn test_ring_buffer() {
        let mut buf = RingBuffer::new(3);
        for v in 1..=5 {
            buf.push(v as f32);
        }
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![3., 4., 5.]);
        assert_eq!(buf.sum(), 12.);

        buf.reset();
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![0., 0., 0.]);
        assert_eq!(buf.sum(), 0.);
    }

    #[test]
    fn test_empty_ring_buffer() {
        let mut buf = RingBuffer::new(0);
        buf.push(1.0);
        assert_eq!(buf.iter().count(), 0);
        assert_eq!(buf.sum(), 0.);
    }

    #[test]
    fn test_state_dim() {
        assert_eq!(ObservationBuilder::new(2, 4, 5, 20, false).state_dim(), 12);
        assert_eq!(ObservationBuilder::new(2, 4, 5, 20, true).state_dim(), 16);
        assert_eq!(ObservationBuilder::new(1, 0, 10, 20, true).state_dim(), 11);
    }

    #[test]
    fn test_observe_layout() -> Result<()> {
        let mut sim = ScriptedSimulator::build(&ScriptedSimulatorConfig::default());
        let lights = sim.controlled_lights()?;
        let detectors = sim.detectors()?;
        let mut with_detectors = ObservationBuilder::new(1, 4, 3, 2, true);
        let mut without_detectors = ObservationBuilder::new(1, 4, 3, 2, false);

        let mut state = vec![];
        let mut state_ = vec![];
        for _ in 0..33 {
            sim.advance()?;
            state = with_detectors.observe(&mut sim, &lights, &detectors)?.as_slice().to_vec();
            state_ = without_detectors.observe(&mut sim, &lights, &detectors)?.as_slice().to_vec();
        }

        // Arrivals of the last two steps, then the phase, then the last three phases
        assert_eq!(state, vec![1., 0., 0., 1., 1., 1., 1., 1.]);
        assert_eq!(state_, vec![1., 1., 1., 1.]);
        assert_eq!(state.len(), with_detectors.state_dim());

        with_detectors.reset();
        let state = with_detectors.observe(&mut sim, &lights, &detectors)?.as_slice().to_vec();
        assert_eq!(&state[5..], &[0., 0., 1.]);
        Ok(())
    }
}
