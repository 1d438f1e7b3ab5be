//! Reward and traffic diagnostics.
use crate::Simulator;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// How waiting is measured for the episode diagnostics.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WaitingMetric {
    /// Sum of the waiting times of all vehicles.
    TotalWaitingTime,

    /// Number of vehicles with positive waiting time.
    QueuedVehicles,

    /// Sum of the waiting times reported per lane.
    LaneWaitingTime,
}

/// Configuration of the reward.
///
/// The reward of a step is
/// `sum_lanes(sum_speed / (max(1, n_vehicles) * speed_scale)) - emission_weight * sum_lanes(emission)`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RewardConfig {
    /// Divisor of the mean lane speed.
    pub speed_scale: f32,

    /// Weight of the emission penalty. Zero gives a speed-only reward.
    pub emission_weight: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            speed_scale: 10.0,
            emission_weight: 1e-4,
        }
    }
}

impl RewardConfig {
    /// Sets the divisor of the mean lane speed.
    pub fn speed_scale(mut self, v: f32) -> Self {
        self.speed_scale = v;
        self
    }

    /// Sets the weight of the emission penalty.
    pub fn emission_weight(mut self, v: f32) -> Self {
        self.emission_weight = v;
        self
    }
}

/// Readings of one environment step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    /// Reward of the step.
    pub reward: f32,

    /// Waiting metric of the step.
    pub waiting: f32,

    /// Emission proxy summed over lanes.
    pub emission: f32,
}

/// Reads the lanes of the simulator and computes the reward and diagnostics.
pub fn measure<S: Simulator + ?Sized>(
    sim: &mut S,
    lanes: &[String],
    config: &RewardConfig,
    metric: WaitingMetric,
) -> Result<Measurement> {
    let mut m = Measurement::default();

    for lane in lanes.iter() {
        let vehicles = sim.vehicles_on_lane(lane)?;
        let mut speed = 0f32;
        for v in vehicles.iter() {
            let waiting = sim.vehicle_waiting_time(v)?;
            match metric {
                WaitingMetric::TotalWaitingTime => m.waiting += waiting,
                WaitingMetric::QueuedVehicles if waiting > 0.0 => m.waiting += 1.0,
                _ => {}
            }
            speed += sim.vehicle_speed(v)?;
        }
        m.reward += speed / (vehicles.len().max(1) as f32 * config.speed_scale);

        if metric == WaitingMetric::LaneWaitingTime {
            m.waiting += sim.lane_waiting_time(lane)?;
        }
        m.emission += sim.lane_emission(lane)?;
    }
    m.reward -= config.emission_weight * m.emission;

    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedSimulator, ScriptedSimulatorConfig};

    #[test]
    fn test_empty_network() -> Result<()> {
        let mut sim = ScriptedSimulator::build(&ScriptedSimulatorConfig::default());
        let lanes = sim.lanes()?;
        let m = measure(
            &mut sim,
            &lanes,
            &RewardConfig::default(),
            WaitingMetric::TotalWaitingTime,
        )?;
        assert_eq!(m, Measurement::default());
        Ok(())
    }

    #[test]
    fn test_metrics_agree_on_queue() -> Result<()> {
        let mut sim = ScriptedSimulator::build(&ScriptedSimulatorConfig::default());
        for _ in 0..40 {
            sim.advance()?;
        }
        let lanes = sim.lanes()?;
        let config = RewardConfig::default().emission_weight(0.0);

        let total = measure(&mut sim, &lanes, &config, WaitingMetric::TotalWaitingTime)?;
        let queued = measure(&mut sim, &lanes, &config, WaitingMetric::QueuedVehicles)?;
        let per_lane = measure(&mut sim, &lanes, &config, WaitingMetric::LaneWaitingTime)?;

        assert!(queued.waiting > 0.0);
        assert!(total.waiting >= queued.waiting);
        assert_eq!(total.waiting, per_lane.waiting);
        assert_eq!(total.reward, queued.reward);
        assert!(total.reward >= 0.0);
        assert!(total.emission > 0.0);
        Ok(())
    }
}
