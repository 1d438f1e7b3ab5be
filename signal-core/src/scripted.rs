//! A deterministic simulator used for tests and demos.
//!
//! Each light controls a four-way junction with one lane per approach (north, east,
//! south, west) and one induction loop per lane. Vehicles arrive on a fixed schedule,
//! queue while their lane is red and leave one per step while it is green. Phase 0
//! gives green to the north and south lanes, phase 2 to the east and west lanes, and
//! the odd phases are all-red transitions. Without intervention the lights follow a
//! static program.
use crate::{error::SignalError, Simulator};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

const DIRECTIONS: [&str; 4] = ["n", "e", "s", "w"];

/// Configuration of [`ScriptedSimulator`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ScriptedSimulatorConfig {
    /// Number of controlled lights.
    pub n_lights: usize,

    /// Durations of the phases of the static program.
    pub phase_durations: [usize; 4],

    /// Arrival period of each approach, in steps.
    pub arrival_periods: [usize; 4],

    /// Speed of moving vehicles.
    pub free_speed: f32,

    /// Emission of a stopped vehicle per step.
    pub idle_emission: f32,

    /// Emission of a moving vehicle per step.
    pub moving_emission: f32,

    /// If set, the connection is lost after this number of steps.
    pub fail_after: Option<usize>,
}

impl Default for ScriptedSimulatorConfig {
    fn default() -> Self {
        Self {
            n_lights: 1,
            phase_durations: [31, 6, 31, 6],
            arrival_periods: [3, 5, 4, 6],
            free_speed: 13.9,
            idle_emission: 1500.0,
            moving_emission: 2500.0,
            fail_after: None,
        }
    }
}

impl ScriptedSimulatorConfig {
    /// Sets the number of controlled lights.
    pub fn n_lights(mut self, v: usize) -> Self {
        self.n_lights = v;
        self
    }

    /// Sets the arrival periods of the approaches.
    pub fn arrival_periods(mut self, v: [usize; 4]) -> Self {
        self.arrival_periods = v;
        self
    }

    /// Loses the connection after the given number of steps.
    pub fn fail_after(mut self, v: usize) -> Self {
        self.fail_after = Some(v);
        self
    }
}

#[derive(Debug, Clone)]
struct Vehicle {
    speed: f32,
    waiting: f32,
}

#[derive(Debug, Clone)]
struct Junction {
    id: String,
    phase: usize,
    elapsed: usize,
    lanes: [VecDeque<String>; 4],
    arrived: [usize; 4],
}

/// A deterministic simulator implementing [`Simulator`].
pub struct ScriptedSimulator {
    config: ScriptedSimulatorConfig,
    time: usize,
    n_vehicles: usize,
    junctions: Vec<Junction>,
    vehicles: HashMap<String, Vehicle>,
    closed: bool,
}

impl ScriptedSimulator {
    /// Builds the simulator at time zero with empty lanes.
    pub fn build(config: &ScriptedSimulatorConfig) -> Self {
        let junctions = (0..config.n_lights)
            .map(|l| Junction {
                id: l.to_string(),
                phase: 0,
                elapsed: 0,
                lanes: Default::default(),
                arrived: [0; 4],
            })
            .collect();

        Self {
            config: config.clone(),
            time: 0,
            n_vehicles: 0,
            junctions,
            vehicles: HashMap::new(),
            closed: false,
        }
    }

    /// Returns the number of steps simulated so far.
    pub fn time(&self) -> usize {
        self.time
    }

    /// Returns the number of vehicles in the network.
    pub fn n_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    /// Returns `true` if the connection has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn junction(&self, light: &str) -> Result<&Junction> {
        self.junctions
            .iter()
            .find(|j| j.id == light)
            .ok_or_else(|| SignalError::UnknownLight(light.to_string()).into())
    }

    fn junction_mut(&mut self, light: &str) -> Result<&mut Junction> {
        self.junctions
            .iter_mut()
            .find(|j| j.id == light)
            .ok_or_else(|| SignalError::UnknownLight(light.to_string()).into())
    }

    /// Looks up a lane or detector identifier of the form `<light>_<direction>`.
    fn lane(&self, id: &str) -> Result<&VecDeque<String>> {
        let (light, dir) = id
            .split_once('_')
            .ok_or_else(|| anyhow!("Malformed lane identifier: {}", id))?;
        let dir = dir.trim_end_matches("_loop");
        let k = DIRECTIONS
            .iter()
            .position(|d| *d == dir)
            .ok_or_else(|| anyhow!("Unknown direction in lane identifier: {}", id))?;
        Ok(&self.junction(light)?.lanes[k])
    }

    fn vehicle(&self, id: &str) -> Result<&Vehicle> {
        self.vehicles
            .get(id)
            .ok_or_else(|| anyhow!("Unknown vehicle: {}", id))
    }

    fn is_green(phase: usize, k: usize) -> bool {
        match phase {
            0 => k % 2 == 0,
            2 => k % 2 == 1,
            _ => false,
        }
    }
}

impl Simulator for ScriptedSimulator {
    fn controlled_lights(&mut self) -> Result<Vec<String>> {
        Ok(self.junctions.iter().map(|j| j.id.clone()).collect())
    }

    fn detectors(&mut self) -> Result<Vec<String>> {
        Ok(self
            .junctions
            .iter()
            .flat_map(|j| DIRECTIONS.iter().map(move |d| format!("{}_{}_loop", j.id, d)))
            .collect())
    }

    fn lanes(&mut self) -> Result<Vec<String>> {
        Ok(self
            .junctions
            .iter()
            .flat_map(|j| DIRECTIONS.iter().map(move |d| format!("{}_{}", j.id, d)))
            .collect())
    }

    fn phase(&mut self, light: &str) -> Result<usize> {
        Ok(self.junction(light)?.phase)
    }

    fn set_phase(&mut self, light: &str, phase: usize) -> Result<()> {
        if phase >= 4 {
            return Err(anyhow!("Phase {} is out of range for light {}", phase, light));
        }
        let junction = self.junction_mut(light)?;
        junction.phase = phase;
        junction.elapsed = 0;
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        if self.closed || self.config.fail_after.map_or(false, |n| self.time >= n) {
            return Err(SignalError::SimulatorUnavailable(format!(
                "connection lost at step {}",
                self.time
            ))
            .into());
        }
        self.time += 1;
        let time = self.time;
        let config = &self.config;
        let vehicles = &mut self.vehicles;
        let n_vehicles = &mut self.n_vehicles;

        for (l, junction) in self.junctions.iter_mut().enumerate() {
            for k in 0..4 {
                let lane = &mut junction.lanes[k];
                if Self::is_green(junction.phase, k) {
                    if let Some(id) = lane.pop_front() {
                        vehicles.remove(&id);
                    }
                    for id in lane.iter() {
                        if let Some(v) = vehicles.get_mut(id) {
                            v.speed = config.free_speed;
                            v.waiting = 0.0;
                        }
                    }
                } else {
                    for id in lane.iter() {
                        if let Some(v) = vehicles.get_mut(id) {
                            v.speed = 0.0;
                            v.waiting += 1.0;
                        }
                    }
                }

                let period = config.arrival_periods[k].max(1);
                let offset = 7 * l + k;
                junction.arrived[k] = 0;
                if (time + offset) % period == 0 {
                    let id = format!("veh{}", *n_vehicles);
                    *n_vehicles += 1;
                    vehicles.insert(
                        id.clone(),
                        Vehicle {
                            speed: config.free_speed,
                            waiting: 0.0,
                        },
                    );
                    lane.push_back(id);
                    junction.arrived[k] = 1;
                }
            }

            junction.elapsed += 1;
            if junction.elapsed >= config.phase_durations[junction.phase] {
                junction.phase = (junction.phase + 1) % 4;
                junction.elapsed = 0;
            }
        }

        Ok(())
    }

    fn vehicles_on_lane(&mut self, lane: &str) -> Result<Vec<String>> {
        Ok(self.lane(lane)?.iter().cloned().collect())
    }

    fn vehicle_speed(&mut self, vehicle: &str) -> Result<f32> {
        Ok(self.vehicle(vehicle)?.speed)
    }

    fn vehicle_waiting_time(&mut self, vehicle: &str) -> Result<f32> {
        Ok(self.vehicle(vehicle)?.waiting)
    }

    fn lane_waiting_time(&mut self, lane: &str) -> Result<f32> {
        let lane = self.lane(lane)?;
        let mut total = 0f32;
        for id in lane.iter() {
            total += self.vehicle(id)?.waiting;
        }
        Ok(total)
    }

    fn lane_emission(&mut self, lane: &str) -> Result<f32> {
        let lane = self.lane(lane)?;
        let mut total = 0f32;
        for id in lane.iter() {
            total += match self.vehicle(id)?.speed > 0.0 {
                true => self.config.moving_emission,
                false => self.config.idle_emission,
            };
        }
        Ok(total)
    }

    fn detector_vehicle_count(&mut self, detector: &str) -> Result<usize> {
        let (light, dir) = detector
            .split_once('_')
            .ok_or_else(|| anyhow!("Malformed detector identifier: {}", detector))?;
        let dir = dir.trim_end_matches("_loop");
        let k = DIRECTIONS
            .iter()
            .position(|d| *d == dir)
            .ok_or_else(|| anyhow!("Unknown detector: {}", detector))?;
        Ok(self.junction(light)?.arrived[k])
    }

    fn remove_all_vehicles(&mut self) -> Result<()> {
        self.vehicles.clear();
        self.junctions.iter_mut().for_each(|j| {
            j.lanes.iter_mut().for_each(VecDeque::clear);
            j.arrived = [0; 4];
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
