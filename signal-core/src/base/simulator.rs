//! Simulator.
use anyhow::Result;

/// Step-synchronous connection to an external traffic simulator.
///
/// Every method is a blocking round trip. Requests are strictly ordered and never
/// overlap, so implementations need no internal synchronization. Connection failures
/// should be reported as
/// [`SignalError::SimulatorUnavailable`](crate::error::SignalError::SimulatorUnavailable);
/// the trainer aborts the run on any error returned here.
///
/// Lights are indexed by their position in [`Simulator::controlled_lights`], which must
/// not change during a run.
pub trait Simulator {
    /// Returns the identifiers of the traffic lights controlled by the agent.
    fn controlled_lights(&mut self) -> Result<Vec<String>>;

    /// Returns the identifiers of the induction-loop detectors.
    fn detectors(&mut self) -> Result<Vec<String>>;

    /// Returns the identifiers of the lanes.
    fn lanes(&mut self) -> Result<Vec<String>>;

    /// Returns the current phase index of a light.
    fn phase(&mut self, light: &str) -> Result<usize>;

    /// Switches a light to the given phase.
    ///
    /// The change takes effect with the next call of [`Simulator::advance`].
    fn set_phase(&mut self, light: &str, phase: usize) -> Result<()>;

    /// Commits pending phase changes and advances simulated time by one step.
    fn advance(&mut self) -> Result<()>;

    /// Returns the vehicles on a lane in the last step.
    fn vehicles_on_lane(&mut self, lane: &str) -> Result<Vec<String>>;

    /// Returns the speed of a vehicle.
    fn vehicle_speed(&mut self, vehicle: &str) -> Result<f32>;

    /// Returns the time a vehicle has been waiting.
    fn vehicle_waiting_time(&mut self, vehicle: &str) -> Result<f32>;

    /// Returns the accumulated waiting time on a lane.
    fn lane_waiting_time(&mut self, lane: &str) -> Result<f32>;

    /// Returns the emission proxy (CO2) of a lane in the last step.
    fn lane_emission(&mut self, lane: &str) -> Result<f32>;

    /// Returns the number of vehicles that passed a detector in the last step.
    fn detector_vehicle_count(&mut self, detector: &str) -> Result<usize>;

    /// Removes every vehicle from the simulation.
    fn remove_all_vehicles(&mut self) -> Result<()>;

    /// Releases the connection to the simulator.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
