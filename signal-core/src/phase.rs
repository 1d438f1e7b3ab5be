//! Phase control of four-phase traffic lights.
//!
//! Every controlled light runs the program
//!
//! | phase | meaning                        |
//! |-------|--------------------------------|
//! | 0     | default green                  |
//! | 1     | transition to alternate green  |
//! | 2     | alternate green                |
//! | 3     | transition to default green    |
//!
//! Action 0 asks for the default green, action 1 for the alternate green.
use crate::{error::SignalError, Simulator};
use anyhow::Result;
use log::warn;

/// Action asking for the default green.
pub const DEFAULT_GREEN: usize = 0;

/// Action asking for the alternate green.
pub const ALTERNATE_GREEN: usize = 1;

/// Number of actions of a light.
pub const N_ACTIONS: usize = 2;

const PHASE_DEFAULT: usize = 0;
const PHASE_TO_ALTERNATE: usize = 1;
const PHASE_ALTERNATE: usize = 2;
const PHASE_TO_DEFAULT: usize = 3;

/// Returns the actions allowed in the given phase.
///
/// Odd phases are transitions; no decision is made until the transition is over.
pub fn legal_actions(phase: usize) -> Vec<usize> {
    if phase % 2 == 0 {
        vec![DEFAULT_GREEN, ALTERNATE_GREEN]
    } else {
        vec![]
    }
}

/// Returns the phase the light is reset to at the start of an episode.
pub fn initial_phase() -> usize {
    PHASE_DEFAULT
}

/// Applies an action to a light.
///
/// `None` holds the current program and does not talk to the simulator. Asking for the
/// green that is already shown re-asserts it; asking for the other one starts the
/// transition. Returns `true` if a transition was started.
///
/// An action requested while the light is in a transition is not applied; the light
/// holds its program and a warning is logged.
pub fn apply_action<S: Simulator + ?Sized>(
    sim: &mut S,
    light: &str,
    action: Option<usize>,
) -> Result<bool> {
    let action = match action {
        None => return Ok(false),
        Some(a) => a,
    };

    let phase = sim.phase(light)?;
    if legal_actions(phase).is_empty() {
        let e = SignalError::IllegalAction {
            light: light.to_string(),
            phase,
        };
        warn!("{}, holding the current phase", e);
        return Ok(false);
    }

    let (target, switched) = match (action, phase) {
        (DEFAULT_GREEN, PHASE_DEFAULT) => (PHASE_DEFAULT, false),
        (DEFAULT_GREEN, _) => (PHASE_TO_DEFAULT, true),
        (_, PHASE_ALTERNATE) => (PHASE_ALTERNATE, false),
        (_, _) => (PHASE_TO_ALTERNATE, true),
    };
    sim.set_phase(light, target)?;

    Ok(switched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedSimulator, ScriptedSimulatorConfig};

    #[test]
    fn test_legal_actions() {
        assert_eq!(legal_actions(0), vec![0, 1]);
        assert_eq!(legal_actions(2), vec![0, 1]);
        assert!(legal_actions(1).is_empty());
        assert!(legal_actions(3).is_empty());
    }

    #[test]
    fn test_apply_action() -> Result<()> {
        let mut sim = ScriptedSimulator::build(&ScriptedSimulatorConfig::default());
        let light = sim.controlled_lights()?[0].clone();

        assert!(!apply_action(&mut sim, &light, None)?);
        assert!(!apply_action(&mut sim, &light, Some(DEFAULT_GREEN))?);
        assert_eq!(sim.phase(&light)?, PHASE_DEFAULT);

        assert!(apply_action(&mut sim, &light, Some(ALTERNATE_GREEN))?);
        assert_eq!(sim.phase(&light)?, PHASE_TO_ALTERNATE);

        sim.set_phase(&light, PHASE_ALTERNATE)?;
        assert!(!apply_action(&mut sim, &light, Some(ALTERNATE_GREEN))?);
        assert!(apply_action(&mut sim, &light, Some(DEFAULT_GREEN))?);
        assert_eq!(sim.phase(&light)?, PHASE_TO_DEFAULT);

        // In a transition the request is ignored
        assert!(!apply_action(&mut sim, &light, Some(ALTERNATE_GREEN))?);
        assert_eq!(sim.phase(&light)?, PHASE_TO_DEFAULT);
        Ok(())
    }
}
