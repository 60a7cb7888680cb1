//! Experiment lifecycle state and per-loop counters.
//!
//! # State Machine
//!
//! ```text
//! Init ──> FirstCycle ──> { WithinPlate | BetweenPlate } ──> Finalize ──> Done
//!                                ▲              │
//!                                └──────────────┘
//!                         (one phase per outer loop,
//!                          until total_loops is reached)
//! ```
//!
//! The driver owns a [`LoopState`] and mutates it only through the named
//! methods here, which uphold the counter invariants: `loop_num` grows by
//! exactly one per outer iteration, `plate_num` increments exactly once per
//! between-plate transition, and the per-plate counters reset to 1 at that
//! same transition.

use crate::experiment::columns::CycleLength;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of outer-loop iteration the driver is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Iteration 0: plate prep and first inoculation
    FirstCycle,
    /// Transfer between columns of the current plate
    WithinPlate,
    /// Current plate exhausted; fetch a fresh one from the stack
    BetweenPlate,
}

impl Phase {
    /// Classify an iteration from the loop counter.
    ///
    /// Iteration 0 is always `FirstCycle`, regardless of the modulus; after
    /// that, a zero modulus marks the between-plate boundary.
    pub fn classify(loop_num: u64, cycle_length: CycleLength) -> Self {
        if loop_num == 0 {
            Phase::FirstCycle
        } else if loop_num % u64::from(cycle_length.get()) == 0 {
            Phase::BetweenPlate
        } else {
            Phase::WithinPlate
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::FirstCycle => write!(f, "FirstCycle"),
            Phase::WithinPlate => write!(f, "WithinPlate"),
            Phase::BetweenPlate => write!(f, "BetweenPlate"),
        }
    }
}

/// Lifecycle state of the experiment driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentState {
    /// Constructed, nothing dispatched yet
    Init,
    /// Executing iteration 0
    FirstCycle,
    /// Executing a within-plate iteration
    WithinPlate,
    /// Executing a between-plate iteration
    BetweenPlate,
    /// All loops done; final transfer in progress
    Finalize,
    /// Run complete
    Done,
}

impl ExperimentState {
    /// State corresponding to an outer-loop phase.
    pub fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::FirstCycle => ExperimentState::FirstCycle,
            Phase::WithinPlate => ExperimentState::WithinPlate,
            Phase::BetweenPlate => ExperimentState::BetweenPlate,
        }
    }

    /// Whether the machine has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentState::Done)
    }

    /// Whether a new run may start from this state.
    pub fn can_begin(&self) -> bool {
        matches!(self, ExperimentState::Init)
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentState::Init => write!(f, "Init"),
            ExperimentState::FirstCycle => write!(f, "FirstCycle"),
            ExperimentState::WithinPlate => write!(f, "WithinPlate"),
            ExperimentState::BetweenPlate => write!(f, "BetweenPlate"),
            ExperimentState::Finalize => write!(f, "Finalize"),
            ExperimentState::Done => write!(f, "Done"),
        }
    }
}

/// Mutable per-iteration counters.
///
/// `plate_num` starts at 0 (the hand-loaded starting plate);
/// `transfer_in_plate_number` and `reading_number_in_plate` are 1-based and
/// name the transfer/reading *about to happen*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    /// Outer loop counter, starts at 0, +1 per iteration
    pub loop_num: u64,
    /// Plate currently in play
    pub plate_num: u32,
    /// 1-based transfer counter within the current plate
    pub transfer_in_plate_number: u32,
    /// 1-based reading counter within the current plate
    pub reading_number_in_plate: u32,
    /// Phase of the iteration being executed
    pub phase: Phase,
}

impl LoopState {
    /// Counters for a freshly registered experiment.
    pub fn new() -> Self {
        Self {
            loop_num: 0,
            plate_num: 0,
            transfer_in_plate_number: 1,
            reading_number_in_plate: 1,
            phase: Phase::FirstCycle,
        }
    }

    /// Enter an outer-loop iteration in the given phase.
    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Cross a plate boundary: next plate, per-plate counters back to 1.
    pub fn begin_new_plate(&mut self) {
        self.plate_num += 1;
        self.transfer_in_plate_number = 1;
        self.reading_number_in_plate = 1;
    }

    /// Account for a completed within-plate transfer.
    pub fn record_transfer(&mut self) {
        self.transfer_in_plate_number += 1;
    }

    /// Account for a completed reading.
    pub fn record_reading(&mut self) {
        self.reading_number_in_plate += 1;
    }

    /// Finish the outer iteration.
    pub fn advance_loop(&mut self) {
        self.loop_num += 1;
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_zero_is_always_first_cycle() {
        assert_eq!(Phase::classify(0, CycleLength::Four), Phase::FirstCycle);
        assert_eq!(Phase::classify(0, CycleLength::Three), Phase::FirstCycle);
    }

    #[test]
    fn modulus_zero_marks_plate_boundary_after_start() {
        assert_eq!(Phase::classify(4, CycleLength::Four), Phase::BetweenPlate);
        assert_eq!(Phase::classify(8, CycleLength::Four), Phase::BetweenPlate);
        assert_eq!(Phase::classify(3, CycleLength::Three), Phase::BetweenPlate);
    }

    #[test]
    fn other_iterations_are_within_plate() {
        for loop_num in [1u64, 2, 3, 5, 6, 7] {
            assert_eq!(
                Phase::classify(loop_num, CycleLength::Four),
                Phase::WithinPlate
            );
        }
    }

    #[test]
    fn plate_boundary_resets_per_plate_counters() {
        let mut state = LoopState::new();
        state.record_reading();
        state.record_reading();
        state.record_transfer();
        assert_eq!(state.reading_number_in_plate, 3);

        state.begin_new_plate();
        assert_eq!(state.plate_num, 1);
        assert_eq!(state.transfer_in_plate_number, 1);
        assert_eq!(state.reading_number_in_plate, 1);
    }

    #[test]
    fn loop_num_increments_by_one() {
        let mut state = LoopState::new();
        for expected in 1u64..=5 {
            state.advance_loop();
            assert_eq!(state.loop_num, expected);
        }
    }

    #[test]
    fn state_display_and_transitions() {
        assert!(ExperimentState::Init.can_begin());
        assert!(!ExperimentState::Done.can_begin());
        assert!(ExperimentState::Done.is_terminal());
        assert!(!ExperimentState::Finalize.is_terminal());
        assert_eq!(
            ExperimentState::from_phase(Phase::BetweenPlate),
            ExperimentState::BetweenPlate
        );
        assert_eq!(ExperimentState::WithinPlate.to_string(), "WithinPlate");
    }
}
