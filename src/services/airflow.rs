//! Fan duty preprocessing
//!
//! Normalizes the intake-fan vector to four entries and carries the main
//! fan duty through unchanged. Deliberately no 0..=100 clamping here: the
//! fan MCU firmware owns that contract, and the bridge rejects out-of-range
//! duties before transmit.

use super::normalize4;

/// Last applied fan duties
#[derive(Debug, Clone, Copy, Default)]
pub struct AirflowState {
    pub small: [i32; 4],
    pub large: i32,
}

/// Fan duty preprocessing service
#[derive(Default)]
pub struct AirflowService {
    state: AirflowState,
}

impl AirflowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an inbound fan request; returns `(intake, main)`
    pub fn preprocess(&mut self, small: &[i32], large: i32) -> ([i32; 4], i32) {
        let small = normalize4(small);
        self.state = AirflowState { small, large };
        (small, large)
    }

    /// Last applied duties
    pub fn state(&self) -> AirflowState {
        self.state
    }

    /// Coarse airflow label for the status snapshot, from the main fan duty
    pub fn airflow_speed(&self) -> &'static str {
        match self.state.large {
            i32::MIN..=0 => "off",
            1..=33 => "low",
            34..=66 => "medium",
            _ => "high",
        }
    }
}
