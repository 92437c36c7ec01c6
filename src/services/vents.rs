//! Vent angle preprocessing
//!
//! Clamps the internal/external vent angle vectors to their per-slot
//! ranges and keeps the last applied values for the status snapshot. The
//! internal bank's 60 − θ inversion is applied by the servo façade, never
//! here.

use super::normalize4;
use crate::servo::{EXTERNAL_CHANNELS, INTERNAL_CHANNELS};

/// Last applied vent angles, as requested (pre-inversion)
#[derive(Debug, Clone, Default)]
pub struct VentState {
    pub internal: [f64; 4],
    pub external: [f64; 4],
}

/// Vent angle preprocessing service
pub struct VentService {
    internal_max: [f64; 4],
    external_max: [f64; 4],
    state: VentState,
}

impl VentService {
    /// Build from the per-channel max-angle table (channels 0..7)
    pub fn new(max_angles: &[f64; 8]) -> Self {
        let mut internal_max = [0.0; 4];
        let mut external_max = [0.0; 4];
        for (i, &channel) in INTERNAL_CHANNELS.iter().enumerate() {
            internal_max[i] = max_angles[channel as usize];
        }
        for (i, &channel) in EXTERNAL_CHANNELS.iter().enumerate() {
            external_max[i] = max_angles[channel as usize];
        }
        Self {
            internal_max,
            external_max,
            state: VentState::default(),
        }
    }

    /// Normalize and clamp an internal bank request
    pub fn preprocess_internal(&mut self, raw: &[f64]) -> [f64; 4] {
        let mut angles = normalize4(raw);
        for (angle, max) in angles.iter_mut().zip(self.internal_max.iter()) {
            *angle = angle.clamp(0.0, *max);
        }
        self.state.internal = angles;
        angles
    }

    /// Normalize and clamp an external bank request
    pub fn preprocess_external(&mut self, raw: &[f64]) -> [f64; 4] {
        let mut angles = normalize4(raw);
        for (angle, max) in angles.iter_mut().zip(self.external_max.iter()) {
            *angle = angle.clamp(0.0, *max);
        }
        self.state.external = angles;
        angles
    }

    /// Last applied angles
    pub fn state(&self) -> &VentState {
        &self.state
    }
}
