//! Zone LED color mapping
//!
//! Maps the four-zone thermal sensation vector (TSV, roughly -3..3) onto
//! LED colors: blue where the zone reads cold, red where it reads hot,
//! white in the comfort band.

use super::normalize4;
use crate::devices::fanled::LedColor;
use crate::error::{Error, Result};

/// TSV at or below this reads cold (blue)
pub const TSV_COLD_HIGH: f64 = -0.5;
/// TSV at or above this reads hot (red)
pub const TSV_HOT_LOW: f64 = 0.5;

/// Last applied TSV and colors
#[derive(Debug, Clone)]
pub struct LightingState {
    pub tsv: [f64; 4],
    pub colors: [LedColor; 4],
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            tsv: [0.0; 4],
            colors: [LedColor::White; 4],
        }
    }
}

/// TSV → LED color mapping service
pub struct LightingService {
    cold_high: f64,
    hot_low: f64,
    state: LightingState,
}

impl LightingService {
    /// Create a service with custom comfort-band thresholds
    pub fn new(cold_high: f64, hot_low: f64) -> Result<Self> {
        if cold_high >= hot_low {
            return Err(Error::InvalidParameter(format!(
                "cold_high ({}) must be below hot_low ({})",
                cold_high, hot_low
            )));
        }
        Ok(Self {
            cold_high,
            hot_low,
            state: LightingState::default(),
        })
    }

    /// Map a TSV vector to four zone colors
    pub fn preprocess(&mut self, tsv: &[f64]) -> [LedColor; 4] {
        let tsv = normalize4(tsv);
        let colors = tsv.map(|v| self.map_tsv(v));
        self.state = LightingState { tsv, colors };
        colors
    }

    /// Last applied state
    pub fn state(&self) -> &LightingState {
        &self.state
    }

    fn map_tsv(&self, value: f64) -> LedColor {
        if value <= self.cold_high {
            LedColor::Blue
        } else if value >= self.hot_low {
            LedColor::Red
        } else {
            LedColor::White
        }
    }
}

impl Default for LightingService {
    fn default() -> Self {
        // Thresholds are ordered constants; new cannot fail on them.
        Self::new(TSV_COLD_HIGH, TSV_HOT_LOW).expect("default thresholds are ordered")
    }
}
