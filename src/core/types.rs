//! Wire-facing command and status types
//!
//! Key types for clients:
//! - [`Command`]: inbound commands from TCP clients
//! - [`StatusData`]: the periodic actuator status snapshot

use serde::{Deserialize, Serialize};

/// Commands to the actuator controller
///
/// `SetActuators` mirrors the server's control payload: every field is
/// optional so a client can update one actuator family without touching the
/// others. Vectors are normalized to length 4 by the preprocessing services
/// (truncated or zero-padded), so a short vector is not an error at this
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Apply actuator setpoints (any subset)
    SetActuators {
        /// Thermoelectric duty request, 0-100
        #[serde(default)]
        peltier_pwm: Option<i32>,
        /// Internal vent bank opening angles (four slots)
        #[serde(default)]
        internal_servo: Option<Vec<f64>>,
        /// External vent bank angles (four slots)
        #[serde(default)]
        external_servo: Option<Vec<f64>>,
        /// Intake fan duties (four fans), 0-100
        #[serde(default)]
        small_fan_pwm: Option<Vec<i32>>,
        /// Main fan duty, 0-100
        #[serde(default)]
        large_fan_pwm: Option<i32>,
    },

    /// Thermal sensation vector for the four zones; drives the zone LEDs
    SetComfort {
        #[serde(default)]
        tsv: Vec<f64>,
    },

    /// Move one servo channel to its home pulse
    HomeChannel { channel: u8 },

    /// Sweep and home every servo channel
    HomeAll,

    /// Run the home recalibration routine on one servo channel
    RecalibrateChannel { channel: u8 },

    /// Request an immediate status publish
    QueryState,

    /// Graceful daemon shutdown
    Shutdown,
}

/// Actuator status snapshot, published periodically and after commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub unit_id: u32,
    /// Snapshot time in microseconds since the Unix epoch
    pub timestamp_us: u64,
    /// Derived from the main fan duty: off / low / medium / high
    pub airflow_speed: String,
    /// Last applied internal vent angles (pre-inversion, as requested)
    pub slot_internal: [f64; 4],
    /// Last applied external vent angles
    pub slot_external: [f64; 4],
    /// Intake fan duties
    pub fan_intake_speed: [i32; 4],
    /// Main fan duty
    pub fan_main_speed: i32,
    /// Applied thermoelectric duty
    pub energy_temp_total: u8,
    /// Zone LED colors as protocol tokens (R/G/B/W/OFF)
    pub led_colors: [String; 4],
}

impl StatusData {
    /// Empty snapshot for a unit
    pub fn new(unit_id: u32) -> Self {
        Self {
            unit_id,
            timestamp_us: 0,
            airflow_speed: "off".to_string(),
            slot_internal: [0.0; 4],
            slot_external: [0.0; 4],
            fan_intake_speed: [0; 4],
            fan_main_speed: 0,
            energy_temp_total: 0,
            led_colors: std::array::from_fn(|_| "W".to_string()),
        }
    }

    /// Update the timestamp to the current time
    pub fn touch(&mut self) {
        self.timestamp_us = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
    }
}
