//! Configuration for the VayuIO daemon
//!
//! Loads configuration from a TOML file with the parameters needed for
//! pure hardware abstraction: bus paths, servo motion constants, and the
//! streaming endpoints.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub unit: UnitConfig,
    pub servo: ServoConfig,
    pub peltier: PeltierConfig,
    pub fanled: FanLedConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
}

/// Unit identity (used in published status)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitConfig {
    pub id: u32,
}

/// Servo bank configuration (PCA9685 over I²C)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServoConfig {
    /// I²C bus device path
    pub i2c_bus: String,
    /// PCA9685 I²C address (board jumper dependent)
    pub i2c_address: u8,
    /// PWM frequency in Hz
    pub pwm_freq_hz: u16,
    /// Reference minimum pulse representing 0° on every channel
    pub home_pulse: u16,
    /// Per-channel maximum allowed angle, channels 0..7
    pub max_angles: [f64; 8],
    /// Smallest pulse delta the servos reliably act on
    pub min_move_pulse: u16,
    /// Settle delay after each pulse write, in milliseconds
    pub settle_ms: u64,
    /// Pulses swept through near home during recalibration
    pub warmup_pulses: Vec<u16>,
    /// Sweep and home every channel at startup
    pub home_on_start: bool,
}

/// Thermoelectric element configuration (BTS7960 H-bridge, BCM pins)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeltierConfig {
    pub r_en_pin: u8,
    pub r_pwm_pin: u8,
    pub l_en_pin: u8,
    pub l_pwm_pin: u8,
    /// Software PWM frequency in Hz
    pub pwm_hz: f64,
    /// Lowest non-zero duty the element is driven at (see services::thermo)
    pub min_on_duty: u8,
}

/// Fan/LED controller configuration (USB serial to the secondary MCU)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FanLedConfig {
    /// Serial port path; `None` selects the first /dev/ttyACM* or /dev/ttyUSB*
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Swap blue/green tokens before transmit (miswired LED strips)
    pub swap_blue_green: bool,
}

/// TCP streaming configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// TCP bind address for inbound commands
    pub cmd_address: String,
    /// TCP bind address for outbound status snapshots
    pub status_address: String,
    /// Status publish interval in milliseconds
    pub status_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration for the Vayu rev-B controller board
    ///
    /// Suitable for testing and development. Production deployments should
    /// use a proper TOML configuration file.
    pub fn vayu_defaults() -> Self {
        Self {
            unit: UnitConfig { id: 1 },
            servo: ServoConfig {
                i2c_bus: "/dev/i2c-1".to_string(),
                i2c_address: 0x60,
                pwm_freq_hz: 50,
                home_pulse: 150,
                max_angles: [60.0, 60.0, 60.0, 60.0, 80.0, 80.0, 80.0, 80.0],
                min_move_pulse: 15,
                settle_ms: 300,
                warmup_pulses: vec![155, 160, 165],
                home_on_start: true,
            },
            peltier: PeltierConfig {
                r_en_pin: 17,
                r_pwm_pin: 18,
                l_en_pin: 23,
                l_pwm_pin: 24,
                pwm_hz: 1000.0,
                min_on_duty: 50,
            },
            fanled: FanLedConfig {
                port: None,
                baud_rate: 115_200,
                timeout_ms: 2000,
                swap_blue_green: true,
            },
            streaming: StreamingConfig {
                cmd_address: "0.0.0.0:5555".to_string(),
                status_address: "0.0.0.0:5556".to_string(),
                status_interval_ms: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::vayu_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::vayu_defaults();
        assert_eq!(config.servo.i2c_bus, "/dev/i2c-1");
        assert_eq!(config.servo.i2c_address, 0x60);
        assert_eq!(config.servo.home_pulse, 150);
        assert_eq!(config.servo.min_move_pulse, 15);
        assert_eq!(config.servo.max_angles[0], 60.0);
        assert_eq!(config.servo.max_angles[7], 80.0);
        assert_eq!(config.streaming.cmd_address, "0.0.0.0:5555");
        assert_eq!(config.peltier.min_on_duty, 50);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::vayu_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should contain all sections
        assert!(toml_string.contains("[unit]"));
        assert!(toml_string.contains("[servo]"));
        assert!(toml_string.contains("[peltier]"));
        assert!(toml_string.contains("[fanled]"));
        assert!(toml_string.contains("[streaming]"));
        assert!(toml_string.contains("[logging]"));

        // Should contain key values
        assert!(toml_string.contains("home_pulse = 150"));
        assert!(toml_string.contains("min_move_pulse = 15"));
        assert!(toml_string.contains("i2c_bus = \"/dev/i2c-1\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[unit]
id = 3

[servo]
i2c_bus = "/dev/i2c-4"
i2c_address = 0x41
pwm_freq_hz = 50
home_pulse = 150
max_angles = [60.0, 60.0, 60.0, 60.0, 80.0, 80.0, 80.0, 80.0]
min_move_pulse = 12
settle_ms = 250
warmup_pulses = [155, 160, 165]
home_on_start = false

[peltier]
r_en_pin = 17
r_pwm_pin = 18
l_en_pin = 23
l_pwm_pin = 24
pwm_hz = 1000.0
min_on_duty = 40

[fanled]
baud_rate = 115200
timeout_ms = 2000
swap_blue_green = false

[streaming]
cmd_address = "127.0.0.1:5555"
status_address = "127.0.0.1:5556"
status_interval_ms = 500

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.unit.id, 3);
        assert_eq!(config.servo.i2c_bus, "/dev/i2c-4");
        assert_eq!(config.servo.min_move_pulse, 12);
        assert!(!config.servo.home_on_start);
        assert_eq!(config.fanled.port, None);
        assert_eq!(config.streaming.status_interval_ms, 500);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_round_trip() {
        let config = AppConfig::vayu_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.servo.max_angles, config.servo.max_angles);
        assert_eq!(parsed.servo.warmup_pulses, config.servo.warmup_pulses);
        assert_eq!(parsed.streaming.status_interval_ms, 1000);
    }
}
