//! PCA9685 pulse bus over Linux I²C

use super::PulseBus;
use crate::error::{Error, Result};
use linux_embedded_hal::I2cdev;
use pwm_pca9685::{Address, Channel, Pca9685};

/// PCA9685 internal oscillator frequency (datasheet nominal)
const OSC_CLOCK_HZ: f64 = 25_000_000.0;

/// 16-channel PWM controller driving the servo bank
///
/// Only channels 0..7 are wired on the Vayu controller board; writes to
/// higher channels are rejected before touching the bus.
pub struct Pca9685Bus {
    pwm: Pca9685<I2cdev>,
}

impl Pca9685Bus {
    /// Open the I²C bus and configure the PCA9685 for servo drive
    ///
    /// # Arguments
    /// * `bus_path` - I²C device path (e.g., "/dev/i2c-1")
    /// * `address` - 7-bit device address (board jumper dependent)
    /// * `pwm_freq_hz` - output frequency, 50 Hz for analog-profile servos
    pub fn open(bus_path: &str, address: u8, pwm_freq_hz: u16) -> Result<Self> {
        let dev = I2cdev::new(bus_path)
            .map_err(|e| Error::I2c(format!("open {}: {:?}", bus_path, e)))?;
        let mut pwm = Pca9685::new(dev, Address::from(address))
            .map_err(|e| Error::I2c(format!("{:?}", e)))?;

        let prescale = Self::prescale_for(pwm_freq_hz);
        pwm.set_prescale(prescale)
            .map_err(|e| Error::I2c(format!("{:?}", e)))?;
        pwm.enable().map_err(|e| Error::I2c(format!("{:?}", e)))?;

        log::info!(
            "PCA9685 ready (addr 0x{:02X}, {} Hz, prescale {})",
            address,
            pwm_freq_hz,
            prescale
        );

        Ok(Self { pwm })
    }

    /// Prescale register value for a target output frequency
    fn prescale_for(freq_hz: u16) -> u8 {
        let exact = OSC_CLOCK_HZ / (4096.0 * f64::from(freq_hz));
        (exact.round() as u8).saturating_sub(1)
    }

    fn channel_of(channel: u8) -> Result<Channel> {
        match channel {
            0 => Ok(Channel::C0),
            1 => Ok(Channel::C1),
            2 => Ok(Channel::C2),
            3 => Ok(Channel::C3),
            4 => Ok(Channel::C4),
            5 => Ok(Channel::C5),
            6 => Ok(Channel::C6),
            7 => Ok(Channel::C7),
            _ => Err(Error::InvalidParameter(format!(
                "servo channel out of range: {}",
                channel
            ))),
        }
    }
}

impl PulseBus for Pca9685Bus {
    fn write_pulse(&mut self, channel: u8, pulse: u16) -> Result<()> {
        let ch = Self::channel_of(channel)?;
        self.pwm
            .set_channel_on_off(ch, 0, pulse)
            .map_err(|e| Error::I2c(format!("{:?}", e)))
    }
}
