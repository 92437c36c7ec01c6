//! BTS7960 H-bridge driver for the thermoelectric element
//!
//! The Peltier element is driven forward-only through a BTS7960 half-bridge
//! pair on four GPIO lines. Despite forward-only use, *both* enable lines
//! must be high for the bridge to conduct; the reverse PWM line is held low
//! permanently. Duty is applied as software PWM on the forward PWM pin.

use crate::config::PeltierConfig;
use crate::error::{Error, Result};
use rppal::gpio::{Gpio, OutputPin};
use std::time::Duration;

/// Forward-only BTS7960 driver
pub struct Bts7960 {
    r_pwm: OutputPin,
    l_pwm: OutputPin,
    r_en: OutputPin,
    l_en: OutputPin,
    pwm_hz: f64,
    duty: u8,
}

impl Bts7960 {
    /// Claim the GPIO lines and bring the bridge to the forward-enabled
    /// idle state (duty 0)
    pub fn open(config: &PeltierConfig) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| Error::Gpio(e.to_string()))?;
        let claim = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .map_err(|e| Error::Gpio(format!("GPIO{}: {}", pin, e)))?
                .into_output_low())
        };

        let mut driver = Self {
            r_pwm: claim(config.r_pwm_pin)?,
            l_pwm: claim(config.l_pwm_pin)?,
            r_en: claim(config.r_en_pin)?,
            l_en: claim(config.l_en_pin)?,
            pwm_hz: config.pwm_hz,
            duty: 0,
        };

        driver.safe_init();
        driver.enable_forward();
        driver.set_duty(0)?;

        log::info!(
            "BTS7960 ready (R_PWM=GPIO{}, {} Hz)",
            config.r_pwm_pin,
            config.pwm_hz
        );
        Ok(driver)
    }

    /// All lines low: bridge fully disabled
    pub fn safe_init(&mut self) {
        self.r_pwm.set_low();
        self.l_pwm.set_low();
        self.l_en.set_low();
        self.r_en.set_low();
        std::thread::sleep(Duration::from_millis(50));
    }

    /// Enable forward conduction (both enables high, reverse PWM held low)
    pub fn enable_forward(&mut self) {
        self.l_en.set_high();
        self.l_pwm.set_low();
        self.r_en.set_high();
        std::thread::sleep(Duration::from_millis(20));
    }

    /// Apply a duty cycle, clamped to 0..=100; returns the applied value
    pub fn set_duty(&mut self, percent: u8) -> Result<u8> {
        let percent = percent.min(100);
        if percent == 0 {
            self.r_pwm
                .clear_pwm()
                .map_err(|e| Error::Gpio(e.to_string()))?;
            self.r_pwm.set_low();
        } else {
            self.r_pwm
                .set_pwm_frequency(self.pwm_hz, f64::from(percent) / 100.0)
                .map_err(|e| Error::Gpio(e.to_string()))?;
        }
        self.duty = percent;
        Ok(percent)
    }

    /// Currently applied duty
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Duty 0 and bridge disabled; used on shutdown
    pub fn safe_off(&mut self) {
        if let Err(e) = self.set_duty(0) {
            log::warn!("BTS7960 safe-off duty clear failed: {}", e);
        }
        self.r_en.set_low();
        self.l_en.set_low();
    }
}

impl Drop for Bts7960 {
    fn drop(&mut self) {
        self.safe_off();
    }
}
