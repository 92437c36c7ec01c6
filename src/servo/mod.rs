//! Servo vent bank: calibration, motion correction, dual-bank façade
//!
//! The unit drives 8 vent servos from one PCA9685. Channels 0-3 are the
//! "internal" bank and channels 4-7 the "external" bank; the two banks
//! differ only in whether the input angle is inverted before being applied
//! (an internal vent is fully open at 0° shaft angle because of how the
//! linkage is mounted, so a requested opening θ becomes 60 − θ).

pub mod calibration;
pub mod planner;
pub mod state;

pub use calibration::CalibrationTable;
pub use planner::MotionPlanner;
pub use state::{CHANNEL_COUNT, ChannelPositions};

use crate::config::ServoConfig;
use crate::error::{Error, Result};
use crate::transport::PulseBus;
use parking_lot::Mutex;

/// Channels of the internal (angle-inverted) bank
pub const INTERNAL_CHANNELS: [u8; 4] = [0, 1, 2, 3];
/// Channels of the external (pass-through) bank
pub const EXTERNAL_CHANNELS: [u8; 4] = [4, 5, 6, 7];

/// Full-scale angle of the internal bank linkage
///
/// 60° input means fully open and 0° fully closed on channels 0-3. This is
/// a wiring/mounting property of those four vents, not of the servos.
const INTERNAL_FULL_SCALE_DEG: f64 = 60.0;

struct BankInner {
    planner: MotionPlanner,
    bus: Box<dyn PulseBus>,
}

/// Application-facing façade over the 8-channel servo bank
///
/// All hardware access goes through one exclusive section: two concurrent
/// batch calls never interleave pulse-by-pulse. Calls are synchronous and
/// blocking; a batch over both banks can block for several seconds because
/// of the per-write settle delay.
pub struct ServoBank {
    inner: Mutex<BankInner>,
}

impl ServoBank {
    /// Construct the bank over an injected pulse bus
    ///
    /// Validates the configuration, then (when `home_on_start` is set)
    /// sweeps and homes every channel so the commanded positions are known.
    pub fn new(bus: Box<dyn PulseBus>, config: &ServoConfig) -> Result<Self> {
        let planner = MotionPlanner::new(CalibrationTable::factory(), config)?;
        let bank = Self {
            inner: Mutex::new(BankInner { planner, bus }),
        };

        if config.home_on_start {
            log::info!("Servo bank: initial sweep and homing of all channels");
            bank.home_all()?;
        }

        Ok(bank)
    }

    fn check_vector(angles: &[f64], which: &str) -> Result<()> {
        if angles.len() != 4 {
            return Err(Error::InvalidParameter(format!(
                "{} angle vector must have length 4, got {}",
                which,
                angles.len()
            )));
        }
        Ok(())
    }

    /// Clamp an angle to the channel's allowed range, logging corrections
    fn clamp_angle(planner: &MotionPlanner, channel: u8, angle: f64) -> f64 {
        let max = planner.max_angle(channel);
        if angle < 0.0 {
            log::warn!("CH{}: angle {:.1} below 0, clamping", channel, angle);
            0.0
        } else if angle > max {
            log::warn!("CH{}: angle {:.1} above max {:.1}, clamping", channel, angle, max);
            max
        } else {
            angle
        }
    }

    fn apply_internal_locked(inner: &mut BankInner, angles: &[f64]) -> Result<()> {
        for (i, &channel) in INTERNAL_CHANNELS.iter().enumerate() {
            let target = INTERNAL_FULL_SCALE_DEG - angles[i];
            let target = Self::clamp_angle(&inner.planner, channel, target);
            inner.planner.move_to_angle(inner.bus.as_mut(), channel, target)?;
        }
        Ok(())
    }

    fn apply_external_locked(inner: &mut BankInner, angles: &[f64]) -> Result<()> {
        for (i, &channel) in EXTERNAL_CHANNELS.iter().enumerate() {
            let target = Self::clamp_angle(&inner.planner, channel, angles[i]);
            inner.planner.move_to_angle(inner.bus.as_mut(), channel, target)?;
        }
        Ok(())
    }

    /// Apply four angles to the internal bank (channels 0-3), inverted
    pub fn apply_internal(&self, angles: &[f64]) -> Result<()> {
        Self::check_vector(angles, "internal")?;
        let mut inner = self.inner.lock();
        Self::apply_internal_locked(&mut inner, angles)
    }

    /// Apply four angles to the external bank (channels 4-7), as-is
    pub fn apply_external(&self, angles: &[f64]) -> Result<()> {
        Self::check_vector(angles, "external")?;
        let mut inner = self.inner.lock();
        Self::apply_external_locked(&mut inner, angles)
    }

    /// Apply both banks under a single exclusive section
    ///
    /// Both vectors are validated before any pulse is written, so a
    /// malformed call never leaves one bank updated and the other not.
    pub fn apply_both(&self, internal: &[f64], external: &[f64]) -> Result<()> {
        Self::check_vector(internal, "internal")?;
        Self::check_vector(external, "external")?;
        let mut inner = self.inner.lock();
        Self::apply_internal_locked(&mut inner, internal)?;
        Self::apply_external_locked(&mut inner, external)
    }

    /// Move one channel to its home pulse
    pub fn home_channel(&self, channel: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        inner.planner.go_home(inner.bus.as_mut(), channel)
    }

    /// Sweep and home every channel
    pub fn home_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        inner.planner.home_all(inner.bus.as_mut())
    }

    /// Run the home recalibration routine on one channel
    pub fn recalibrate_channel(&self, channel: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        inner.planner.recalibrate(inner.bus.as_mut(), channel)
    }

    /// Move one channel to a raw (non-inverted) angle
    ///
    /// Bench entry point used by the CLI harness; application paths go
    /// through the bank operations.
    pub fn move_channel(&self, channel: u8, angle: f64) -> Result<()> {
        if usize::from(channel) >= CHANNEL_COUNT {
            return Err(Error::InvalidParameter(format!(
                "servo channel out of range: {}",
                channel
            )));
        }
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let target = Self::clamp_angle(&inner.planner, channel, angle);
        inner.planner.move_to_angle(inner.bus.as_mut(), channel, target)
    }

    /// Last commanded pulse per channel
    pub fn positions(&self) -> [u16; CHANNEL_COUNT] {
        self.inner.lock().planner.positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockPulseBus;

    fn test_config() -> ServoConfig {
        ServoConfig {
            i2c_bus: "/dev/null".to_string(),
            i2c_address: 0x60,
            pwm_freq_hz: 50,
            home_pulse: 150,
            max_angles: [60.0, 60.0, 60.0, 60.0, 80.0, 80.0, 80.0, 80.0],
            min_move_pulse: 15,
            settle_ms: 0,
            warmup_pulses: vec![155, 160, 165],
            home_on_start: false,
        }
    }

    fn test_bank() -> (ServoBank, MockPulseBus) {
        let bus = MockPulseBus::new();
        let bank = ServoBank::new(Box::new(bus.clone()), &test_config()).unwrap();
        (bank, bus)
    }

    #[test]
    fn test_rejects_wrong_length_before_any_write() {
        let (bank, bus) = test_bank();

        assert!(bank.apply_internal(&[10.0, 20.0, 30.0]).is_err());
        assert!(bank.apply_external(&[10.0; 5]).is_err());
        assert!(
            bank.apply_both(&[10.0; 4], &[10.0, 20.0, 30.0])
                .is_err()
        );
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_internal_bank_inverts() {
        let (bank, bus) = test_bank();

        // θ = 20 on the internal bank commands the pulse of 60 - 20 = 40°
        bank.apply_internal(&[20.0; 4]).unwrap();
        let table = CalibrationTable::factory();
        let expected = table.pulse_of(40.0);
        for channel in INTERNAL_CHANNELS {
            assert_eq!(bank.positions()[channel as usize], expected);
            assert_eq!(*bus.channel_writes(channel).last().unwrap(), expected);
        }
    }

    #[test]
    fn test_inversion_law_matches_external() {
        let (bank, _bus) = test_bank();
        let theta = 20.0;
        bank.apply_internal(&[theta; 4]).unwrap();
        bank.apply_external(&[INTERNAL_FULL_SCALE_DEG - theta; 4]).unwrap();

        let positions = bank.positions();
        for i in 0..4 {
            assert_eq!(positions[i], positions[i + 4]);
        }
    }

    #[test]
    fn test_home_on_start_sweeps_every_channel() {
        let bus = MockPulseBus::new();
        let mut config = test_config();
        config.home_on_start = true;
        let bank = ServoBank::new(Box::new(bus.clone()), &config).unwrap();

        let table = CalibrationTable::factory();
        for channel in 0..CHANNEL_COUNT as u8 {
            let max = table.pulse_of(config.max_angles[channel as usize]);
            assert_eq!(bus.channel_writes(channel), vec![150, max, 150, max, 150]);
        }
        assert_eq!(bank.positions(), [150; CHANNEL_COUNT]);
    }

    #[test]
    fn test_home_channel_single_write() {
        let (bank, bus) = test_bank();
        bank.home_channel(6).unwrap();
        assert_eq!(bus.channel_writes(6), vec![150]);
        assert!(bank.home_channel(8).is_err());
    }

    #[test]
    fn test_out_of_range_angle_is_clamped_not_rejected() {
        let (bank, _bus) = test_bank();

        // 100° on the external bank exceeds the 80° channel limit
        bank.apply_external(&[100.0; 4]).unwrap();
        let table = CalibrationTable::factory();
        let max = table.pulse_of(80.0);
        for channel in EXTERNAL_CHANNELS {
            assert_eq!(bank.positions()[channel as usize], max);
        }

        // θ > 60 on the internal bank inverts below 0 and clamps to 0°,
        // which is the home pulse
        bank.apply_internal(&[75.0; 4]).unwrap();
        for channel in INTERNAL_CHANNELS {
            assert_eq!(bank.positions()[channel as usize], 150);
        }
    }
}
