//! Motion planner for the servo bank
//!
//! The vent servos silently ignore pulse deltas smaller than a configured
//! minimum, so a requested angle cannot always be written directly. The
//! planner turns "move channel N to angle A" into a pulse sequence that the
//! hardware will actually act on:
//!
//! - large extending deltas go straight to the target;
//! - large retracting deltas reseat the mechanism at home first (retraction
//!   under load is where the linkage stalls);
//! - deltas inside the dead zone take a detour through a boundary pulse so
//!   the initial swing is big enough for the servo to respond.
//!
//! Every pulse write updates the position store and is followed by a fixed
//! settle delay so the horn reaches the commanded position before the next
//! write.

use crate::config::ServoConfig;
use crate::error::{Error, Result};
use crate::servo::calibration::CalibrationTable;
use crate::servo::state::{CHANNEL_COUNT, ChannelPositions};
use crate::transport::PulseBus;
use std::time::Duration;

/// Proximity window for the detour classification, in pulses
///
/// The dead-zone threshold is configurable, but the boundary-proximity
/// window is capped at 10 so a generous threshold does not widen the
/// "near a boundary" bands.
const DETOUR_WINDOW_PULSE: u16 = 10;

/// The two pulse boundaries of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// Global home pulse (0° reference)
    Home,
    /// Channel maximum pulse
    Max,
}

/// Which boundary a pulse is nearer to overall (ties go to home)
fn nearer_boundary(pulse: u16, home: u16, max: u16) -> Boundary {
    let to_home = (i32::from(pulse) - i32::from(home)).abs();
    let to_max = (i32::from(pulse) - i32::from(max)).abs();
    if to_home > to_max {
        Boundary::Max
    } else {
        Boundary::Home
    }
}

/// One entry of a detour sequence template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Home,
    Max,
    Target,
}

// Sequence templates. Every template ends at the target and starts at a
// boundary pulse, which is what forces a swing large enough to escape the
// dead zone.
const FROM_HOME: &[Step] = &[Step::Home, Step::Target];
const FROM_MAX: &[Step] = &[Step::Max, Step::Target];
const SWING_MAX_HOME: &[Step] = &[Step::Max, Step::Home, Step::Target];
const SWING_HOME_MAX: &[Step] = &[Step::Home, Step::Max, Step::Target];
const FALLBACK_BOUNCE: &[Step] = &[Step::Home, Step::Max, Step::Home, Step::Max, Step::Target];

/// Dead-zone detour classification
///
/// Target and current pulses are classified by proximity to the two channel
/// boundaries; each case maps to a fixed sequence template. "Straddling"
/// cases cover channels whose travel is so short that a pulse sits inside
/// both boundary windows at once; the carried [`Boundary`] is the one the
/// pulse is nearer to overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DetourCase {
    /// Both pulses inside both boundary windows
    PinnedBothBoundaries {
        target_side: Boundary,
        current_side: Boundary,
    },
    /// Both near max, target additionally near home
    NearMaxTargetStraddling { target_side: Boundary },
    /// Both near max, current additionally near home
    NearMaxCurrentStraddling { current_side: Boundary },
    /// Both pulses near the channel maximum
    BothNearMax,
    /// Both near home, target additionally near max
    NearHomeTargetStraddling { target_side: Boundary },
    /// Both near home, current additionally near max
    NearHomeCurrentStraddling { current_side: Boundary },
    /// Both pulses near home
    BothNearHome,
    /// Only the target is near the channel maximum
    TargetNearMax { current_near_home: bool },
    /// Only the target is near home
    TargetNearHome { current_near_max: bool },
    /// Target and current pulses are identical
    EqualPulses,
    /// No specific boundary rule matched (the default)
    Apart,
    /// Guard case; not produced by `classify` today (the nearer-boundary
    /// decision is total) but kept with the full boundary bounce so the
    /// behavior stays defined if the classification ever widens
    Fallback,
}

impl DetourCase {
    /// Classify a (target, current) pulse pair
    pub(crate) fn classify(target: u16, current: u16, home: u16, max: u16, window: u16) -> Self {
        let near = |pulse: u16, boundary: u16| {
            (i32::from(pulse) - i32::from(boundary)).abs() < i32::from(window)
        };
        let target_near_max = near(target, max);
        let target_near_home = near(target, home);
        let current_near_max = near(current, max);
        let current_near_home = near(current, home);

        if target_near_max && current_near_max {
            if target_near_home && current_near_home {
                DetourCase::PinnedBothBoundaries {
                    target_side: nearer_boundary(target, home, max),
                    current_side: nearer_boundary(current, home, max),
                }
            } else if target_near_home {
                DetourCase::NearMaxTargetStraddling {
                    target_side: nearer_boundary(target, home, max),
                }
            } else if current_near_home {
                DetourCase::NearMaxCurrentStraddling {
                    current_side: nearer_boundary(current, home, max),
                }
            } else {
                DetourCase::BothNearMax
            }
        } else if target_near_home && current_near_home {
            if target_near_max {
                DetourCase::NearHomeTargetStraddling {
                    target_side: nearer_boundary(target, home, max),
                }
            } else if current_near_max {
                DetourCase::NearHomeCurrentStraddling {
                    current_side: nearer_boundary(current, home, max),
                }
            } else {
                DetourCase::BothNearHome
            }
        } else if target_near_max {
            DetourCase::TargetNearMax { current_near_home }
        } else if target_near_home {
            DetourCase::TargetNearHome { current_near_max }
        } else if current == target {
            DetourCase::EqualPulses
        } else {
            DetourCase::Apart
        }
    }

    /// Sequence template for this case
    fn steps(self) -> &'static [Step] {
        match self {
            DetourCase::PinnedBothBoundaries {
                target_side,
                current_side,
            } => match (target_side, current_side) {
                (Boundary::Max, Boundary::Max) => FROM_HOME,
                (Boundary::Max, Boundary::Home) => SWING_MAX_HOME,
                (Boundary::Home, Boundary::Home) => FROM_MAX,
                (Boundary::Home, Boundary::Max) => SWING_HOME_MAX,
            },
            DetourCase::NearMaxTargetStraddling { target_side } => match target_side {
                Boundary::Max => FROM_HOME,
                Boundary::Home => SWING_HOME_MAX,
            },
            DetourCase::NearMaxCurrentStraddling { current_side } => match current_side {
                Boundary::Max => FROM_HOME,
                Boundary::Home => SWING_MAX_HOME,
            },
            DetourCase::BothNearMax => FROM_HOME,
            DetourCase::NearHomeTargetStraddling { target_side } => match target_side {
                Boundary::Max => SWING_MAX_HOME,
                Boundary::Home => FROM_MAX,
            },
            DetourCase::NearHomeCurrentStraddling { current_side } => match current_side {
                Boundary::Max => SWING_HOME_MAX,
                Boundary::Home => FROM_MAX,
            },
            DetourCase::BothNearHome => FROM_MAX,
            DetourCase::TargetNearMax { current_near_home } => {
                if current_near_home {
                    SWING_MAX_HOME
                } else {
                    FROM_HOME
                }
            }
            DetourCase::TargetNearHome { current_near_max } => {
                if current_near_max {
                    SWING_HOME_MAX
                } else {
                    FROM_MAX
                }
            }
            DetourCase::EqualPulses => FROM_HOME,
            DetourCase::Apart => FROM_HOME,
            DetourCase::Fallback => FALLBACK_BOUNCE,
        }
    }
}

/// Detour pulse sequence for a dead-zone move
///
/// The returned sequence always ends at `target` and begins with a boundary
/// pulse.
pub(crate) fn detour_sequence(
    target: u16,
    current: u16,
    home: u16,
    max: u16,
    window: u16,
) -> Vec<u16> {
    let case = DetourCase::classify(target, current, home, max, window);
    case.steps()
        .iter()
        .map(|step| match step {
            Step::Home => home,
            Step::Max => max,
            Step::Target => target,
        })
        .collect()
}

/// Per-channel motion planner for the 8-channel servo bank
///
/// Owns the position store; all access is serialized by the façade.
pub struct MotionPlanner {
    table: CalibrationTable,
    home_pulse: u16,
    max_pulses: [u16; CHANNEL_COUNT],
    max_angles: [f64; CHANNEL_COUNT],
    min_move_pulse: u16,
    warmup_pulses: Vec<u16>,
    settle: Duration,
    positions: ChannelPositions,
}

impl MotionPlanner {
    /// Build a planner from a calibration table and the servo configuration
    pub fn new(table: CalibrationTable, config: &ServoConfig) -> Result<Self> {
        let mut max_pulses = [0u16; CHANNEL_COUNT];
        for (channel, angle) in config.max_angles.iter().enumerate() {
            if *angle <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "channel {} max angle must be positive, got {}",
                    channel, angle
                )));
            }
            let max_pulse = table.pulse_of(*angle);
            if max_pulse <= config.home_pulse {
                return Err(Error::InvalidParameter(format!(
                    "channel {} max pulse {} does not exceed home pulse {}",
                    channel, max_pulse, config.home_pulse
                )));
            }
            max_pulses[channel] = max_pulse;
        }
        if config.min_move_pulse == 0 {
            return Err(Error::InvalidParameter(
                "min_move_pulse must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            table,
            home_pulse: config.home_pulse,
            max_pulses,
            max_angles: config.max_angles,
            min_move_pulse: config.min_move_pulse,
            warmup_pulses: config.warmup_pulses.clone(),
            settle: Duration::from_millis(config.settle_ms),
            positions: ChannelPositions::new(),
        })
    }

    fn check_channel(channel: u8) -> Result<()> {
        if usize::from(channel) >= CHANNEL_COUNT {
            return Err(Error::InvalidParameter(format!(
                "servo channel out of range: {}",
                channel
            )));
        }
        Ok(())
    }

    /// Last commanded pulse for `channel`
    pub fn position(&self, channel: u8) -> u16 {
        self.positions.get(channel)
    }

    /// Snapshot of all channel positions
    pub fn positions(&self) -> [u16; CHANNEL_COUNT] {
        self.positions.snapshot()
    }

    /// Maximum allowed angle for `channel`
    pub fn max_angle(&self, channel: u8) -> f64 {
        self.max_angles[channel as usize]
    }

    /// Calibration table in use
    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Write one pulse, record it, and wait out the settle delay
    fn move_to_pulse(&mut self, bus: &mut dyn PulseBus, channel: u8, pulse: u16) -> Result<()> {
        bus.write_pulse(channel, pulse)?;
        self.positions.set(channel, pulse);
        std::thread::sleep(self.settle);
        Ok(())
    }

    /// Move `channel` to its home pulse
    pub fn go_home(&mut self, bus: &mut dyn PulseBus, channel: u8) -> Result<()> {
        Self::check_channel(channel)?;
        self.move_to_pulse(bus, channel, self.home_pulse)?;
        log::info!("CH{}: homed ({})", channel, self.home_pulse);
        Ok(())
    }

    /// Full-travel sweep used when the channel position is unknown
    pub fn initialize_sweep(&mut self, bus: &mut dyn PulseBus, channel: u8) -> Result<()> {
        Self::check_channel(channel)?;
        let max_pulse = self.max_pulses[channel as usize];
        self.move_to_pulse(bus, channel, self.home_pulse)?;
        self.move_to_pulse(bus, channel, max_pulse)?;
        self.move_to_pulse(bus, channel, self.home_pulse)?;
        self.move_to_pulse(bus, channel, max_pulse)?;
        Ok(())
    }

    /// Sweep and home every channel
    pub fn home_all(&mut self, bus: &mut dyn PulseBus) -> Result<()> {
        for channel in 0..CHANNEL_COUNT as u8 {
            self.initialize_sweep(bus, channel)?;
            self.go_home(bus, channel)?;
        }
        Ok(())
    }

    /// Reseat `channel` at home: home, oscillate through the warm-up
    /// pulses just above home, then home again
    pub fn recalibrate(&mut self, bus: &mut dyn PulseBus, channel: u8) -> Result<()> {
        Self::check_channel(channel)?;
        self.move_to_pulse(bus, channel, self.home_pulse)?;
        let warmups = self.warmup_pulses.clone();
        for pulse in warmups {
            self.move_to_pulse(bus, channel, pulse)?;
        }
        self.move_to_pulse(bus, channel, self.home_pulse)?;
        log::debug!("CH{}: home recalibrated", channel);
        Ok(())
    }

    /// Move `channel` to `angle`, working around the servo dead zone
    ///
    /// The target angle is converted to a pulse and clamped to the channel
    /// range (clamping is logged, never an error). A hardware write failure
    /// aborts the sequence immediately; the position store keeps the last
    /// successfully written pulse.
    pub fn move_to_angle(&mut self, bus: &mut dyn PulseBus, channel: u8, angle: f64) -> Result<()> {
        Self::check_channel(channel)?;

        let mut target_pulse = self.table.pulse_of(angle);
        let max_pulse = self.max_pulses[channel as usize];
        let current_pulse = self.positions.get(channel);

        if target_pulse > max_pulse {
            log::warn!(
                "CH{}: target pulse {} above channel max {}, clamping",
                channel,
                target_pulse,
                max_pulse
            );
            target_pulse = max_pulse;
        } else if target_pulse < self.home_pulse {
            log::warn!(
                "CH{}: target pulse {} below home {}, clamping",
                channel,
                target_pulse,
                self.home_pulse
            );
            target_pulse = self.home_pulse;
        }

        let delta = i32::from(target_pulse) - i32::from(current_pulse);
        let min_move = i32::from(self.min_move_pulse);

        if delta >= min_move {
            // Extending far enough for the hardware to act on directly
            self.move_to_pulse(bus, channel, target_pulse)?;
        } else if -delta >= min_move {
            // Retracting moves are prone to backlash; reseat at home first
            self.recalibrate(bus, channel)?;
            self.move_to_pulse(bus, channel, target_pulse)?;
        } else {
            // Dead zone: detour through a boundary to force a real swing
            let start_pulse = current_pulse;
            let window = self.min_move_pulse.min(DETOUR_WINDOW_PULSE);
            let sequence =
                detour_sequence(target_pulse, current_pulse, self.home_pulse, max_pulse, window);
            log::debug!(
                "CH{}: dead-zone detour {:?} (delta {})",
                channel,
                sequence,
                delta
            );
            for pulse in sequence {
                // A partial retraction that stops mid-travel can stick;
                // reseat before any intermediate pulse below the start
                if pulse < start_pulse && pulse != self.home_pulse && pulse != max_pulse {
                    self.recalibrate(bus, channel)?;
                }
                self.move_to_pulse(bus, channel, pulse)?;
            }
        }

        Ok(())
    }
}
