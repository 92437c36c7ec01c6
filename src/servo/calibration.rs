//! Pulse ↔ angle calibration table
//!
//! The servo horns on the vent linkage do not move linearly with drive
//! pulse, so both conversion directions are interpolated from a measured
//! sample table. The table was captured on the production unit by stepping
//! the drive pulse in increments of 5 and reading the vent angle with a
//! protractor jig; it is strictly monotonic in both dimensions.
//!
//! Interpolation is a monotone cubic Hermite spline (Fritsch-Carlson
//! tangents), fit once at construction. Outside the sampled domain both
//! directions extrapolate linearly along the endpoint tangents instead of
//! failing; callers clamp angles before conversion so extrapolated values
//! never reach the hardware.

use crate::error::{Error, Result};

/// Measured (pulse, angle) samples, captured at 50 Hz drive
const FACTORY_SAMPLES: [(u16, f64); 71] = [
    (150, 0.0),
    (155, 5.5),
    (160, 7.0),
    (165, 9.0),
    (170, 11.5),
    (175, 14.5),
    (180, 16.0),
    (185, 18.5),
    (190, 21.0),
    (195, 23.5),
    (200, 26.5),
    (205, 28.5),
    (210, 31.0),
    (215, 33.0),
    (220, 35.0),
    (225, 37.5),
    (230, 40.0),
    (235, 42.5),
    (240, 44.5),
    (245, 46.5),
    (250, 48.5),
    (255, 50.5),
    (260, 52.5),
    (265, 54.5),
    (270, 56.5),
    (275, 58.5),
    (280, 60.5),
    (285, 63.0),
    (290, 64.5),
    (295, 66.0),
    (300, 68.5),
    (305, 70.0),
    (310, 72.0),
    (315, 74.0),
    (320, 76.5),
    (325, 78.5),
    (330, 81.0),
    (335, 83.0),
    (340, 85.5),
    (345, 87.5),
    (350, 89.5),
    (355, 91.5),
    (360, 93.5),
    (365, 96.0),
    (370, 98.0),
    (375, 100.5),
    (380, 102.5),
    (385, 104.5),
    (390, 106.5),
    (395, 108.5),
    (400, 111.0),
    (405, 113.0),
    (410, 115.0),
    (415, 117.0),
    (420, 119.0),
    (425, 121.5),
    (430, 123.5),
    (435, 126.0),
    (440, 128.0),
    (445, 130.0),
    (450, 132.5),
    (455, 134.5),
    (460, 137.0),
    (465, 139.0),
    (470, 141.5),
    (475, 143.5),
    (480, 145.5),
    (485, 147.5),
    (490, 150.5),
    (495, 152.5),
    (500, 154.5),
];

/// Monotone cubic Hermite interpolant over strictly increasing knots
#[derive(Debug, Clone)]
struct MonotoneCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    tangents: Vec<f64>,
}

impl MonotoneCubic {
    /// Fit tangents with the Fritsch-Carlson limiter so the interpolant
    /// never overshoots between knots
    fn fit(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        let n = xs.len();
        debug_assert!(n >= 2);

        let mut secants = vec![0.0; n - 1];
        for i in 0..n - 1 {
            secants[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]);
        }

        let mut tangents = vec![0.0; n];
        tangents[0] = secants[0];
        tangents[n - 1] = secants[n - 2];
        for i in 1..n - 1 {
            if secants[i - 1] * secants[i] <= 0.0 {
                tangents[i] = 0.0;
            } else {
                tangents[i] = (secants[i - 1] + secants[i]) / 2.0;
            }
        }

        // Limit tangent magnitude to keep each segment monotone
        for i in 0..n - 1 {
            if secants[i] == 0.0 {
                tangents[i] = 0.0;
                tangents[i + 1] = 0.0;
                continue;
            }
            let a = tangents[i] / secants[i];
            let b = tangents[i + 1] / secants[i];
            let s = a * a + b * b;
            if s > 9.0 {
                let t = 3.0 / s.sqrt();
                tangents[i] = t * a * secants[i];
                tangents[i + 1] = t * b * secants[i];
            }
        }

        Self { xs, ys, tangents }
    }

    fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();

        // Linear extrapolation along the endpoint tangents
        if x <= self.xs[0] {
            return self.ys[0] + self.tangents[0] * (x - self.xs[0]);
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1] + self.tangents[n - 1] * (x - self.xs[n - 1]);
        }

        let seg = match self.xs.binary_search_by(|probe| probe.total_cmp(&x)) {
            Ok(i) => return self.ys[i],
            Err(i) => i - 1,
        };

        let h = self.xs[seg + 1] - self.xs[seg];
        let t = (x - self.xs[seg]) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * self.ys[seg]
            + h10 * h * self.tangents[seg]
            + h01 * self.ys[seg + 1]
            + h11 * h * self.tangents[seg + 1]
    }
}

/// Bidirectional pulse ↔ angle mapping, immutable after construction
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    pulse_to_angle: MonotoneCubic,
    angle_to_pulse: MonotoneCubic,
    min_pulse: u16,
    max_pulse: u16,
}

impl CalibrationTable {
    /// Build a table from `(pulse, angle)` samples
    ///
    /// Samples must be strictly increasing in both pulse and angle;
    /// anything else is a construction error, not a runtime surprise.
    pub fn from_samples(samples: &[(u16, f64)]) -> Result<Self> {
        if samples.len() < 2 {
            return Err(Error::InvalidParameter(
                "calibration table needs at least 2 samples".to_string(),
            ));
        }
        for pair in samples.windows(2) {
            if pair[1].0 <= pair[0].0 || pair[1].1 <= pair[0].1 {
                return Err(Error::InvalidParameter(format!(
                    "calibration samples not strictly monotonic near pulse {}",
                    pair[0].0
                )));
            }
        }

        let pulses: Vec<f64> = samples.iter().map(|(p, _)| f64::from(*p)).collect();
        let angles: Vec<f64> = samples.iter().map(|(_, a)| *a).collect();

        Ok(Self {
            pulse_to_angle: MonotoneCubic::fit(pulses.clone(), angles.clone()),
            angle_to_pulse: MonotoneCubic::fit(angles, pulses),
            min_pulse: samples[0].0,
            max_pulse: samples[samples.len() - 1].0,
        })
    }

    /// Table built from the factory-measured samples
    pub fn factory() -> Self {
        // The factory table is known-good; from_samples cannot fail on it.
        Self::from_samples(&FACTORY_SAMPLES).expect("factory calibration table is monotonic")
    }

    /// Convert a drive pulse to the measured vent angle
    pub fn angle_of(&self, pulse: u16) -> f64 {
        self.pulse_to_angle.eval(f64::from(pulse))
    }

    /// Convert a vent angle to the nearest drive pulse
    pub fn pulse_of(&self, angle: f64) -> u16 {
        let pulse = self.angle_to_pulse.eval(angle).round();
        pulse.clamp(0.0, f64::from(u16::MAX)) as u16
    }

    /// First sampled pulse
    pub fn min_pulse(&self) -> u16 {
        self.min_pulse
    }

    /// Last sampled pulse
    pub fn max_pulse(&self) -> u16 {
        self.max_pulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_knots_are_exact() {
        let table = CalibrationTable::factory();
        for (pulse, angle) in FACTORY_SAMPLES {
            assert_relative_eq!(table.angle_of(pulse), angle, epsilon = 1e-9);
            assert_eq!(table.pulse_of(angle), pulse);
        }
    }

    #[test]
    fn test_round_trip_within_one_pulse() {
        let table = CalibrationTable::factory();
        for pulse in 150..=500u16 {
            let angle = table.angle_of(pulse);
            let back = table.pulse_of(angle);
            let err = (i32::from(back) - i32::from(pulse)).abs();
            assert!(
                err <= 1,
                "round trip {} -> {:.3} -> {} (err {})",
                pulse,
                angle,
                back,
                err
            );
        }
    }

    #[test]
    fn test_angle_monotonic_over_domain() {
        let table = CalibrationTable::factory();
        let mut prev = table.angle_of(150);
        for pulse in 151..=500u16 {
            let angle = table.angle_of(pulse);
            assert!(
                angle >= prev,
                "angle_of not monotonic at pulse {}: {:.4} < {:.4}",
                pulse,
                angle,
                prev
            );
            prev = angle;
        }
    }

    #[test]
    fn test_extrapolation_does_not_fail() {
        let table = CalibrationTable::factory();
        assert!(table.angle_of(100) < 0.0);
        assert!(table.angle_of(600) > 154.5);
        // pulse_of saturates rather than wrapping below zero
        assert_eq!(table.pulse_of(-1000.0), 0);
    }

    #[test]
    fn test_rejects_non_monotonic_samples() {
        let samples = [(150, 0.0), (160, 5.0), (155, 7.0)];
        assert!(CalibrationTable::from_samples(&samples).is_err());

        let samples = [(150, 0.0), (160, 5.0), (170, 5.0)];
        assert!(CalibrationTable::from_samples(&samples).is_err());

        assert!(CalibrationTable::from_samples(&[(150, 0.0)]).is_err());
    }

    #[test]
    fn test_interpolated_values_stay_between_neighbors() {
        let table = CalibrationTable::factory();
        // 152 lies between the 150 and 155 knots
        let angle = table.angle_of(152);
        assert!(angle > 0.0 && angle < 5.5, "got {}", angle);
    }
}
