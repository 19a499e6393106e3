//! Linear energy calibration.
//!
//! Channel `i` maps to `min_energy + i * (max_energy - min_energy) / channels`.
//! A calibration with zero channels or zero energy span is the "zero
//! calibration": it is a legal value (e.g. before any data is loaded) and both
//! conversions simply return `0`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyCalibration {
    min_energy: f64,
    max_energy: f64,
    channels: usize,
}

impl EnergyCalibration {
    pub fn new(min_energy: f64, max_energy: f64, channels: usize) -> Self {
        Self {
            min_energy,
            max_energy,
            channels,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0)
    }

    pub fn min_energy(&self) -> f64 {
        self.min_energy
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_zero(&self) -> bool {
        let span = self.max_energy - self.min_energy;
        self.channels == 0 || span == 0.0 || !span.is_finite()
    }

    /// keV per channel (0 for the zero calibration).
    pub fn energy_per_channel(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        (self.max_energy - self.min_energy) / self.channels as f64
    }

    pub fn energy_from_channel(&self, channel: f64) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        self.min_energy + channel * self.energy_per_channel()
    }

    /// Fractional channel position of `energy`.
    pub fn channel_from_energy(&self, energy: f64) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        (energy - self.min_energy) / self.energy_per_channel()
    }

    /// Rounded channel of `energy`, if it falls inside the calibrated range.
    pub fn nearest_channel(&self, energy: f64) -> Option<usize> {
        if self.is_zero() {
            return None;
        }
        let ch = self.channel_from_energy(energy).round();
        if ch.is_finite() && ch >= 0.0 && (ch as usize) < self.channels {
            Some(ch as usize)
        } else {
            None
        }
    }

    /// Channel indices covered by the calibration (empty for the zero calibration).
    pub fn channel_range(&self) -> std::ops::Range<usize> {
        if self.is_zero() { 0..0 } else { 0..self.channels }
    }

    /// Inclusive energy window covered by the calibrated channels.
    pub fn energy_range(&self) -> (f64, f64) {
        (
            self.energy_from_channel(0.0),
            self.energy_from_channel(self.channels.saturating_sub(1) as f64),
        )
    }
}

impl Default for EnergyCalibration {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_are_inverse() {
        let cal = EnergyCalibration::new(0.0, 20.48, 2048);
        for &ch in &[0.0, 1.0, 640.5, 2047.0] {
            let e = cal.energy_from_channel(ch);
            assert!((cal.channel_from_energy(e) - ch).abs() < 1e-9);
        }
        assert!((cal.energy_per_channel() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn zero_calibration_is_a_sentinel() {
        for cal in [
            EnergyCalibration::zero(),
            EnergyCalibration::new(5.0, 5.0, 1024),
            EnergyCalibration::new(0.0, 10.0, 0),
        ] {
            assert!(cal.is_zero());
            assert_eq!(cal.energy_from_channel(100.0), 0.0);
            assert_eq!(cal.channel_from_energy(3.0), 0.0);
            assert_eq!(cal.nearest_channel(3.0), None);
            assert!(cal.channel_range().is_empty());
        }
    }

    #[test]
    fn nearest_channel_rejects_out_of_range() {
        let cal = EnergyCalibration::new(0.0, 10.0, 1000);
        assert_eq!(cal.nearest_channel(6.404), Some(640));
        assert_eq!(cal.nearest_channel(12.0), None);
        assert_eq!(cal.nearest_channel(-1.0), None);
        assert_eq!(cal.channel_range(), 0..1000);
    }
}
