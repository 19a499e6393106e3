//! Channel intensity buffers.
//!
//! `Spectrum` is the immutable view handed around the engine. It is backed by an
//! `Arc<[f64]>` so cloning a spectrum (into scorers, worker threads, result sets)
//! never copies channel data. Derived spectra (residuals, model curves) are built
//! in a `SpectrumBuilder` and frozen once complete, so callers never observe a
//! half-computed buffer.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Immutable, fixed-length channel intensities.
#[derive(Clone, PartialEq)]
pub struct Spectrum {
    values: Arc<[f64]>,
}

impl Spectrum {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// An all-zero spectrum of `len` channels.
    pub fn zeros(len: usize) -> Self {
        Self::new(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn in_bounds(&self, channel: usize) -> bool {
        channel < self.values.len()
    }

    /// Intensity at `channel`, or `0.0` outside the spectrum.
    pub fn get(&self, channel: usize) -> f64 {
        self.values.get(channel).copied().unwrap_or(0.0)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Largest finite intensity, `0.0` for an empty spectrum.
    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    /// Channel holding the largest intensity (first one on ties).
    pub fn max_channel(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.values.iter().enumerate() {
            if !v.is_finite() {
                continue;
            }
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Start a mutable copy of this spectrum.
    pub fn to_builder(&self) -> SpectrumBuilder {
        SpectrumBuilder {
            values: self.values.to_vec(),
        }
    }
}

impl std::fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrum")
            .field("len", &self.len())
            .field("sum", &self.sum())
            .field("max", &self.max())
            .finish()
    }
}

impl From<Vec<f64>> for Spectrum {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl Serialize for Spectrum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Spectrum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<f64>::deserialize(deserializer).map(Spectrum::new)
    }
}

/// Mutable working buffer used to assemble derived spectra.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumBuilder {
    values: Vec<f64>,
}

impl SpectrumBuilder {
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, channel: usize) -> f64 {
        self.values.get(channel).copied().unwrap_or(0.0)
    }

    /// Set a channel value. Writes outside the buffer are ignored.
    pub fn set(&mut self, channel: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(channel) {
            *slot = value;
        }
    }

    /// `self += other * scale`, over the overlapping channel range.
    pub fn add_scaled(&mut self, other: &Spectrum, scale: f64) {
        for (a, b) in self.values.iter_mut().zip(other.iter()) {
            *a += b * scale;
        }
    }

    /// `self -= other`, over the overlapping channel range.
    pub fn subtract(&mut self, other: &Spectrum) {
        for (a, b) in self.values.iter_mut().zip(other.iter()) {
            *a -= b;
        }
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn freeze(self) -> Spectrum {
        Spectrum::new(self.values)
    }
}

impl From<&Spectrum> for SpectrumBuilder {
    fn from(spectrum: &Spectrum) -> Self {
        spectrum.to_builder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_subtract_and_freeze() {
        let data = Spectrum::new(vec![5.0, 6.0, 7.0]);
        let curve = Spectrum::new(vec![1.0, 2.0, 3.0]);
        let mut b = data.to_builder();
        b.subtract(&curve);
        let residual = b.freeze();
        assert_eq!(residual.values(), &[4.0, 4.0, 4.0]);
        // the source spectrum is untouched
        assert_eq!(data.values(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn max_channel_skips_non_finite() {
        let s = Spectrum::new(vec![1.0, f64::NAN, 3.0, 3.0, 2.0]);
        assert_eq!(s.max_channel(), Some(2));
        assert_eq!(s.max(), 3.0);
        assert_eq!(Spectrum::zeros(0).max_channel(), None);
    }

    #[test]
    fn out_of_bounds_reads_are_zero() {
        let s = Spectrum::new(vec![1.0]);
        assert_eq!(s.get(10), 0.0);
        assert!(!s.in_bounds(1));
    }
}
