//! Peak detection on raw spectra.
//!
//! Searchers are pure detectors: they look only at channel intensities and never
//! consult the peak table or any fitting state. Both variants return channels
//! strongest first, which is the order the proposal pipeline processes them in.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::math::finite_or_zero;
use crate::spectrum::Spectrum;

/// Selectable searcher strategy (CLI / config level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SearcherKind {
    Derivative,
    LocalMaximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum PeakSearcher {
    /// Apexes of the smoothed first derivative, filtered by Poisson significance.
    Derivative {
        /// Half width of the moving-average smoothing window (channels).
        half_window: usize,
        /// Distance (channels) searched on each side for the peak's base.
        base_window: usize,
        /// Required prominence in units of `sqrt(height)`.
        significance: f64,
    },
    /// Raw local maxima above a threshold, at least `min_spacing` apart.
    LocalMaximum { threshold: f64, min_spacing: usize },
}

impl Default for PeakSearcher {
    fn default() -> Self {
        Self::derivative()
    }
}

impl PeakSearcher {
    pub fn derivative() -> Self {
        PeakSearcher::Derivative {
            half_window: 2,
            base_window: 24,
            significance: 3.0,
        }
    }

    pub fn local_maximum(threshold: f64) -> Self {
        PeakSearcher::LocalMaximum {
            threshold,
            min_spacing: 8,
        }
    }

    /// Default searcher for `kind`. The local-maximum threshold is relative to
    /// nothing, so callers usually pick one from the data.
    pub fn from_kind(kind: SearcherKind) -> Self {
        match kind {
            SearcherKind::Derivative => Self::derivative(),
            SearcherKind::LocalMaximum => Self::local_maximum(10.0),
        }
    }

    pub fn kind(&self) -> SearcherKind {
        match self {
            PeakSearcher::Derivative { .. } => SearcherKind::Derivative,
            PeakSearcher::LocalMaximum { .. } => SearcherKind::LocalMaximum,
        }
    }

    /// Channels of significant peaks, strongest first.
    pub fn search(&self, spectrum: &Spectrum) -> Vec<usize> {
        let values: Vec<f64> = spectrum.iter().map(finite_or_zero).collect();
        match *self {
            PeakSearcher::Derivative {
                half_window,
                base_window,
                significance,
            } => derivative_peaks(&values, half_window, base_window, significance),
            PeakSearcher::LocalMaximum { threshold, min_spacing } => {
                local_maxima(&values, threshold, min_spacing)
            }
        }
    }
}

fn moving_average(values: &[f64], half_window: usize) -> Vec<f64> {
    let n = values.len();
    let mut prefix = vec![0.0; n + 1];
    for (i, v) in values.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v;
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half_window);
            let hi = (i + half_window + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn derivative_peaks(values: &[f64], half_window: usize, base_window: usize, significance: f64) -> Vec<usize> {
    let n = values.len();
    if n < 3 {
        return Vec::new();
    }
    let smooth = moving_average(values, half_window);
    let slope: Vec<f64> = smooth.windows(2).map(|w| w[1] - w[0]).collect();

    let mut found: Vec<(usize, f64)> = Vec::new();
    for i in 1..slope.len() {
        if !(slope[i - 1] > 0.0 && slope[i] <= 0.0) {
            continue;
        }
        let height = smooth[i];
        let left = smooth[i.saturating_sub(base_window)..i]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let right = smooth[i + 1..(i + base_window + 1).min(n)]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let prominence = height - left.max(right);
        if !(prominence > 0.0 && prominence >= significance * height.max(1.0).sqrt()) {
            continue;
        }
        let apex = refine_apex(values, i, half_window);
        found.push((apex, values[apex]));
    }
    strongest_first(found)
}

/// Smoothing can shift an apex; snap to the raw maximum nearby.
fn refine_apex(values: &[f64], channel: usize, half_window: usize) -> usize {
    let lo = channel.saturating_sub(half_window);
    let hi = (channel + half_window + 1).min(values.len());
    let mut best = channel;
    for i in lo..hi {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

fn local_maxima(values: &[f64], threshold: f64, min_spacing: usize) -> Vec<usize> {
    let n = values.len();
    if n < 3 {
        return Vec::new();
    }
    let candidates: Vec<(usize, f64)> = (1..n - 1)
        .filter(|&i| values[i] > threshold && values[i] >= values[i - 1] && values[i] > values[i + 1])
        .map(|i| (i, values[i]))
        .collect();

    let mut kept: Vec<usize> = Vec::new();
    for channel in strongest_first(candidates) {
        if kept.iter().all(|&k| k.abs_diff(channel) >= min_spacing) {
            kept.push(channel);
        }
    }
    kept
}

fn strongest_first(mut peaks: Vec<(usize, f64)>) -> Vec<usize> {
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut out: Vec<usize> = Vec::with_capacity(peaks.len());
    for (channel, _) in peaks {
        if !out.contains(&channel) {
            out.push(channel);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(n: usize, centre: f64, sigma: f64, height: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let z = (i as f64 - centre) / sigma;
                height * (-0.5 * z * z).exp()
            })
            .collect()
    }

    fn add(a: &mut [f64], b: &[f64]) {
        for (x, y) in a.iter_mut().zip(b) {
            *x += y;
        }
    }

    #[test]
    fn derivative_finds_isolated_peak() {
        let mut data = vec![5.0; 1024];
        add(&mut data, &gaussian(1024, 412.0, 6.0, 800.0));
        let peaks = PeakSearcher::derivative().search(&Spectrum::new(data));
        assert_eq!(peaks.len(), 1, "{peaks:?}");
        assert!(peaks[0].abs_diff(412) <= 1);
    }

    #[test]
    fn derivative_orders_strongest_first_and_ignores_flat_data() {
        let mut data = vec![2.0; 1024];
        add(&mut data, &gaussian(1024, 200.0, 5.0, 150.0));
        add(&mut data, &gaussian(1024, 700.0, 5.0, 900.0));
        let peaks = PeakSearcher::derivative().search(&Spectrum::new(data));
        assert_eq!(peaks.len(), 2);
        assert!(peaks[0].abs_diff(700) <= 1);
        assert!(peaks[1].abs_diff(200) <= 1);

        assert!(PeakSearcher::derivative().search(&Spectrum::new(vec![3.0; 256])).is_empty());
        assert!(PeakSearcher::derivative().search(&Spectrum::zeros(2)).is_empty());
    }

    #[test]
    fn derivative_rejects_insignificant_bumps() {
        let mut data = vec![400.0; 512];
        // prominence 20 is below 3 * sqrt(420)
        add(&mut data, &gaussian(512, 256.0, 5.0, 20.0));
        assert!(PeakSearcher::derivative().search(&Spectrum::new(data)).is_empty());
    }

    #[test]
    fn local_maximum_respects_threshold_and_spacing() {
        let mut data = vec![0.0; 300];
        add(&mut data, &gaussian(300, 100.0, 2.0, 50.0));
        add(&mut data, &gaussian(300, 106.0, 2.0, 30.0));
        add(&mut data, &gaussian(300, 200.0, 2.0, 5.0));
        let searcher = PeakSearcher::LocalMaximum {
            threshold: 10.0,
            min_spacing: 8,
        };
        assert_eq!(searcher.search(&Spectrum::new(data)), vec![100]);
    }
}
