//! Emission lines and transition series.
//!
//! A `TransitionSeries` is one candidate explanation for observed signal: either a
//! primary series from the peak table (e.g. the Fe K lines) or a composite built by
//! `summation`, modelling two photons detected as one (pileup / sum peaks).
//!
//! Equality and hashing look only at the multiset of base components (element +
//! shell), never at the line list. Series are used as keys in sets and maps all
//! through the proposal pipeline, and a composite rebuilt from its identifier must
//! compare equal to the one it was serialized from.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::AppError;
use crate::peak::element::{Element, Shell};

/// Composite lines weaker than this (relative to a unit-strength line) are dropped.
pub const MIN_COMPOSITE_INTENSITY: f64 = 0.005;

/// Upper bound on the number of lines carried by a composite series.
pub const MAX_COMPOSITE_TRANSITIONS: usize = 24;

/// Transitions at or above this relative intensity count as "significant".
pub const SIGNIFICANT_INTENSITY: f64 = 0.1;

/// A single emission line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    energy: f64,
    relative_intensity: f64,
}

impl Transition {
    /// Create a line at `energy` keV with relative intensity in `(0, 1]`.
    pub fn new(energy: f64, relative_intensity: f64) -> Result<Self, AppError> {
        if !(energy.is_finite() && energy > 0.0) {
            return Err(AppError::invalid_input(format!(
                "Transition energy must be finite and > 0 (got {energy})."
            )));
        }
        if !(relative_intensity.is_finite() && relative_intensity > 0.0 && relative_intensity <= 1.0) {
            return Err(AppError::invalid_input(format!(
                "Transition relative intensity must be in (0, 1] (got {relative_intensity})."
            )));
        }
        Ok(Self {
            energy,
            relative_intensity,
        })
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn relative_intensity(&self) -> f64 {
        self.relative_intensity
    }

    /// Line produced by detecting `self` and `other` simultaneously.
    pub fn summation(&self, other: &Transition) -> Transition {
        Transition {
            energy: self.energy + other.energy,
            relative_intensity: self.relative_intensity * other.relative_intensity,
        }
    }
}

/// Kind of series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesMode {
    /// A series straight from the peak table.
    Primary,
    /// A series summed with itself.
    Pileup,
    /// Two or more different series summed together.
    Summation,
}

/// Identity of a primary series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub element: Element,
    pub shell: Shell,
}

impl SeriesKey {
    pub fn new(element: Element, shell: Shell) -> Self {
        Self { element, shell }
    }

    /// Parse `"Fe:K"`.
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let Some((el, shell)) = text.trim().split_once(':') else {
            return Err(AppError::invalid_input(format!(
                "Invalid series component '{text}' (expected e.g. 'Fe:K')."
            )));
        };
        let element = Element::from_symbol(el)
            .ok_or_else(|| AppError::invalid_input(format!("Unknown element '{el}' in '{text}'.")))?;
        let shell = Shell::from_label(shell)
            .ok_or_else(|| AppError::invalid_input(format!("Unknown shell '{shell}' in '{text}'.")))?;
        Ok(Self { element, shell })
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.element, self.shell)
    }
}

/// A named group of emission lines treated as one candidate.
#[derive(Clone)]
pub struct TransitionSeries {
    /// Sorted base components; one entry for primary series.
    components: Arc<[SeriesKey]>,
    /// Lines sorted by energy.
    transitions: Arc<[Transition]>,
}

impl TransitionSeries {
    /// Build a primary series. Empty line lists are rejected here, before the
    /// series can reach a registry or fitting set.
    pub fn primary(element: Element, shell: Shell, mut transitions: Vec<Transition>) -> Result<Self, AppError> {
        if transitions.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Transition series {element}:{shell} has no transitions."
            )));
        }
        sort_by_energy(&mut transitions);
        Ok(Self {
            components: vec![SeriesKey::new(element, shell)].into(),
            transitions: transitions.into(),
        })
    }

    /// Composite of `self` and `other` (order does not matter for equality).
    pub fn summation(&self, other: &TransitionSeries) -> TransitionSeries {
        let mut components: Vec<SeriesKey> = self
            .components
            .iter()
            .chain(other.components.iter())
            .copied()
            .collect();
        components.sort();

        let mut lines: Vec<Transition> = Vec::with_capacity(self.transitions.len() * other.transitions.len());
        for a in self.transitions.iter() {
            for b in other.transitions.iter() {
                lines.push(a.summation(b));
            }
        }
        lines.sort_by(|a, b| {
            b.relative_intensity
                .partial_cmp(&a.relative_intensity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.energy.partial_cmp(&b.energy).unwrap_or(std::cmp::Ordering::Equal))
        });
        let strongest = lines.first().copied();
        lines.retain(|t| t.relative_intensity >= MIN_COMPOSITE_INTENSITY);
        lines.truncate(MAX_COMPOSITE_TRANSITIONS);
        if lines.is_empty() {
            lines.extend(strongest);
        }
        sort_by_energy(&mut lines);

        TransitionSeries {
            components: components.into(),
            transitions: lines.into(),
        }
    }

    /// Fold a list of series into one composite; `None` for an empty list.
    pub fn summation_all<'a>(series: impl IntoIterator<Item = &'a TransitionSeries>) -> Option<TransitionSeries> {
        let mut iter = series.into_iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, ts| acc.summation(ts)))
    }

    pub fn mode(&self) -> SeriesMode {
        match self.components.as_ref() {
            [_] => SeriesMode::Primary,
            [first, rest @ ..] if rest.iter().all(|c| c == first) => SeriesMode::Pileup,
            _ => SeriesMode::Summation,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.components.len() > 1
    }

    pub fn base_components(&self) -> &[SeriesKey] {
        &self.components
    }

    /// Element and shell of a primary series.
    pub fn key(&self) -> Option<SeriesKey> {
        match self.components.as_ref() {
            [key] => Some(*key),
            _ => None,
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn strongest_transition(&self) -> Option<Transition> {
        self.transitions.iter().copied().reduce(|best, t| {
            if t.relative_intensity > best.relative_intensity {
                t
            } else {
                best
            }
        })
    }

    /// Distance (keV) from `energy` to the nearest significant line.
    ///
    /// Falls back to the strongest line when no line reaches
    /// `SIGNIFICANT_INTENSITY`.
    pub fn proximity_to_energy(&self, energy: f64) -> f64 {
        let nearest = self
            .transitions
            .iter()
            .filter(|t| t.relative_intensity >= SIGNIFICANT_INTENSITY)
            .map(|t| (t.energy - energy).abs())
            .fold(f64::INFINITY, f64::min);
        if nearest.is_finite() {
            return nearest;
        }
        self.strongest_transition()
            .map(|t| (t.energy - energy).abs())
            .unwrap_or(f64::INFINITY)
    }

    /// Stable identifier, e.g. `Fe:K` or `Ca:K+Fe:K`.
    pub fn identifier(&self) -> String {
        self.components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn sort_by_energy(lines: &mut [Transition]) {
    lines.sort_by(|a, b| a.energy.partial_cmp(&b.energy).unwrap_or(std::cmp::Ordering::Equal));
}

impl PartialEq for TransitionSeries {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for TransitionSeries {}

impl std::hash::Hash for TransitionSeries {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl PartialOrd for TransitionSeries {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransitionSeries {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.components.cmp(&other.components)
    }
}

impl std::fmt::Display for TransitionSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.identifier())
    }
}

impl std::fmt::Debug for TransitionSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionSeries")
            .field("id", &self.identifier())
            .field("mode", &self.mode())
            .field("lines", &self.transitions.len())
            .finish()
    }
}

impl Serialize for TransitionSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn series(symbol: &str, lines: &[(f64, f64)]) -> TransitionSeries {
        let el = Element::from_symbol(symbol).unwrap();
        let t = lines.iter().map(|&(e, r)| Transition::new(e, r).unwrap()).collect();
        TransitionSeries::primary(el, Shell::K, t).unwrap()
    }

    #[test]
    fn empty_series_is_rejected() {
        let fe = Element::from_symbol("Fe").unwrap();
        assert!(TransitionSeries::primary(fe, Shell::K, vec![]).is_err());
    }

    #[test]
    fn transition_validation() {
        assert!(Transition::new(6.4, 0.0).is_err());
        assert!(Transition::new(6.4, 1.5).is_err());
        assert!(Transition::new(f64::NAN, 0.5).is_err());
        assert!(Transition::new(6.4, 1.0).is_ok());
    }

    #[test]
    fn summation_is_commutative_and_hashes_once() {
        let fe = series("Fe", &[(6.40, 1.0), (7.06, 0.15)]);
        let ca = series("Ca", &[(3.69, 1.0), (4.01, 0.13)]);
        let ab = fe.summation(&ca);
        let ba = ca.summation(&fe);
        assert_eq!(ab, ba);
        assert_eq!(ab.mode(), SeriesMode::Summation);

        let mut set = HashSet::new();
        set.insert(ab);
        set.insert(ba);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn pileup_mode_and_line_energies() {
        let fe = series("Fe", &[(6.40, 1.0), (7.06, 0.15)]);
        let pile = fe.summation(&fe);
        assert_eq!(pile.mode(), SeriesMode::Pileup);
        assert_ne!(pile, fe);
        let strongest = pile.strongest_transition().unwrap();
        assert!((strongest.energy() - 12.80).abs() < 1e-9);
        assert!((strongest.relative_intensity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_summation_stays_bounded() {
        let fe = series("Fe", &[(6.39, 0.51), (6.40, 1.0), (7.06, 0.15), (7.1, 0.02)]);
        let mut acc = fe.clone();
        for _ in 0..4 {
            acc = acc.summation(&acc);
            assert!(acc.transition_count() <= MAX_COMPOSITE_TRANSITIONS);
            assert!(acc.transition_count() >= 1);
        }
        assert_eq!(acc.base_components().len(), 16);
    }

    #[test]
    fn proximity_uses_significant_lines() {
        let fe = series("Fe", &[(6.40, 1.0), (7.06, 0.15), (8.0, 0.05)]);
        assert!((fe.proximity_to_energy(7.0) - 0.06).abs() < 1e-9);
        // the 8.0 keV line is too weak to count
        assert!((fe.proximity_to_energy(8.0) - 0.94).abs() < 1e-9);
    }

    #[test]
    fn identifier_lists_sorted_components() {
        let fe = series("Fe", &[(6.40, 1.0)]);
        let ca = series("Ca", &[(3.69, 1.0)]);
        assert_eq!(fe.identifier(), "Fe:K");
        assert_eq!(fe.summation(&ca).identifier(), "Ca:K+Fe:K");
        assert_eq!(SeriesKey::parse("fe:k").unwrap(), fe.key().unwrap());
        assert!(SeriesKey::parse("FeK").is_err());
    }
}
