//! The peak table: registry of known primary transition series.
//!
//! The table is populated once (built-in lines or a JSON file) and then shared
//! read-only, typically behind an `Arc`, by every proposal run. It is never
//! mutated by the engine.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::peak::element::{Element, Shell};
use crate::peak::transition::{SeriesKey, Transition, TransitionSeries};

/// Relative intensities used for the built-in K lines (Kα1, Kα2, Kβ1).
const K_INTENSITIES: [f64; 3] = [1.0, 0.51, 0.15];

/// Relative intensities used for the built-in L lines (Lα1, Lβ1, Lγ1).
const L_INTENSITIES: [f64; 3] = [1.0, 0.7, 0.1];

/// Built-in K series: symbol, Kα1, Kα2, Kβ1 (keV).
const K_LINES: &[(&str, f64, f64, f64)] = &[
    ("Mg", 1.2536, 1.2536, 1.3022),
    ("Al", 1.4867, 1.4863, 1.5575),
    ("Si", 1.7400, 1.7394, 1.8359),
    ("P", 2.0137, 2.0127, 2.1391),
    ("S", 2.3078, 2.3066, 2.4640),
    ("Cl", 2.6224, 2.6208, 2.8156),
    ("Ar", 2.9577, 2.9556, 3.1905),
    ("K", 3.3138, 3.3111, 3.5896),
    ("Ca", 3.6917, 3.6881, 4.0127),
    ("Sc", 4.0906, 4.0861, 4.4605),
    ("Ti", 4.5108, 4.5049, 4.9318),
    ("V", 4.9522, 4.9446, 5.4273),
    ("Cr", 5.4147, 5.4055, 5.9467),
    ("Mn", 5.8988, 5.8877, 6.4905),
    ("Fe", 6.4038, 6.3908, 7.0580),
    ("Co", 6.9303, 6.9153, 7.6494),
    ("Ni", 7.4782, 7.4609, 8.2647),
    ("Cu", 8.0478, 8.0278, 8.9053),
    ("Zn", 8.6389, 8.6158, 9.5720),
    ("Ga", 9.2517, 9.2248, 10.2642),
    ("Ge", 9.8864, 9.8553, 10.9821),
    ("As", 10.5437, 10.5080, 11.7262),
    ("Se", 11.2224, 11.1814, 12.4959),
    ("Br", 11.9242, 11.8776, 13.2914),
    ("Rb", 13.3953, 13.3358, 14.9613),
    ("Sr", 14.1650, 14.0979, 15.8357),
    ("Y", 14.9584, 14.8829, 16.7378),
    ("Zr", 15.7751, 15.6909, 17.6678),
    ("Mo", 17.4793, 17.3743, 19.6083),
    ("Ag", 22.1629, 21.9903, 24.9424),
];

/// Built-in L series: symbol, Lα1, Lβ1, Lγ1 (keV).
const L_LINES: &[(&str, f64, f64, f64)] = &[
    ("Ag", 2.9843, 3.1509, 3.5204),
    ("Sn", 3.4440, 3.6628, 4.1310),
    ("Ba", 4.4663, 4.8275, 5.5311),
    ("W", 8.3976, 9.6724, 11.2859),
    ("Pt", 9.4423, 11.0707, 12.9420),
    ("Au", 9.7133, 11.4423, 13.3817),
    ("Hg", 9.9888, 11.8226, 13.8301),
    ("Pb", 10.5515, 12.6137, 14.7644),
];

/// One series as stored in a peak-table JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakTableEntry {
    pub element: Element,
    pub shell: Shell,
    pub transitions: Vec<LineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineEntry {
    pub energy: f64,
    pub intensity: f64,
}

/// Append-only registry of primary series.
#[derive(Debug, Clone, Default)]
pub struct PeakTable {
    series: Vec<TransitionSeries>,
}

impl PeakTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table of common K and L series.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let families = [(Shell::K, K_LINES, K_INTENSITIES), (Shell::L, L_LINES, L_INTENSITIES)];
        for (shell, lines, intensities) in families {
            for &(symbol, e1, e2, e3) in lines {
                let Some(element) = Element::from_symbol(symbol) else {
                    continue;
                };
                let transitions: Vec<Transition> = [e1, e2, e3]
                    .iter()
                    .zip(intensities.iter())
                    .filter_map(|(&e, &r)| Transition::new(e, r).ok())
                    .collect();
                if let Ok(ts) = TransitionSeries::primary(element, shell, transitions) {
                    // Built-in data has no duplicates or composites.
                    let _ = table.add_series(ts);
                }
            }
        }
        table
    }

    /// Build a table from parsed JSON entries.
    pub fn from_entries(entries: Vec<PeakTableEntry>) -> Result<Self, AppError> {
        let mut table = Self::new();
        for entry in entries {
            let transitions = entry
                .transitions
                .iter()
                .map(|l| Transition::new(l.energy, l.intensity))
                .collect::<Result<Vec<_>, _>>()?;
            let ts = TransitionSeries::primary(entry.element, entry.shell, transitions)?;
            table.add_series(ts)?;
        }
        Ok(table)
    }

    /// Read a peak-table JSON document (an array of `PeakTableEntry`).
    pub fn from_json_reader(reader: impl Read) -> Result<Self, AppError> {
        let entries: Vec<PeakTableEntry> = serde_json::from_reader(reader)
            .map_err(|e| AppError::invalid_input(format!("Invalid peak table JSON: {e}")))?;
        Self::from_entries(entries)
    }

    /// Append a primary series.
    ///
    /// Composite series are rejected; re-adding a known series is a no-op.
    pub fn add_series(&mut self, ts: TransitionSeries) -> Result<(), AppError> {
        if ts.is_composite() {
            return Err(AppError::invalid_input(format!(
                "Peak table only holds primary series (got {ts})."
            )));
        }
        if ts.transition_count() == 0 {
            return Err(AppError::invalid_input(format!("Transition series {ts} has no transitions.")));
        }
        if !self.series.contains(&ts) {
            self.series.push(ts);
        }
        Ok(())
    }

    pub fn all(&self) -> &[TransitionSeries] {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, element: Element, shell: Shell) -> Option<&TransitionSeries> {
        let key = SeriesKey::new(element, shell);
        self.series.iter().find(|ts| ts.key() == Some(key))
    }

    /// Rebuild a (possibly composite) series from its identifier string.
    pub fn from_identifier(&self, identifier: &str) -> Result<TransitionSeries, AppError> {
        let mut parts = Vec::new();
        for component in identifier.split('+') {
            let key = SeriesKey::parse(component)?;
            let ts = self.get(key.element, key.shell).ok_or_else(|| {
                AppError::invalid_input(format!("Series {key} is not in the peak table."))
            })?;
            parts.push(ts);
        }
        TransitionSeries::summation_all(parts)
            .ok_or_else(|| AppError::invalid_input("Empty transition series identifier."))
    }

    /// All series with their distance (keV) to `energy`, nearest first.
    pub fn nearest_to_energy(&self, energy: f64) -> Vec<(TransitionSeries, f64)> {
        let mut matches: Vec<(TransitionSeries, f64)> = self
            .series
            .iter()
            .map(|ts| (ts.clone(), ts.proximity_to_energy(energy)))
            .collect();
        matches.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe_k(table: &PeakTable) -> TransitionSeries {
        table
            .get(Element::from_symbol("Fe").unwrap(), Shell::K)
            .unwrap()
            .clone()
    }

    #[test]
    fn builtin_table_is_populated() {
        let table = PeakTable::builtin();
        assert_eq!(table.len(), K_LINES.len() + L_LINES.len());
        assert!(table.all().iter().all(|ts| ts.transition_count() > 0));
        assert_eq!(fe_k(&table).transition_count(), 3);
    }

    #[test]
    fn summations_of_registry_series_commute() {
        let table = PeakTable::builtin();
        let all = table.all();
        for a in all.iter().take(12) {
            for b in all.iter().skip(6).take(12) {
                assert_eq!(a.summation(b), b.summation(a));
            }
        }
    }

    #[test]
    fn identifier_round_trip_through_registry() {
        let table = PeakTable::builtin();
        let fe = fe_k(&table);
        let ca = table.get(Element::from_symbol("Ca").unwrap(), Shell::K).unwrap().clone();
        let composite = fe.summation(&ca).summation(&fe);
        let id = composite.identifier();
        assert_eq!(id, "Ca:K+Fe:K+Fe:K");

        let rebuilt = table.from_identifier(&id).unwrap();
        assert_eq!(rebuilt, composite);
        assert_eq!(rebuilt.mode(), composite.mode());
        assert_eq!(table.from_identifier("Fe:K").unwrap(), fe);
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let table = PeakTable::builtin();
        assert!(table.from_identifier("Xx:K").is_err());
        assert!(table.from_identifier("Fe:K+Fe:Q").is_err());
        assert!(table.from_identifier("Fe:M").is_err());
    }

    #[test]
    fn composites_and_empty_entries_are_rejected() {
        let mut table = PeakTable::builtin();
        let fe = fe_k(&table);
        assert!(table.add_series(fe.summation(&fe)).is_err());

        let before = table.len();
        table.add_series(fe).unwrap();
        assert_eq!(table.len(), before);

        let json = r#"[{"element":"Fe","shell":"K","transitions":[]}]"#;
        assert!(PeakTable::from_json_reader(json.as_bytes()).is_err());
    }

    #[test]
    fn json_table_loads() {
        let json = r#"[
            {"element":"Cu","shell":"K","transitions":[{"energy":8.048,"intensity":1.0},{"energy":8.905,"intensity":0.15}]},
            {"element":"Pb","shell":"L","transitions":[{"energy":10.55,"intensity":1.0}]}
        ]"#;
        let table = PeakTable::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let nearest = table.nearest_to_energy(10.5);
        assert_eq!(nearest[0].0.identifier(), "Pb:L");
    }
}
