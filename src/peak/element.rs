//! Chemical elements and emission shells.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const SYMBOLS: [&str; 98] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf",
];

/// An element, identified by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Element(u8);

impl Element {
    pub fn from_atomic_number(z: u8) -> Option<Self> {
        if z >= 1 && (z as usize) <= SYMBOLS.len() {
            Some(Self(z))
        } else {
            None
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        SYMBOLS
            .iter()
            .position(|s| s.eq_ignore_ascii_case(symbol))
            .map(|i| Self(i as u8 + 1))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize - 1]
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl TryFrom<String> for Element {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Element::from_symbol(&value)
            .ok_or_else(|| AppError::invalid_input(format!("Unknown element symbol '{value}'.")))
    }
}

impl From<Element> for String {
    fn from(value: Element) -> Self {
        value.symbol().to_string()
    }
}

/// Emission shell a transition series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shell {
    K,
    L,
    M,
}

impl Shell {
    pub fn label(self) -> &'static str {
        match self {
            Shell::K => "K",
            Shell::L => "L",
            Shell::M => "M",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "K" => Some(Shell::K),
            "L" => Some(Shell::L),
            "M" => Some(Shell::M),
            _ => None,
        }
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_lookup_round_trips() {
        let fe = Element::from_symbol("fe").unwrap();
        assert_eq!(fe.atomic_number(), 26);
        assert_eq!(fe.symbol(), "Fe");
        assert_eq!(Element::from_atomic_number(98).unwrap().symbol(), "Cf");
        assert!(Element::from_atomic_number(0).is_none());
        assert!(Element::from_symbol("Xx").is_none());
    }
}
