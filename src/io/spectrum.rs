//! Plain-text spectrum and peak-table input.
//!
//! Spectrum files are a flat list of channel counts separated by whitespace or
//! commas. Lines starting with `#` are comments. Counts must be finite and
//! non-negative; a file without any counts is reported as empty data.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;
use crate::peak::PeakTable;
use crate::spectrum::Spectrum;

pub fn read_spectrum(path: &Path) -> Result<Spectrum, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to read spectrum '{}': {e}", path.display())))?;
    parse_spectrum(&text)
}

pub fn parse_spectrum(text: &str) -> Result<Spectrum, AppError> {
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let value: f64 = token.parse().map_err(|_| {
                AppError::invalid_input(format!("Line {}: '{token}' is not a number.", line_no + 1))
            })?;
            if !(value.is_finite() && value >= 0.0) {
                return Err(AppError::invalid_input(format!(
                    "Line {}: counts must be finite and >= 0 (got {value}).",
                    line_no + 1
                )));
            }
            values.push(value);
        }
    }
    if values.is_empty() {
        return Err(AppError::empty_data("Spectrum contains no channels."));
    }
    Ok(Spectrum::new(values))
}

/// Load a peak-table JSON file.
pub fn read_peak_table(path: &Path) -> Result<PeakTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to open peak table '{}': {e}", path.display())))?;
    PeakTable::from_json_reader(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_separators_and_comments() {
        let s = parse_spectrum("# counts\n1 2, 3\n\n4.5,6\n").unwrap();
        assert_eq!(s.values(), &[1.0, 2.0, 3.0, 4.5, 6.0]);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_spectrum("1 x 3").unwrap_err().exit_code(), 2);
        assert_eq!(parse_spectrum("1 -2").unwrap_err().exit_code(), 2);
        assert_eq!(parse_spectrum("1 NaN").unwrap_err().exit_code(), 2);
        assert_eq!(parse_spectrum("# nothing\n").unwrap_err().exit_code(), 3);
    }
}
