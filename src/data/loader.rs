use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::{CellValue, ExperimentRow, ExperimentTable};
use crate::error::ParseError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an experiment-design table from a CSV file.
pub fn load_file(path: &Path) -> Result<ExperimentTable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading CSV file {}", path.display()))?;
    let table = parse_csv(&text).with_context(|| format!("parsing {}", path.display()))?;
    log::info!(
        "loaded {} design rows ({} columns) from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

/// Whether a column holds volumes and must therefore be numeric.
pub fn is_volume_column(name: &str) -> bool {
    name.contains("volume")
}

/// Parse the textual design table.
///
/// CSV layout: a header line naming the columns followed by data lines.
/// Blank lines before the header are skipped, since compiled protocols splice
/// the table in after a newline. Every column whose name contains `volume`
/// is parsed as a number; all other cells are kept verbatim.
pub fn parse_csv(text: &str) -> Result<ExperimentTable, ParseError> {
    let body = text.trim_start_matches(['\n', '\r']);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(ParseError::MissingHeader);
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let mut values = BTreeMap::new();
        for (column, raw) in columns.iter().zip(record.iter()) {
            values.insert(column.clone(), parse_cell(column, raw, line)?);
        }
        rows.push(ExperimentRow { line, values });
    }

    log::debug!("parsed {} rows with columns {:?}", rows.len(), columns);
    Ok(ExperimentTable::new(columns, rows))
}

fn parse_cell(column: &str, raw: &str, line: usize) -> Result<CellValue, ParseError> {
    if !is_volume_column(column) {
        return Ok(CellValue::Text(raw.to_string()));
    }
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(CellValue::Number)
        .ok_or_else(|| ParseError::NotANumber {
            row: line,
            column: column.to_string(),
            value: raw.to_string(),
        })
}
