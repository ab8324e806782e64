use std::collections::BTreeSet;

use super::model::{CellValue, ExperimentRow, ExperimentTable};
use crate::error::ParseError;
use crate::pipette::ChannelMode;

// ---------------------------------------------------------------------------
// Channel normalization
// ---------------------------------------------------------------------------

/// Reshape the design for the channel mode of the pipette that will run it.
///
/// * `Single` → the table is returned unchanged.
/// * `Multi` → rows are grouped by the column number of their destination
///   well; the first row per column wins and the rest are dropped. Surviving
///   rows have the destination and every listed source well rewritten to row
///   `A` of the same column, which is how an 8-channel head addresses a
///   column. `"NA"` sources are left alone.
pub fn normalize(
    table: &ExperimentTable,
    mode: ChannelMode,
    source_columns: &[&str],
    destination_column: &str,
) -> Result<ExperimentTable, ParseError> {
    if mode == ChannelMode::Single {
        return Ok(table.clone());
    }

    let mut seen_columns = BTreeSet::new();
    let mut rows = Vec::new();
    for row in &table.rows {
        let destination = row.well(destination_column)?;
        if !seen_columns.insert(destination.column) {
            continue;
        }
        let mut kept = row.clone();
        rewrite_to_column_head(&mut kept, destination_column)?;
        for column in source_columns {
            if !row.is_placeholder(column) {
                rewrite_to_column_head(&mut kept, column)?;
            }
        }
        rows.push(kept);
    }

    log::debug!(
        "multi-channel normalization on '{destination_column}': {} → {} rows",
        table.len(),
        rows.len()
    );
    Ok(table.with_rows(rows))
}

fn rewrite_to_column_head(row: &mut ExperimentRow, column: &str) -> Result<(), ParseError> {
    let head = row.well(column)?.column_head();
    row.values
        .insert(column.to_string(), CellValue::Text(head.to_string()));
    Ok(())
}

/// Drop every row in which any of the given source columns holds `"NA"`.
pub fn drop_placeholders(table: &ExperimentTable, source_columns: &[&str]) -> ExperimentTable {
    let rows: Vec<ExperimentRow> = table
        .rows
        .iter()
        .filter(|row| !source_columns.iter().any(|c| row.is_placeholder(c)))
        .cloned()
        .collect();
    table.with_rows(rows)
}

// ---------------------------------------------------------------------------
// Transfer planning
// ---------------------------------------------------------------------------

/// One source → destination movement of a single reactant.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStep {
    /// The design row the step came from (after normalization).
    pub row: ExperimentRow,
    pub source: String,
    pub destination: String,
    pub volume: f64,
}

/// Column names describing one reactant's movement.
#[derive(Debug, Clone, Copy)]
pub struct TransferColumns<'a> {
    pub source: &'a str,
    pub destination: &'a str,
    pub volume: &'a str,
}

/// Normalize for `mode`, drop placeholder rows and project the remaining
/// rows into transfer steps, in input order.
///
/// Deduplication runs before placeholder filtering: when the first row of a
/// column is `"NA"` for this reactant, the column is skipped entirely.
pub fn plan_transfers(
    table: &ExperimentTable,
    mode: ChannelMode,
    columns: TransferColumns<'_>,
) -> Result<Vec<TransferStep>, ParseError> {
    table.require_columns(&[columns.source, columns.destination, columns.volume])?;
    let normalized = normalize(table, mode, &[columns.source], columns.destination)?;
    let filtered = drop_placeholders(&normalized, &[columns.source]);

    filtered
        .rows
        .into_iter()
        .map(|row| {
            Ok(TransferStep {
                source: row.text(columns.source)?,
                destination: row.text(columns.destination)?,
                volume: row.number(columns.volume)?,
                row,
            })
        })
        .collect()
}
