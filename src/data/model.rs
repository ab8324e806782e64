use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Placeholder marking "this reactant does not apply to this row".
pub const PLACEHOLDER: &str = "NA";

// ---------------------------------------------------------------------------
// CellValue – a single cell of the design table
// ---------------------------------------------------------------------------

/// A cell of the experiment-design table.
///
/// Columns whose name contains `volume` hold numbers; everything else is kept
/// verbatim as text, including the [`PLACEHOLDER`] sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(v) => write!(f, "{v}"),
        }
    }
}

impl CellValue {
    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::Text(_) => None,
        }
    }

    /// Textual view of the cell, if it holds text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Number(_) => None,
        }
    }

    /// Whether the cell is the `"NA"` placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.as_str() == Some(PLACEHOLDER)
    }
}

// ---------------------------------------------------------------------------
// WellId – "C7" style well addressing
// ---------------------------------------------------------------------------

/// A well identifier: row letter(s) followed by a column number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellId {
    pub row: String,
    pub column: u32,
}

impl WellId {
    /// The topmost well of the same column, used to address a whole column
    /// with an 8-channel pipette.
    pub fn column_head(&self) -> WellId {
        WellId {
            row: "A".to_string(),
            column: self.column,
        }
    }
}

impl FromStr for WellId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ParseError::InvalidWell(s.to_string()))?;
        let (row, digits) = trimmed.split_at(split);
        if row.is_empty() || !row.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ParseError::InvalidWell(s.to_string()));
        }
        let column = digits
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidWell(s.to_string()))?;
        Ok(WellId {
            row: row.to_ascii_uppercase(),
            column,
        })
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

// ---------------------------------------------------------------------------
// ExperimentRow – one line of the design table
// ---------------------------------------------------------------------------

/// One row of the design table: column name → value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRow {
    /// Zero-based position of the row in the input.
    pub line: usize,
    pub values: BTreeMap<String, CellValue>,
}

impl ExperimentRow {
    pub fn get(&self, column: &str) -> Result<&CellValue, ParseError> {
        self.values
            .get(column)
            .ok_or_else(|| ParseError::MissingColumn(column.to_string()))
    }

    /// Text value of a column. Numbers are rendered back to text.
    pub fn text(&self, column: &str) -> Result<String, ParseError> {
        Ok(self.get(column)?.to_string())
    }

    /// Numeric value of a column.
    ///
    /// Volume columns are numeric from parsing; other columns (plate weights,
    /// for instance) are parsed on demand.
    pub fn number(&self, column: &str) -> Result<f64, ParseError> {
        match self.get(column)? {
            CellValue::Number(v) => Ok(*v),
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseError::NotANumber {
                    row: self.line,
                    column: column.to_string(),
                    value: s.clone(),
                }),
        }
    }

    /// Integer value of a location/index column.
    pub fn integer(&self, column: &str) -> Result<i64, ParseError> {
        let cell = self.get(column)?;
        let invalid = || ParseError::NotAnInteger {
            row: self.line,
            column: column.to_string(),
            value: cell.to_string(),
        };
        match cell {
            CellValue::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
            // i64::MAX as f64 rounds up to 2^63, hence the strict bound
            CellValue::Number(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
                Ok(*v as i64)
            }
            CellValue::Number(_) => Err(invalid()),
        }
    }

    pub fn well(&self, column: &str) -> Result<WellId, ParseError> {
        self.text(column)?.parse()
    }

    pub fn is_placeholder(&self, column: &str) -> bool {
        self.values
            .get(column)
            .is_some_and(CellValue::is_placeholder)
    }
}

// ---------------------------------------------------------------------------
// ExperimentTable – the parsed design
// ---------------------------------------------------------------------------

/// The parsed design table: header schema plus rows in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExperimentTable {
    /// Column names in header order.
    pub columns: Vec<String>,
    pub rows: Vec<ExperimentRow>,
}

impl ExperimentTable {
    pub fn new(columns: Vec<String>, rows: Vec<ExperimentRow>) -> Self {
        ExperimentTable { columns, rows }
    }

    /// A table with the same schema holding only the given rows.
    pub fn with_rows(&self, rows: Vec<ExperimentRow>) -> Self {
        ExperimentTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail unless every named column is present in the header.
    pub fn require_columns(&self, columns: &[&str]) -> Result<(), ParseError> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(ParseError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Every value of a numeric column, in row order.
    pub fn numbers(&self, column: &str) -> Result<Vec<f64>, ParseError> {
        self.rows.iter().map(|row| row.number(column)).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
