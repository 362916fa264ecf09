use std::borrow::Cow;
use std::fmt;

use tracing::{debug, warn};

use crate::domain::SVError;

/// A single spreadsheet cell as read from the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Absent,
}

impl CellValue {
    /// Textual form of the value as a spreadsheet shows it. `None` for absent cells.
    pub fn display(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::Int(i) => Some(Cow::Owned(i.to_string())),
            CellValue::Float(f) => Some(Cow::Owned(f.to_string())),
            CellValue::Bool(true) => Some(Cow::Borrowed("TRUE")),
            CellValue::Bool(false) => Some(Cow::Borrowed("FALSE")),
            CellValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display() {
            Some(s) => f.write_str(&s),
            None => f.write_str("∅"),
        }
    }
}

/// Sheet data as handed over by a workbook reader, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// One record. Values are positional, indexed like `Table::columns`.
pub type Row = Vec<CellValue>;

/// Normalized in-memory representation of a single sheet.
///
/// Built once per sheet and never mutated afterwards. Every row holds exactly
/// one value per column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Normalizes a parsed sheet. Column names are trimmed and upper-cased,
    /// rows are padded or cut to the column count.
    pub fn from_raw(name: impl Into<String>, raw: RawSheet) -> Self {
        let columns: Vec<String> = raw
            .columns
            .iter()
            .map(|c| Self::normalize_column_name(c))
            .collect();
        let ncols = columns.len();

        let rows = raw
            .rows
            .into_iter()
            .map(|mut row| {
                row.resize(ncols, CellValue::Absent);
                row
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn normalize_column_name(name: &str) -> String {
        name.trim().to_uppercase()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Positions of all columns carrying the given (normalized) name.
    pub fn column_positions(&self, name: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == name)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Turns the result of a sheet parse into a Table.
///
/// A failed parse degrades to an empty table, returned together with the
/// parse error so the caller can report it.
pub fn load_sheet(name: &str, parsed: Result<RawSheet, SVError>) -> (Table, Option<SVError>) {
    match parsed {
        Ok(raw) => {
            let table = Table::from_raw(name, raw);
            debug!(
                "Loaded sheet \"{}\": {} columns, {} rows",
                name,
                table.columns.len(),
                table.rows.len()
            );
            (table, None)
        }
        Err(e) => {
            warn!("Failed to parse sheet \"{name}\": {e}");
            let e = match e {
                e @ SVError::ParseError(_) => e,
                e => SVError::ParseError(format!("sheet \"{name}\": {e}")),
            };
            (Table::empty(name), Some(e))
        }
    }
}

/// Column names offered as filter targets, in column order.
///
/// Columns that normalize to the same name appear once.
pub fn categories_of(table: &Table) -> Vec<String> {
    let mut categories: Vec<String> = Vec::with_capacity(table.columns.len());
    for column in table.columns.iter() {
        if !categories.contains(column) {
            categories.push(column.clone());
        }
    }
    categories
}
