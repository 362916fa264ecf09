use rayon::prelude::*;
use tracing::trace;

use crate::domain::SVError;
use crate::table::{CellValue, Table};

/// Search term plus the optional column the search is restricted to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterInput {
    pub search_term: String,
    pub category: Option<String>,
}

impl FilterInput {
    pub fn new(search_term: impl Into<String>, category: Option<String>) -> Self {
        Self {
            search_term: search_term.into(),
            category,
        }
    }
}

/// Literal, case-insensitive substring match. Absent values never match.
fn cell_matches(value: &CellValue, needle: &str) -> bool {
    match value.display() {
        Some(s) => s.to_lowercase().contains(needle),
        None => false,
    }
}

/// Returns the indices of all rows of `table` matching the search, in table order.
///
/// An empty term matches every row regardless of the category. A category that
/// is not a column of the table is an `UnknownCategory` error.
pub fn filter(
    table: &Table,
    search_term: &str,
    category: Option<&str>,
) -> Result<Vec<usize>, SVError> {
    if search_term.is_empty() {
        return Ok((0..table.nrows()).collect());
    }
    let needle = search_term.to_lowercase();

    // Resolve which columns take part in the search
    let positions: Vec<usize> = match category {
        Some(name) => {
            let positions = table.column_positions(name);
            if positions.is_empty() {
                return Err(SVError::UnknownCategory(name.to_string()));
            }
            positions
        }
        None => (0..table.columns().len()).collect(),
    };

    // Ordered collect keeps the row order of the table
    let matches: Vec<usize> = table
        .rows()
        .par_iter()
        .enumerate()
        .filter(|(_, row)| positions.iter().any(|&c| cell_matches(&row[c], &needle)))
        .map(|(ridx, _)| ridx)
        .collect();

    trace!(
        "Filter \"{}\" in {:?}: {} of {} rows",
        search_term,
        category,
        matches.len(),
        table.nrows()
    );
    Ok(matches)
}
