use std::path::PathBuf;

use tracing::{info, instrument, trace, warn};

use crate::domain::{PAGE_SIZE, SVError};
use crate::filter::{FilterInput, filter};
use crate::paginator::{last_page_index, paginate};
use crate::table::{Row, Table, categories_of, load_sheet};
use crate::workbook::{SheetReader, Workbook};

/// Snapshot handed to the renderer. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub workbook: Option<String>,
    pub sheets: Vec<String>,
    pub sheet: String,
    pub columns: Vec<String>,
    pub page_rows: Vec<Row>,
    /// Table index of every row in `page_rows`
    pub page_row_indices: Vec<usize>,
    pub page_index: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub nmatches: usize,
    pub nrows: usize,
    pub categories: Vec<String>,
    pub filter: FilterInput,
    pub notice: Option<String>,
}

/// Owner of the currently loaded workbook, sheet, filter and page.
///
/// Every user action goes through exactly one method and leaves the session
/// in a consistent state.
pub struct Session {
    workbook: Option<Box<dyn SheetReader>>,
    table: Table,
    categories: Vec<String>,
    filter: FilterInput,
    /// Rows matching `filter`, refreshed whenever the table or filter changes
    matches: Vec<usize>,
    notice: Option<String>,
    page_index: usize,
    page_size: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Session {
    pub fn new(page_size: usize) -> Self {
        Self {
            workbook: None,
            table: Table::default(),
            categories: Vec::new(),
            filter: FilterInput::default(),
            matches: Vec::new(),
            notice: None,
            page_index: 0,
            page_size: std::cmp::max(1, page_size),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn filter_input(&self) -> &FilterInput {
        &self.filter
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn has_workbook(&self) -> bool {
        self.workbook.is_some()
    }

    pub fn workbook_name(&self) -> Option<String> {
        self.workbook.as_ref().map(|wb| wb.name())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook
            .as_ref()
            .map(|wb| wb.sheet_names().to_vec())
            .unwrap_or_default()
    }

    /// Opens the file picked by the user. `None` means the selection was
    /// cancelled and leaves everything as it is.
    #[instrument(skip(self))]
    pub fn open_workbook(&mut self, selection: Option<PathBuf>) -> Result<(), SVError> {
        let path = selection.ok_or(SVError::FileNotSelected)?;
        let workbook = Workbook::open(path)?;
        self.attach_workbook(Box::new(workbook))
    }

    /// Replaces the current workbook and shows its first sheet. The workbook
    /// stays attached when that sheet fails to parse.
    pub fn attach_workbook(&mut self, workbook: Box<dyn SheetReader>) -> Result<(), SVError> {
        info!(
            "Using workbook {} with {} sheets",
            workbook.name(),
            workbook.sheet_names().len()
        );
        let first_sheet = workbook.sheet_names().first().cloned();
        self.workbook = Some(workbook);
        match first_sheet {
            Some(name) => self.select_sheet(&name),
            None => {
                self.replace_table(Table::default());
                Ok(())
            }
        }
    }

    /// Loads the named sheet. A sheet that fails to parse is shown as an
    /// empty table and its parse error is returned.
    #[instrument(skip(self))]
    pub fn select_sheet(&mut self, name: &str) -> Result<(), SVError> {
        let workbook = self.workbook.as_mut().ok_or(SVError::NoWorkbook)?;
        if !workbook.sheet_names().iter().any(|s| s == name) {
            return Err(SVError::UnknownSheet(name.to_string()));
        }
        let (table, failure) = load_sheet(name, workbook.parse_sheet(name));
        if failure.is_none() && table.is_empty() {
            warn!("Sheet \"{name}\" has no data");
        }
        info!(
            "Selected sheet \"{}\" with {} rows",
            table.name(),
            table.nrows()
        );
        self.replace_table(table);
        failure.map_or(Ok(()), Err)
    }

    fn replace_table(&mut self, table: Table) {
        self.table = table;
        self.categories = categories_of(&self.table);
        if let Some(category) = &self.filter.category
            && !self.categories.contains(category)
        {
            trace!("Dropping category {category} missing in new sheet");
            self.filter.category = None;
        }
        self.filter.search_term.clear();
        self.page_index = 0;
        self.refilter();
    }

    pub fn search(&mut self, term: &str) {
        let input = FilterInput::new(term, self.filter.category.clone());
        self.apply_filter(input);
    }

    /// Sets the column searched in. `None` searches all columns.
    pub fn select_category(&mut self, category: Option<String>) {
        let category = category.map(|c| Table::normalize_column_name(&c));
        let input = FilterInput::new(self.filter.search_term.clone(), category);
        self.apply_filter(input);
    }

    pub fn reset_filter(&mut self) {
        self.apply_filter(FilterInput::default());
    }

    #[instrument(skip(self))]
    pub fn apply_filter(&mut self, input: FilterInput) {
        self.filter = FilterInput::new(input.search_term.trim(), input.category);
        self.refilter();
        let nmatches = self.matches.len();
        self.page_index = std::cmp::min(
            self.page_index,
            last_page_index(nmatches, self.page_size),
        );
        info!(
            "Filter {:?}: {} of {} rows match",
            self.filter,
            nmatches,
            self.table.nrows()
        );
    }

    pub fn previous_page(&mut self) {
        if self.page_index > 0 {
            self.page_index -= 1;
        }
    }

    // Not clamped, moving past the last page shows an empty page
    pub fn next_page(&mut self) {
        self.page_index += 1;
    }

    /// Runs the filter for the current table and input. A filter that cannot
    /// be applied matches nothing and leaves a notice for the status line.
    fn refilter(&mut self) {
        match filter(
            &self.table,
            &self.filter.search_term,
            self.filter.category.as_deref(),
        ) {
            Ok(rows) => {
                self.matches = rows;
                self.notice = None;
            }
            Err(e) => {
                warn!("Filter failed: {e}");
                self.matches = Vec::new();
                self.notice = Some(e.to_string());
            }
        }
    }

    pub fn view_state(&self) -> ViewState {
        let page = paginate(&self.matches, self.page_index, self.page_size);
        let rows = self.table.rows();

        ViewState {
            workbook: self.workbook_name(),
            sheets: self.sheet_names(),
            sheet: self.table.name().to_string(),
            columns: self.table.columns().to_vec(),
            page_rows: page.rows.iter().map(|&ridx| rows[ridx].clone()).collect(),
            page_row_indices: page.rows.to_vec(),
            page_index: self.page_index,
            page_size: self.page_size,
            total_pages: page.display_pages(),
            has_prev: page.has_prev,
            has_next: page.has_next,
            nmatches: self.matches.len(),
            nrows: self.table.nrows(),
            categories: self.categories.clone(),
            filter: self.filter.clone(),
            notice: self.notice.clone(),
        }
    }
}
