use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

/// Number of records shown per page unless configured otherwise.
pub const PAGE_SIZE: usize = 20;

pub const HELP_TEXT: &str = "\
sv - spreadsheet search & filter

  o        open a workbook
  s        select a sheet
  c        select the column to search in
  /        search (empty term shows all rows)
  r        reset search and column
  <- p     previous page
  -> n     next page
  ?        show this help
  Esc      close popup / cancel
  q        quit";

#[derive(Debug, Error)]
pub enum SVError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("no file selected")]
    FileNotSelected,
    #[error("no workbook loaded")]
    NoWorkbook,
    #[error("could not parse sheet: {0}")]
    ParseError(String),
    #[error("unknown sheet '{0}'")]
    UnknownSheet(String),
    #[error("column '{0}' not found")]
    UnknownCategory(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Setters)]
pub struct SVConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub max_column_width: usize,
    pub log_file: PathBuf,
    #[setters(strip_option)]
    pub path: Option<PathBuf>,
    #[setters(strip_option)]
    pub sheet: Option<String>,
    #[setters(strip_option)]
    pub category: Option<String>,
    #[setters(strip_option)]
    pub search: Option<String>,
}

impl Default for SVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: PAGE_SIZE,
            max_column_width: 30,
            log_file: PathBuf::from("sv.log"),
            path: None,
            sheet: None,
            category: None,
            search: None,
        }
    }
}

impl SVConfig {
    pub fn validate(self) -> Result<Self, SVError> {
        if self.page_size == 0 {
            return Err(SVError::InvalidConfig("page size must be at least 1".into()));
        }
        if self.max_column_width < 3 {
            return Err(SVError::InvalidConfig(
                "max column width must be at least 3".into(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    OpenFile,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickerKind {
    Sheet,
    Category,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    OpenFile,
    SelectSheet,
    SelectCategory,
    Search,
    Reset,
    PreviousPage,
    NextPage,
    MoveUp,
    MoveDown,
    Enter,
    Exit,
    Help,
    RawKey(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_twenty_rows_per_page() {
        let cfg = SVConfig::default().validate().unwrap();
        assert_eq!(cfg.page_size, 20);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let cfg = SVConfig::default().page_size(0usize);
        assert!(matches!(cfg.validate(), Err(SVError::InvalidConfig(_))));
    }

    #[test]
    fn setters_fill_optional_startup_choices() {
        let cfg = SVConfig::default()
            .sheet("Plan1".to_string())
            .category("NAME".to_string());
        assert_eq!(cfg.sheet.as_deref(), Some("Plan1"));
        assert_eq!(cfg.category.as_deref(), Some("NAME"));
        assert!(cfg.search.is_none());
    }
}
