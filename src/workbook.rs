use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Sheets, open_workbook_auto};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::SVError;
use crate::table::{CellValue, RawSheet};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    SPREADSHEET,
    CSV,
    PARQUET,
    ARROW,
}

/// Access to the sheets of an opened workbook.
pub trait SheetReader {
    /// Name shown to the user, usually the file name.
    fn name(&self) -> String;
    fn sheet_names(&self) -> &[String];
    fn parse_sheet(&mut self, name: &str) -> Result<RawSheet, SVError>;
}

enum Source {
    Spreadsheet(Sheets<BufReader<File>>),
    // Flat files hold exactly one sheet
    Frame(LazyFrame),
}

pub struct Workbook {
    path: PathBuf,
    sheet_names: Vec<String>,
    source: Source,
}

impl Workbook {
    pub fn open(path: PathBuf) -> Result<Self, SVError> {
        let file_type = Self::get_file_type(&path)?;
        let (sheet_names, source) = match file_type {
            FileType::SPREADSHEET => {
                let sheets = open_workbook_auto(&path)?;
                (sheets.sheet_names(), Source::Spreadsheet(sheets))
            }
            FileType::CSV => (vec![Self::stem(&path)], Source::Frame(Self::load_csv(&path)?)),
            FileType::PARQUET => (
                vec![Self::stem(&path)],
                Source::Frame(Self::load_parquet(&path)?),
            ),
            FileType::ARROW => (
                vec![Self::stem(&path)],
                Source::Frame(Self::load_arrow(&path)?),
            ),
        };
        info!(
            "Opened {:?} workbook {} with sheets {:?}",
            file_type,
            path.display(),
            sheet_names
        );
        Ok(Self {
            path,
            sheet_names,
            source,
        })
    }

    fn stem(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    fn get_file_type(path: &Path) -> Result<FileType, SVError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SVError::FileNotFound,
            ErrorKind::PermissionDenied => SVError::PermissionDenied,
            _ => SVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(SVError::LoadingFailed("Not a file!".into()));
        }
        Self::detect_file_type(path)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, SVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("XLSX") | Some("XLSM") | Some("XLS") | Some("XLSB") | Some("ODS") => {
                Ok(FileType::SPREADSHEET)
            }
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(SVError::UnknownFileType),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }

    fn convert_cell(data: &Data) -> CellValue {
        match data {
            Data::Empty => CellValue::Absent,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(d) => CellValue::Text(d.to_string()),
                None => CellValue::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }

    /// First row is the header, every following non blank row a record.
    fn sheet_from_range(range: &calamine::Range<Data>) -> RawSheet {
        let mut rows = range.rows();
        let columns: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(idx, cell)| match Self::convert_cell(cell).display() {
                    Some(name) if !name.trim().is_empty() => name.into_owned(),
                    _ => format!("Unnamed: {idx}"),
                })
                .collect(),
            None => Vec::new(),
        };

        let rows = rows
            .map(|row| row.iter().map(Self::convert_cell).collect::<Vec<CellValue>>())
            .filter(|row| !row.iter().all(CellValue::is_absent))
            .collect();

        RawSheet { columns, rows }
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<CellValue>, PolarsError> {
        let column = df.column(col_name)?;
        let dtype = column.dtype().clone();

        let data = if dtype.is_integer() {
            let col = column.cast(&DataType::Int64)?;
            col.i64()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Absent, CellValue::Int))
                .collect()
        } else if dtype.is_float() {
            let col = column.cast(&DataType::Float64)?;
            col.f64()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Absent, CellValue::Float))
                .collect()
        } else if dtype == DataType::Boolean {
            column
                .bool()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Absent, CellValue::Bool))
                .collect()
        } else {
            let col = column.cast(&DataType::String)?;
            col.str()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Absent, |s| CellValue::Text(s.to_string())))
                .collect()
        };
        Ok(data)
    }

    /// Converts a polars frame into rows. Each column is converted in its own thread.
    fn sheet_from_frame(df: &DataFrame) -> Result<RawSheet, PolarsError> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let data = columns
            .par_iter()
            .map(|name| Self::load_column(df, name))
            .collect::<Result<Vec<Vec<CellValue>>, _>>()?;

        let rows = (0..df.height())
            .map(|ridx| data.iter().map(|c| c[ridx].clone()).collect())
            .collect();

        Ok(RawSheet { columns, rows })
    }
}

impl SheetReader for Workbook {
    fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    fn parse_sheet(&mut self, name: &str) -> Result<RawSheet, SVError> {
        if !self.sheet_names.iter().any(|s| s == name) {
            return Err(SVError::UnknownSheet(name.to_string()));
        }
        let sheet = match &mut self.source {
            Source::Spreadsheet(sheets) => {
                let range = sheets
                    .worksheet_range(name)
                    .map_err(|e| SVError::ParseError(format!("sheet \"{name}\": {e}")))?;
                Self::sheet_from_range(&range)
            }
            Source::Frame(frame) => {
                let df = frame
                    .clone()
                    .collect()
                    .map_err(|e| SVError::ParseError(format!("sheet \"{name}\": {e}")))?;
                Self::sheet_from_frame(&df)
                    .map_err(|e| SVError::ParseError(format!("sheet \"{name}\": {e}")))?
            }
        };
        debug!(
            "Parsed sheet \"{}\" from {}: {} columns, {} rows",
            name,
            self.path.display(),
            sheet.columns.len(),
            sheet.rows.len()
        );
        Ok(sheet)
    }
}

/// Workbook held entirely in memory.
#[cfg(test)]
pub struct MemoryWorkbook {
    sheet_names: Vec<String>,
    sheets: Vec<Result<RawSheet, String>>,
}

#[cfg(test)]
impl MemoryWorkbook {
    pub fn new() -> Self {
        Self {
            sheet_names: Vec::new(),
            sheets: Vec::new(),
        }
    }

    pub fn with_sheet(mut self, name: &str, sheet: RawSheet) -> Self {
        self.sheet_names.push(name.to_string());
        self.sheets.push(Ok(sheet));
        self
    }

    pub fn with_broken_sheet(mut self, name: &str) -> Self {
        self.sheet_names.push(name.to_string());
        self.sheets.push(Err(format!("sheet {name} is corrupt")));
        self
    }
}

#[cfg(test)]
impl SheetReader for MemoryWorkbook {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    fn parse_sheet(&mut self, name: &str) -> Result<RawSheet, SVError> {
        let idx = self
            .sheet_names
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| SVError::UnknownSheet(name.to_string()))?;
        self.sheets[idx].clone().map_err(SVError::ParseError)
    }
}
