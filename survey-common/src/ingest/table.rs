//! Tabular upload readers
//!
//! Uploads are either CSV text or a spreadsheet workbook (xlsx/xls/ods).
//! Both are read into a [`Table`]: a header row of column names plus data
//! rows of loosely typed [`Cell`]s. Typing is left to the normalizer.

use super::IngestError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Text cell, or `Empty` if the text is blank
    pub fn text(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

/// Data row with its 1-based line in the source sheet (header is line 1)
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub line: usize,
    pub cells: Vec<Cell>,
}

/// Header + data rows of an uploaded sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

static EMPTY_CELL: Cell = Cell::Empty;

/// Reader selected for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Workbook,
}

const WORKBOOK_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/zip",
    "application/x-ole-storage",
];

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

impl UploadFormat {
    /// Sniff the content first, then fall back to the file extension
    pub fn detect(file_name: Option<&str>, bytes: &[u8]) -> Self {
        if let Some(kind) = infer::get(bytes) {
            if WORKBOOK_MIME_TYPES.contains(&kind.mime_type()) {
                return UploadFormat::Workbook;
            }
        }

        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) => UploadFormat::Workbook,
            _ => UploadFormat::Csv,
        }
    }
}

impl Table {
    /// Build a table from in-memory rows; row `i` is given line `i + 2`
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| TableRow { line: i + 2, cells })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Position of a column; the first occurrence wins for duplicate headers
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Parse an upload using the detected reader
    pub fn from_upload(file_name: Option<&str>, bytes: &[u8]) -> Result<Self, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::Format("file is empty".to_string()));
        }

        let format = UploadFormat::detect(file_name, bytes);
        debug!(?format, size = bytes.len(), "Reading upload");
        match format {
            UploadFormat::Csv => Self::from_csv(bytes),
            UploadFormat::Workbook => Self::from_workbook(bytes),
        }
    }

    /// Read comma-separated text with a header row
    pub fn from_csv(bytes: &[u8]) -> Result<Self, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| IngestError::Format(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        check_header(&columns)?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| IngestError::Format(e.to_string()))?;
            // Quoted fields may span lines, so the record index is not the line
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 2);
            let cells: Vec<Cell> = record.iter().map(Cell::text).collect();
            push_row(&mut rows, line, cells);
        }

        Ok(Self { columns, rows })
    }

    /// Read the first worksheet of an xlsx/xls/ods workbook
    pub fn from_workbook(bytes: &[u8]) -> Result<Self, IngestError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| IngestError::Format(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| IngestError::Format("workbook has no worksheets".to_string()))?
            .map_err(|e| IngestError::Format(e.to_string()))?;

        let mut sheet_rows = range.rows();
        let columns: Vec<String> = sheet_rows
            .next()
            .map(|header| header.iter().map(header_name).collect())
            .unwrap_or_default();
        check_header(&columns)?;

        // Range starts at the first used cell, not necessarily row 1
        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

        let mut rows = Vec::new();
        for (i, data_row) in sheet_rows.enumerate() {
            let cells: Vec<Cell> = data_row.iter().map(workbook_cell).collect();
            push_row(&mut rows, first_line + i + 1, cells);
        }

        Ok(Self { columns, rows })
    }
}

fn check_header(columns: &[String]) -> Result<(), IngestError> {
    if columns.iter().all(|c| c.is_empty()) {
        return Err(IngestError::Format("no header row found".to_string()));
    }
    Ok(())
}

/// Blank lines are skipped
fn push_row(rows: &mut Vec<TableRow>, line: usize, cells: Vec<Cell>) {
    if cells.iter().all(Cell::is_empty) {
        return;
    }
    rows.push(TableRow { line, cells });
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn workbook_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::text(s),
        other => Cell::text(&other.to_string()),
    }
}

impl TableRow {
    /// Cell at `index`, `Empty` for short rows
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}
