//! Workbook reader: xlsx/xls/ods bytes → `Sheet` grids

use crate::error::{ReconError, ReconResult};
use crate::types::{CellValue, Sheet};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads bid returns and project estimates from disk.
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    /// Create a new importer for `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> ReconResult<Sheets<std::io::BufReader<std::fs::File>>> {
        open_workbook_auto(&self.path).map_err(|e| {
            ReconError::Workbook(format!("failed to open {}: {}", self.path.display(), e))
        })
    }

    pub fn sheet_names(&self) -> ReconResult<Vec<String>> {
        Ok(self.open()?.sheet_names())
    }

    /// Read one sheet by name.
    pub fn read_sheet(&self, name: &str) -> ReconResult<Sheet> {
        let mut workbook = self.open()?;
        if !workbook.sheet_names().iter().any(|n| n == name) {
            return Err(ReconError::SheetNotFound(name.to_string()));
        }
        let sheet = read_range(&mut workbook, name)?;
        info!(path = %self.path.display(), sheet = name, rows = sheet.rows.len(), "read sheet");
        Ok(sheet)
    }

    /// Read the named sheet, or the first one when `name` is `None`.
    pub fn read_sheet_or_first(&self, name: Option<&str>) -> ReconResult<Sheet> {
        match name {
            Some(name) => self.read_sheet(name),
            None => {
                let first = self
                    .sheet_names()?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ReconError::Workbook("workbook has no sheets".to_string()))?;
                self.read_sheet(&first)
            }
        }
    }

    /// Read every sheet in workbook order.
    pub fn read_all(&self) -> ReconResult<Vec<Sheet>> {
        read_all_sheets(&mut self.open()?)
    }
}

/// Read every sheet from in-memory workbook bytes (uploads, tests).
pub fn read_sheets_from_bytes(bytes: &[u8]) -> ReconResult<Vec<Sheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ReconError::Workbook(format!("unreadable workbook bytes: {}", e)))?;
    read_all_sheets(&mut workbook)
}

fn read_all_sheets<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> ReconResult<Vec<Sheet>> {
    let names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        sheets.push(read_range(workbook, &name)?);
    }
    Ok(sheets)
}

fn read_range<RS: Read + Seek>(workbook: &mut Sheets<RS>, name: &str) -> ReconResult<Sheet> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| ReconError::Workbook(format!("failed to read sheet '{}': {}", name, e)))?;
    Ok(range_to_sheet(name, &range))
}

/// Lay a calamine range out on absolute sheet coordinates.
///
/// Ranges start at the first used cell; leading rows and columns are padded
/// back so column keys match what the user sees in the spreadsheet.
fn range_to_sheet(name: &str, range: &Range<Data>) -> Sheet {
    if range.is_empty() {
        return Sheet::new(name, Vec::new());
    }
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![CellValue::Null; start_col];
        cells.extend(row.iter().map(convert_cell));
        while matches!(cells.last(), Some(CellValue::Null)) {
            cells.pop();
        }
        rows.push(cells);
    }
    Sheet::new(name, rows)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::Error(_) => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}
