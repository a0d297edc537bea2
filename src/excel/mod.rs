//! Excel boundary for the reconciliation engine
//!
//! - Import: workbook bytes (.xlsx/.xls/.ods) → `Sheet` grids
//! - Export: comparison matrix → .xlsx with live formulas and conditional formatting

mod exporter;
mod importer;

pub use exporter::{
    build_layout, cell_ref, CellSpec, ColumnSpec, ConditionalRule, ExcelExporter, ExportOptions,
    ExportPalette, NumberStyle, RuleStyle, WorkbookLayout, BASE_COLUMNS, COLUMNS_PER_COMPANY,
};
pub use importer::{read_sheets_from_bytes, ExcelImporter};
