//! Comparison matrix → xlsx with live formulas
//!
//! Export runs in two steps. [`build_layout`] turns the aggregated rows into a
//! [`WorkbookLayout`]: plain data describing every header, cell and
//! conditional-format rule. Derived values in that layout are formulas over
//! sibling cells of the same row. [`ExcelExporter`] then writes the layout
//! with rust_xlsxwriter.
//!
//! Sheet layout (header on row 1, one line item per row below):
//!
//! | A | B | C | D | E | F | G | H | I | J |
//! |---|---|---|---|---|---|---|---|---|---|
//! | code | description | unit | project qty | project price | project total | mean | min | max | stddev |
//!
//! followed by six columns per company-round: quantity, quantity delta,
//! unit price, total, delta vs project, delta vs mean.

use crate::core::profiler::column_key;
use crate::error::{ReconError, ReconResult};
use crate::types::{CompanyComparison, CompanyRoundIdentity, ComparisonRow};
use rust_xlsxwriter::{
    ConditionalFormatFormula, Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Leading columns before the first company group.
pub const BASE_COLUMNS: usize = 10;
/// Columns emitted per company-round.
pub const COLUMNS_PER_COMPANY: usize = 6;

const COL_PROJECT_QTY: usize = 3;
const COL_PROJECT_PRICE: usize = 4;
const COL_PROJECT_TOTAL: usize = 5;
const COL_MEAN: usize = 6;

// Offsets inside a company group
const OFF_QTY: usize = 0;
const OFF_QTY_DELTA: usize = 1;
const OFF_PRICE: usize = 2;
const OFF_TOTAL: usize = 3;
const OFF_DELTA_PROJECT: usize = 4;
const OFF_DELTA_MEAN: usize = 5;

//==============================================================================
// Options
//==============================================================================

/// Fills and fonts used by the exported sheet. Colors are `#RRGGBB`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPalette {
    pub header: String,
    /// Header fill per company group, repeating when there are more companies.
    pub companies: Vec<String>,
    pub better: String,
    pub worse: String,
    pub positive_font: String,
    pub negative_font: String,
    pub quantity_highlight: String,
}

impl Default for ExportPalette {
    fn default() -> Self {
        Self {
            header: "#D9D9D9".to_string(),
            companies: vec![
                "#DDEBF7".to_string(),
                "#FCE4D6".to_string(),
                "#E2EFDA".to_string(),
                "#FFF2CC".to_string(),
                "#EDE2F6".to_string(),
            ],
            better: "#C6EFCE".to_string(),
            worse: "#FFC7CE".to_string(),
            positive_font: "#9C0006".to_string(),
            negative_font: "#006100".to_string(),
            quantity_highlight: "#FFEB9C".to_string(),
        }
    }
}

impl ExportPalette {
    pub fn company_color(&self, index: usize) -> &str {
        if self.companies.is_empty() {
            return &self.header;
        }
        &self.companies[index % self.companies.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub sheet_name: String,
    pub palette: ExportPalette,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sheet_name: "Comparison".to_string(),
            palette: ExportPalette::default(),
        }
    }
}

//==============================================================================
// Layout description
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    Text,
    Quantity,
    Currency,
    Percent,
}

impl NumberStyle {
    fn num_format(self) -> Option<&'static str> {
        match self {
            NumberStyle::Text => None,
            NumberStyle::Quantity => Some("#,##0.00"),
            NumberStyle::Currency => Some("#,##0.00 €"),
            NumberStyle::Percent => Some("0.00%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub header: String,
    pub width: f64,
    pub style: NumberStyle,
    /// Index into the company list for company-group columns.
    pub company: Option<usize>,
}

/// A cell's content. Formulas are stored without the leading `=`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellSpec {
    Blank,
    Text(String),
    Number(f64),
    Formula(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStyle {
    BetterFill,
    WorseFill,
    PositiveFont,
    NegativeFont,
    QuantityHighlight,
}

/// Formula-driven conditional format over one column of data rows.
///
/// `formula` is written relative to `first_row`, as spreadsheets expect.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    pub first_row: usize,
    pub last_row: usize,
    pub col: usize,
    pub formula: String,
    pub style: RuleStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookLayout {
    pub sheet_name: String,
    pub columns: Vec<ColumnSpec>,
    /// Data rows only; the header row comes from `columns`.
    pub rows: Vec<Vec<CellSpec>>,
    pub rules: Vec<ConditionalRule>,
    pub palette: ExportPalette,
}

impl WorkbookLayout {
    pub fn last_row(&self) -> usize {
        self.rows.len()
    }

    pub fn last_col(&self) -> usize {
        self.columns.len().saturating_sub(1)
    }
}

/// A1 reference for zero-based sheet coordinates.
pub fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", column_key(col), row + 1)
}

/// A1 reference with the column pinned (`$E2`).
fn pinned_col_ref(row: usize, col: usize) -> String {
    format!("${}{}", column_key(col), row + 1)
}

fn company_col(company: usize, offset: usize) -> usize {
    BASE_COLUMNS + company * COLUMNS_PER_COMPANY + offset
}

fn number_or_blank(value: Option<f64>) -> CellSpec {
    value.map(CellSpec::Number).unwrap_or(CellSpec::Blank)
}

fn text_or_blank(value: Option<&str>) -> CellSpec {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => CellSpec::Text(v.to_string()),
        _ => CellSpec::Blank,
    }
}

fn base_columns() -> Vec<ColumnSpec> {
    let spec = |header: &str, width: f64, style: NumberStyle| ColumnSpec {
        header: header.to_string(),
        width,
        style,
        company: None,
    };
    vec![
        spec("Code", 14.0, NumberStyle::Text),
        spec("Description", 48.0, NumberStyle::Text),
        spec("Unit", 8.0, NumberStyle::Text),
        spec("Project Qty", 12.0, NumberStyle::Quantity),
        spec("Project Price", 14.0, NumberStyle::Currency),
        spec("Project Total", 16.0, NumberStyle::Currency),
        spec("Mean Price", 14.0, NumberStyle::Currency),
        spec("Min Price", 14.0, NumberStyle::Currency),
        spec("Max Price", 14.0, NumberStyle::Currency),
        spec("Std Dev", 12.0, NumberStyle::Currency),
    ]
}

fn company_columns(index: usize, identity: &CompanyRoundIdentity) -> Vec<ColumnSpec> {
    let name = &identity.company_name;
    let spec = |suffix: &str, width: f64, style: NumberStyle| ColumnSpec {
        header: format!("{} - {}", name, suffix),
        width,
        style,
        company: Some(index),
    };
    vec![
        spec("Qty", 12.0, NumberStyle::Quantity),
        spec("Qty Delta", 12.0, NumberStyle::Quantity),
        spec("Unit Price", 14.0, NumberStyle::Currency),
        spec("Total", 16.0, NumberStyle::Currency),
        spec("Δ vs Project", 13.0, NumberStyle::Percent),
        spec("Δ vs Mean", 13.0, NumberStyle::Percent),
    ]
}

/// Row statistics over the company price cells, blank when no company priced the row.
fn stats_formulas(row: usize, companies: usize) -> [CellSpec; 4] {
    if companies == 0 {
        return [CellSpec::Blank, CellSpec::Blank, CellSpec::Blank, CellSpec::Blank];
    }
    let prices = (0..companies)
        .map(|c| cell_ref(row, company_col(c, OFF_PRICE)))
        .collect::<Vec<_>>()
        .join(",");
    let guarded = |function: &str| {
        CellSpec::Formula(format!(
            "IF(COUNT({p})=0,\"\",{f}({p}))",
            p = prices,
            f = function
        ))
    };
    [
        guarded("AVERAGE"),
        guarded("MIN"),
        guarded("MAX"),
        // Population variant; the `_xlfn.` prefix keeps the name locale- and version-stable.
        guarded("_xlfn.STDEV.P"),
    ]
}

fn company_cells(row: usize, company: usize, figures: &CompanyComparison) -> Vec<CellSpec> {
    let qty = cell_ref(row, company_col(company, OFF_QTY));
    let price = cell_ref(row, company_col(company, OFF_PRICE));
    let project_qty = cell_ref(row, COL_PROJECT_QTY);
    let project_price = cell_ref(row, COL_PROJECT_PRICE);
    let mean = cell_ref(row, COL_MEAN);

    vec![
        number_or_blank(figures.quantity),
        CellSpec::Formula(format!(
            "IF(AND(ISNUMBER({q}),ISNUMBER({pq})),{q}-{pq},\"\")",
            q = qty,
            pq = project_qty
        )),
        number_or_blank(figures.unit_price),
        CellSpec::Formula(format!(
            "IF(AND(ISNUMBER({q}),ISNUMBER({p})),{q}*{p},\"\")",
            q = qty,
            p = price
        )),
        CellSpec::Formula(format!(
            "IF(AND(ISNUMBER({p}),ISNUMBER({r})),IF({r}<>0,({p}-{r})/{r},\"\"),\"\")",
            p = price,
            r = project_price
        )),
        CellSpec::Formula(format!(
            "IF(AND(ISNUMBER({p}),ISNUMBER({m})),IF(ABS({m})>1E-9,({p}-{m})/{m},\"\"),\"\")",
            p = price,
            m = mean
        )),
    ]
}

fn company_rules(company: usize, first_row: usize, last_row: usize) -> Vec<ConditionalRule> {
    let rule = |offset: usize, formula: String, style: RuleStyle| ConditionalRule {
        first_row,
        last_row,
        col: company_col(company, offset),
        formula,
        style,
    };
    let own = |offset: usize| cell_ref(first_row, company_col(company, offset));
    let project_price = pinned_col_ref(first_row, COL_PROJECT_PRICE);
    let project_total = pinned_col_ref(first_row, COL_PROJECT_TOTAL);

    let compare = |offset: usize, reference: &str, op: &str| {
        let c = own(offset);
        format!(
            "AND(ISNUMBER({c}),ISNUMBER({r}),{c}{op}{r})",
            c = c,
            r = reference,
            op = op
        )
    };
    let sign = |offset: usize, op: &str| {
        let c = own(offset);
        format!("AND(ISNUMBER({c}),{c}{op}0)", c = c, op = op)
    };

    let qty_delta = own(OFF_QTY_DELTA);
    vec![
        rule(OFF_PRICE, compare(OFF_PRICE, &project_price, "<"), RuleStyle::BetterFill),
        rule(OFF_PRICE, compare(OFF_PRICE, &project_price, ">"), RuleStyle::WorseFill),
        rule(OFF_TOTAL, compare(OFF_TOTAL, &project_total, "<"), RuleStyle::BetterFill),
        rule(OFF_TOTAL, compare(OFF_TOTAL, &project_total, ">"), RuleStyle::WorseFill),
        rule(OFF_DELTA_PROJECT, sign(OFF_DELTA_PROJECT, ">"), RuleStyle::PositiveFont),
        rule(OFF_DELTA_PROJECT, sign(OFF_DELTA_PROJECT, "<"), RuleStyle::NegativeFont),
        rule(OFF_DELTA_MEAN, sign(OFF_DELTA_MEAN, ">"), RuleStyle::PositiveFont),
        rule(OFF_DELTA_MEAN, sign(OFF_DELTA_MEAN, "<"), RuleStyle::NegativeFont),
        rule(
            OFF_QTY_DELTA,
            format!("AND(ISNUMBER({q}),ABS({q})>1E-6)", q = qty_delta),
            RuleStyle::QuantityHighlight,
        ),
    ]
}

/// Describe the export of an aggregated matrix.
///
/// `companies` must be the identities the rows were aggregated with, in the same order.
pub fn build_layout(
    rows: &[ComparisonRow<'_>],
    companies: &[CompanyRoundIdentity],
    options: &ExportOptions,
) -> WorkbookLayout {
    let mut columns = base_columns();
    for (idx, identity) in companies.iter().enumerate() {
        columns.extend(company_columns(idx, identity));
    }

    let mut data = Vec::with_capacity(rows.len());
    for (offset, row) in rows.iter().enumerate() {
        let r = offset + 1;
        let item = row.item;
        let mut cells = vec![
            CellSpec::Text(item.code.clone()),
            CellSpec::Text(item.description.clone()),
            text_or_blank(item.unit_of_measure.as_deref()),
            number_or_blank(item.project_quantity),
            number_or_blank(item.project_unit_price),
            CellSpec::Formula(format!(
                "IF(AND(ISNUMBER({q}),ISNUMBER({p})),{q}*{p},\"\")",
                q = cell_ref(r, COL_PROJECT_QTY),
                p = cell_ref(r, COL_PROJECT_PRICE)
            )),
        ];
        cells.extend(stats_formulas(r, companies.len()));
        for (c, figures) in row.companies.iter().enumerate().take(companies.len()) {
            cells.extend(company_cells(r, c, figures));
        }
        data.push(cells);
    }

    let mut rules = Vec::new();
    if !rows.is_empty() {
        for company in 0..companies.len() {
            rules.extend(company_rules(company, 1, rows.len()));
        }
    }

    WorkbookLayout {
        sheet_name: options.sheet_name.clone(),
        columns,
        rows: data,
        rules,
        palette: options.palette.clone(),
    }
}

//==============================================================================
// Writer
//==============================================================================

/// Writes a [`WorkbookLayout`] as an .xlsx workbook.
pub struct ExcelExporter {
    layout: WorkbookLayout,
}

impl ExcelExporter {
    pub fn new(layout: WorkbookLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &WorkbookLayout {
        &self.layout
    }

    /// Export the comparison to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> ReconResult<()> {
        let mut workbook = self.build_workbook()?;
        workbook
            .save(output_path)
            .map_err(|e| ReconError::Export(format!("Failed to save Excel file: {}", e)))?;
        info!(
            path = %output_path.display(),
            rows = self.layout.rows.len(),
            columns = self.layout.columns.len(),
            "comparison workbook saved"
        );
        Ok(())
    }

    /// Serialize the workbook in memory.
    pub fn to_buffer(&self) -> ReconResult<Vec<u8>> {
        let mut workbook = self.build_workbook()?;
        workbook
            .save_to_buffer()
            .map_err(|e| ReconError::Export(format!("Failed to serialize workbook: {}", e)))
    }

    fn build_workbook(&self) -> ReconResult<Workbook> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.layout.sheet_name)
            .map_err(|e| ReconError::Export(format!("Failed to set worksheet name: {}", e)))?;

        self.write_header(worksheet)?;
        self.write_rows(worksheet)?;
        self.write_rules(worksheet)?;

        let last_row = row_num(self.layout.last_row())?;
        let last_col = col_num(self.layout.last_col())?;
        worksheet
            .set_freeze_panes(1, 1)
            .map_err(|e| ReconError::Export(format!("Failed to freeze panes: {}", e)))?;
        worksheet
            .autofilter(0, 0, last_row, last_col)
            .map_err(|e| ReconError::Export(format!("Failed to set autofilter: {}", e)))?;

        Ok(workbook)
    }

    fn write_header(&self, worksheet: &mut Worksheet) -> ReconResult<()> {
        let palette = &self.layout.palette;
        for (idx, column) in self.layout.columns.iter().enumerate() {
            let fill = match column.company {
                Some(company) => palette.company_color(company),
                None => palette.header.as_str(),
            };
            let format = Format::new()
                .set_bold()
                .set_text_wrap()
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin)
                .set_background_color(fill);
            let col = col_num(idx)?;
            worksheet
                .write_string_with_format(0, col, &column.header, &format)
                .map_err(|e| ReconError::Export(format!("Failed to write header: {}", e)))?;
            worksheet
                .set_column_width(col, column.width)
                .map_err(|e| ReconError::Export(format!("Failed to set column width: {}", e)))?;
        }
        Ok(())
    }

    fn write_rows(&self, worksheet: &mut Worksheet) -> ReconResult<()> {
        let formats: Vec<Format> = self
            .layout
            .columns
            .iter()
            .map(|c| match c.style.num_format() {
                Some(num) => Format::new().set_num_format(num),
                None => Format::new(),
            })
            .collect();
        let plain = Format::new();

        for (offset, cells) in self.layout.rows.iter().enumerate() {
            let row = row_num(offset + 1)?;
            for (idx, cell) in cells.iter().enumerate() {
                let col = col_num(idx)?;
                let format = formats.get(idx).unwrap_or(&plain);
                match cell {
                    CellSpec::Blank => {}
                    CellSpec::Text(text) => {
                        worksheet
                            .write_string_with_format(row, col, text, format)
                            .map_err(|e| {
                                ReconError::Export(format!("Failed to write text: {}", e))
                            })?;
                    }
                    CellSpec::Number(value) => {
                        worksheet
                            .write_number_with_format(row, col, *value, format)
                            .map_err(|e| {
                                ReconError::Export(format!("Failed to write number: {}", e))
                            })?;
                    }
                    CellSpec::Formula(formula) => {
                        worksheet
                            .write_formula_with_format(row, col, Formula::new(formula), format)
                            .map_err(|e| {
                                ReconError::Export(format!("Failed to write formula: {}", e))
                            })?;
                    }
                }
            }
        }
        Ok(())
    }

    fn rule_format(&self, style: RuleStyle) -> Format {
        let palette = &self.layout.palette;
        match style {
            RuleStyle::BetterFill => Format::new().set_background_color(palette.better.as_str()),
            RuleStyle::WorseFill => Format::new().set_background_color(palette.worse.as_str()),
            RuleStyle::PositiveFont => Format::new().set_font_color(palette.positive_font.as_str()),
            RuleStyle::NegativeFont => Format::new().set_font_color(palette.negative_font.as_str()),
            RuleStyle::QuantityHighlight => Format::new()
                .set_bold()
                .set_background_color(palette.quantity_highlight.as_str()),
        }
    }

    fn write_rules(&self, worksheet: &mut Worksheet) -> ReconResult<()> {
        for rule in &self.layout.rules {
            let cf = ConditionalFormatFormula::new()
                .set_rule(format!("={}", rule.formula).as_str())
                .set_format(self.rule_format(rule.style));
            let col = col_num(rule.col)?;
            let (first_row, last_row) = (row_num(rule.first_row)?, row_num(rule.last_row)?);
            worksheet
                .add_conditional_format(first_row, col, last_row, col, &cf)
                .map_err(|e| {
                    ReconError::Export(format!("Failed to add conditional format: {}", e))
                })?;
        }
        Ok(())
    }
}

fn row_num(row: usize) -> ReconResult<u32> {
    u32::try_from(row).map_err(|_| ReconError::Export(format!("Row {} is out of range", row)))
}

fn col_num(col: usize) -> ReconResult<u16> {
    u16::try_from(col).map_err(|_| ReconError::Export(format!("Column {} is out of range", col)))
}
