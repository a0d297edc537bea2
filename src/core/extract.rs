//! Line-item extraction from a mapped sheet.
//!
//! The project estimate becomes the list of `LineItem`s; a bid return is
//! read the same way and merged onto those items as `OfferRecord`s under
//! one offer key.

use crate::core::offer_resolver::normalize_label;
use crate::core::profiler::column_index;
use crate::types::{ColumnMapping, LineItem, OfferRecord, Severity, Sheet};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// One data row read through a mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRow {
    /// Zero-based sheet row.
    pub row: usize,
    pub code: String,
    pub description: String,
    pub extended_description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub progressive: Option<String>,
}

fn resolve_indices(keys: &[String]) -> Vec<usize> {
    keys.iter().filter_map(|k| column_index(k)).collect()
}

fn text_at(sheet: &Sheet, row: usize, col: Option<usize>) -> Option<String> {
    col.and_then(|c| sheet.cell(row, c).as_text())
}

fn number_at(sheet: &Sheet, row: usize, col: Option<usize>) -> Option<f64> {
    col.and_then(|c| sheet.cell(row, c).as_number())
}

/// Read every data row below the mapping's header row.
///
/// Rows with neither a code nor a description (blank lines, subtotals with
/// no label) are skipped. Multi-column codes are joined with ".".
pub fn extract_rows(sheet: &Sheet, mapping: &ColumnMapping) -> Vec<ExtractedRow> {
    let code_cols = resolve_indices(&mapping.code_columns);
    let desc_cols = resolve_indices(&mapping.description_columns);
    let price_col = mapping.price_column.as_deref().and_then(column_index);
    let qty_col = mapping.quantity_column.as_deref().and_then(column_index);
    let prog_col = mapping.progressive_column.as_deref().and_then(column_index);

    let mut rows = Vec::new();
    for row in (mapping.header_row + 1)..sheet.rows.len() {
        let code = code_cols
            .iter()
            .filter_map(|c| sheet.cell(row, *c).as_text())
            .collect::<Vec<_>>()
            .join(".");
        let mut descriptions = desc_cols.iter().filter_map(|c| sheet.cell(row, *c).as_text());
        let description = descriptions.next().unwrap_or_default();
        let extended: Vec<String> = descriptions.collect();

        if code.is_empty() && description.is_empty() {
            continue;
        }

        rows.push(ExtractedRow {
            row,
            code,
            description,
            extended_description: if extended.is_empty() {
                None
            } else {
                Some(extended.join(" "))
            },
            quantity: number_at(sheet, row, qty_col),
            unit_price: number_at(sheet, row, price_col),
            progressive: text_at(sheet, row, prog_col),
        });
    }

    debug!(sheet = %sheet.name, rows = rows.len(), "extracted mapped rows");
    rows
}

/// Turn project-estimate rows into line items with no offers yet.
pub fn project_line_items(rows: &[ExtractedRow]) -> Vec<LineItem> {
    rows.iter()
        .map(|r| LineItem {
            code: r.code.clone(),
            description: r.description.clone(),
            extended_description: r.extended_description.clone(),
            project_quantity: r.quantity,
            project_unit_price: r.unit_price,
            project_total_amount: match (r.quantity, r.unit_price) {
                (Some(q), Some(p)) => Some(q * p),
                _ => None,
            },
            ..Default::default()
        })
        .collect()
}

/// Build the offer record for one return row against its project line.
pub fn offer_from_row(item: &LineItem, row: &ExtractedRow) -> OfferRecord {
    OfferRecord {
        quantity: row.quantity,
        unit_price: row.unit_price,
        total_amount: match (row.quantity, row.unit_price) {
            (Some(q), Some(p)) => Some(q * p),
            _ => None,
        },
        quantity_delta: match (row.quantity, item.project_quantity) {
            (Some(offered), Some(project)) => Some(offered - project),
            _ => None,
        },
        severity: Severity::from_price_delta(item.project_unit_price, row.unit_price),
        note: None,
    }
}

/// What happened when a return was merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub matched: usize,
    /// Return rows with no project line, as "code description".
    pub unmatched: Vec<String>,
}

/// Attach a bid return to the project lines under `offer_key`.
///
/// Rows match by code, falling back to description when the return has no
/// code. Repeated codes are consumed in order.
pub fn merge_return(items: &mut [LineItem], rows: &[ExtractedRow], offer_key: &str) -> MergeReport {
    let mut by_code: HashMap<String, VecDeque<usize>> = HashMap::new();
    let mut by_description: HashMap<String, VecDeque<usize>> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        if !item.code.trim().is_empty() {
            by_code.entry(normalize_label(&item.code)).or_default().push_back(idx);
        }
        by_description
            .entry(normalize_label(&item.description))
            .or_default()
            .push_back(idx);
    }

    let mut report = MergeReport::default();
    for row in rows {
        let target = if row.code.trim().is_empty() {
            by_description
                .get_mut(&normalize_label(&row.description))
                .and_then(VecDeque::pop_front)
        } else {
            by_code
                .get_mut(&normalize_label(&row.code))
                .and_then(VecDeque::pop_front)
        };

        match target {
            Some(idx) => {
                let record = offer_from_row(&items[idx], row);
                items[idx].offers.insert(offer_key.to_string(), record);
                report.matched += 1;
            }
            None => {
                warn!(offer_key, code = %row.code, row = row.row, "return row has no project line");
                report
                    .unmatched
                    .push(format!("{} {}", row.code, row.description).trim().to_string());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;
    use pretty_assertions::assert_eq;

    fn cell(value: impl Into<CellValue>) -> CellValue {
        value.into()
    }

    fn project_sheet() -> Sheet {
        Sheet::new(
            "Computo",
            vec![
                vec![cell("Computo metrico")],
                vec![cell("Cat"), cell("Codice"), cell("Descrizione"), cell("Qta"), cell("Prezzo")],
                vec![cell("01"), cell("A100"), cell("Tubo"), cell(10.0), cell("12,50")],
                vec![CellValue::Null, CellValue::Null, CellValue::Null],
                vec![cell("01"), cell("B200"), cell("Valvola"), cell(2.0), cell(40.0)],
            ],
        )
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            sheet_name: "Computo".to_string(),
            header_row: 1,
            code_columns: vec!["B".to_string()],
            description_columns: vec!["C".to_string()],
            price_column: Some("E".to_string()),
            quantity_column: Some("D".to_string()),
            progressive_column: None,
        }
    }

    #[test]
    fn test_extract_skips_blank_rows() {
        let rows = extract_rows(&project_sheet(), &mapping());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "A100");
        assert_eq!(rows[0].unit_price, Some(12.5));
        assert_eq!(rows[1].row, 4);
    }

    #[test]
    fn test_multi_column_code() {
        let mut m = mapping();
        m.code_columns = vec!["A".to_string(), "B".to_string()];
        let rows = extract_rows(&project_sheet(), &m);
        assert_eq!(rows[0].code, "01.A100");
    }

    #[test]
    fn test_project_totals() {
        let items = project_line_items(&extract_rows(&project_sheet(), &mapping()));
        assert_eq!(items[0].project_total_amount, Some(125.0));
        assert_eq!(items[1].project_total_amount, Some(80.0));
        assert!(items[0].offers.is_empty());
    }

    #[test]
    fn test_merge_return() {
        let mut items = project_line_items(&extract_rows(&project_sheet(), &mapping()));
        let offer_rows = vec![
            ExtractedRow {
                code: "a100".to_string(),
                quantity: Some(12.0),
                unit_price: Some(11.0),
                ..Default::default()
            },
            ExtractedRow {
                code: "Z999".to_string(),
                description: "Extra".to_string(),
                ..Default::default()
            },
        ];
        let report = merge_return(&mut items, &offer_rows, "Acme (Round 1)");
        assert_eq!(report.matched, 1);
        assert_eq!(report.unmatched, vec!["Z999 Extra"]);

        let offer = &items[0].offers["Acme (Round 1)"];
        assert_eq!(offer.total_amount, Some(132.0));
        assert_eq!(offer.quantity_delta, Some(2.0));
        assert_eq!(offer.severity, Severity::Warning);
        assert!(items[1].offers.is_empty());
    }

    #[test]
    fn test_merge_by_description_without_code() {
        let mut items = vec![LineItem {
            code: String::new(),
            description: "Scavo".to_string(),
            ..Default::default()
        }];
        let rows = vec![ExtractedRow {
            description: " scavo ".to_string(),
            unit_price: Some(5.0),
            ..Default::default()
        }];
        let report = merge_return(&mut items, &rows, "Beta");
        assert_eq!(report.matched, 1);
        assert_eq!(items[0].offers["Beta"].unit_price, Some(5.0));
    }
}
