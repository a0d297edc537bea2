use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::numeric::parse_locale_number;

//==============================================================================
// Raw sheet cells
//==============================================================================

/// A single raw cell as it came out of the workbook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Text form used by every pattern/keyword heuristic. `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    /// Numeric form. Text cells go through the locale-tolerant parser.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Text(s) => parse_locale_number(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Integers print without a trailing ".0" so codes like 100 stay "100".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One worksheet, fully materialized as a rectangular-ish grid.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL)
    }
}

//==============================================================================
// Column profiling and mapping
//==============================================================================

/// Column metadata produced by the sheet profiler. Scores are fractions in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Spreadsheet-style letter (A, B, ..., AA).
    pub key: String,
    /// Zero-based position in the sheet.
    pub index: usize,
    pub label: String,
    pub samples: Vec<String>,
    pub numeric_score: f64,
    pub currency_score: f64,
    pub text_score: f64,
    pub code_score: f64,
}

/// Roles a column can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Code,
    Description,
    Price,
    Quantity,
    Progressive,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        ColumnRole::Code,
        ColumnRole::Description,
        ColumnRole::Price,
        ColumnRole::Quantity,
        ColumnRole::Progressive,
    ];
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Code => "code",
            ColumnRole::Description => "description",
            ColumnRole::Price => "price",
            ColumnRole::Quantity => "quantity",
            ColumnRole::Progressive => "progressive",
        };
        f.write_str(name)
    }
}

/// Resolved assignment of roles to column keys for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub sheet_name: String,
    /// Zero-based row holding the headers; data starts on the next row.
    #[serde(default)]
    pub header_row: usize,
    /// First entry is the primary code column.
    #[serde(default)]
    pub code_columns: Vec<String>,
    #[serde(default)]
    pub description_columns: Vec<String>,
    #[serde(default)]
    pub price_column: Option<String>,
    #[serde(default)]
    pub quantity_column: Option<String>,
    #[serde(default)]
    pub progressive_column: Option<String>,
}

impl ColumnMapping {
    fn referenced_keys(&self) -> impl Iterator<Item = &String> {
        self.code_columns
            .iter()
            .chain(self.description_columns.iter())
            .chain(self.price_column.iter())
            .chain(self.quantity_column.iter())
            .chain(self.progressive_column.iter())
    }

    /// Keys this mapping points at that the live sheet does not have.
    pub fn missing_keys(&self, columns: &[Column]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for key in self.referenced_keys() {
            if !columns.iter().any(|c| &c.key == key) && !missing.contains(key) {
                missing.push(key.clone());
            }
        }
        missing
    }

    /// Code and price are required before aggregation can run.
    pub fn require_complete(&self) -> crate::error::ReconResult<()> {
        if self.code_columns.is_empty() {
            return Err(crate::error::ReconError::Mapping(format!(
                "no code column mapped on sheet '{}'",
                self.sheet_name
            )));
        }
        if self.price_column.is_none() {
            return Err(crate::error::ReconError::Mapping(format!(
                "no price column mapped on sheet '{}'",
                self.sheet_name
            )));
        }
        Ok(())
    }
}

/// Persistence scope of a saved preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Project,
    #[default]
    Global,
}

/// Saved column-mapping preset. Column references are labels or letters;
/// multi-value fields are comma/semicolon/whitespace separated strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedImportConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_columns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_columns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_column: Option<String>,
    #[serde(default)]
    pub scope: ConfigScope,
}

//==============================================================================
// Offers and line items
//==============================================================================

/// One company's participation in one bidding round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRoundIdentity {
    /// Display name, already carrying the round suffix (e.g. "Acme (Round 2)").
    pub company_name: String,
    #[serde(default)]
    pub round_number: Option<u32>,
    #[serde(default)]
    pub round_label: Option<String>,
    #[serde(default)]
    pub original_company_label: Option<String>,
    #[serde(default)]
    pub normalized_label: Option<String>,
}

impl CompanyRoundIdentity {
    /// Identity for `company` in `round`, named per the offer-key convention.
    pub fn new(company: &str, round: Option<u32>) -> Self {
        let company = company.trim();
        Self {
            company_name: format_offer_key(company, round),
            round_number: round,
            round_label: None,
            original_company_label: Some(company.to_string()),
            normalized_label: Some(company.to_lowercase()),
        }
    }
}

/// `"{company}"` or `"{company} (Round {n})"`. Importers must produce exactly this.
pub fn format_offer_key(company: &str, round: Option<u32>) -> String {
    match round {
        Some(n) => format!("{} (Round {})", company, n),
        None => company.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl Severity {
    /// Classify an offered price against the project reference price.
    pub fn from_price_delta(project_price: Option<f64>, offered: Option<f64>) -> Self {
        match (project_price, offered) {
            (Some(reference), Some(price)) if reference != 0.0 => {
                let pct = ((price - reference) / reference * 100.0).abs();
                if pct <= 5.0 {
                    Severity::Ok
                } else if pct <= 20.0 {
                    Severity::Warning
                } else {
                    Severity::Critical
                }
            }
            _ => Severity::Unknown,
        }
    }
}

/// A company's offer on one line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    /// Offer quantity minus project quantity.
    #[serde(default)]
    pub quantity_delta: Option<f64>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Work-breakdown-structure reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WbsRef {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A project estimate line with every offer received for it, keyed by raw offer label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_description: Option<String>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub project_quantity: Option<f64>,
    #[serde(default)]
    pub project_unit_price: Option<f64>,
    #[serde(default)]
    pub project_total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wbs_level1: Option<WbsRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wbs_level2: Option<WbsRef>,
    #[serde(default)]
    pub offers: BTreeMap<String, OfferRecord>,
}

//==============================================================================
// Comparison output
//==============================================================================

/// Cross-company price statistics for one row. Only exists when at least one price does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation (divides by N).
    pub stddev: f64,
    pub count: usize,
}

/// One company-round's resolved figures on one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyComparison {
    pub company_name: String,
    /// Raw offer key the identity resolved to.
    pub matched_key: Option<String>,
    pub unit_price: Option<f64>,
    pub total_amount: Option<f64>,
    pub quantity: Option<f64>,
    pub quantity_delta: Option<f64>,
    pub delta_vs_project_pct: Option<f64>,
    pub delta_vs_mean_pct: Option<f64>,
}

/// A line item plus the per-company comparison and row statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow<'a> {
    pub item: &'a LineItem,
    /// Same order as the identities passed to the aggregator.
    pub companies: Vec<CompanyComparison>,
    pub stats: Option<PriceStats>,
    pub has_quantity_mismatch: bool,
}

impl ComparisonRow<'_> {
    pub fn mean_price(&self) -> Option<f64> {
        self.stats.map(|s| s.mean)
    }

    pub fn min_price(&self) -> Option<f64> {
        self.stats.map(|s| s.min)
    }

    pub fn max_price(&self) -> Option<f64> {
        self.stats.map(|s| s.max)
    }

    pub fn stddev_price(&self) -> Option<f64> {
        self.stats.map(|s| s.stddev)
    }
}

//==============================================================================
// Dataset (project estimate + bid returns)
//==============================================================================

/// Everything needed to run a comparison: the baseline lines and the bidders in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub companies: Vec<CompanyRoundIdentity>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: None,
            created_at: Utc::now(),
            companies: Vec::new(),
            line_items: Vec::new(),
        }
    }

    /// Register an identity unless one with the same name is already in scope.
    pub fn add_company(&mut self, identity: CompanyRoundIdentity) {
        if !self
            .companies
            .iter()
            .any(|c| c.company_name == identity.company_name)
        {
            self.companies.push(identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_text_forms() {
        assert_eq!(CellValue::Null.as_text(), None);
        assert_eq!(CellValue::from("  ").as_text(), None);
        assert_eq!(CellValue::Number(100.0).as_text(), Some("100".to_string()));
        assert_eq!(CellValue::Number(12.5).as_text(), Some("12.5".to_string()));
        assert_eq!(CellValue::from(" Tubo ").as_text(), Some("Tubo".to_string()));
    }

    #[test]
    fn test_cell_value_numbers() {
        assert_eq!(CellValue::from("12,50").as_number(), Some(12.5));
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
        assert_eq!(CellValue::from("abc").as_number(), None);
    }

    #[test]
    fn test_format_offer_key() {
        assert_eq!(format_offer_key("Acme", None), "Acme");
        assert_eq!(format_offer_key("Acme", Some(2)), "Acme (Round 2)");
    }

    #[test]
    fn test_identity_new() {
        let id = CompanyRoundIdentity::new(" Acme ", Some(3));
        assert_eq!(id.company_name, "Acme (Round 3)");
        assert_eq!(id.original_company_label.as_deref(), Some("Acme"));
        assert_eq!(id.normalized_label.as_deref(), Some("acme"));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_price_delta(Some(100.0), Some(104.0)), Severity::Ok);
        assert_eq!(Severity::from_price_delta(Some(100.0), Some(85.0)), Severity::Warning);
        assert_eq!(Severity::from_price_delta(Some(100.0), Some(150.0)), Severity::Critical);
        assert_eq!(Severity::from_price_delta(Some(0.0), Some(10.0)), Severity::Unknown);
        assert_eq!(Severity::from_price_delta(None, Some(10.0)), Severity::Unknown);
    }

    #[test]
    fn test_require_complete() {
        let mut mapping = ColumnMapping {
            sheet_name: "Sheet1".to_string(),
            ..Default::default()
        };
        assert!(mapping.require_complete().is_err());
        mapping.code_columns.push("A".to_string());
        assert!(mapping.require_complete().is_err());
        mapping.price_column = Some("C".to_string());
        assert!(mapping.require_complete().is_ok());
    }

    #[test]
    fn test_dataset_add_company_dedupes() {
        let mut ds = Dataset::new("tender");
        ds.add_company(CompanyRoundIdentity::new("Acme", Some(1)));
        ds.add_company(CompanyRoundIdentity::new("Acme", Some(1)));
        ds.add_company(CompanyRoundIdentity::new("Acme", Some(2)));
        assert_eq!(ds.companies.len(), 2);
    }
}
