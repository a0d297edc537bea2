//! Saved-preset resolution against the live sheet.
//!
//! Presets refer to columns by header label (portable) or by letter
//! (positional). Labels are translated back into this sheet's keys; a
//! reference that matches nothing degrades to its uppercased literal and is
//! reported, never rejected.

use crate::types::{Column, ColumnMapping, SavedImportConfig};
use tracing::{debug, warn};

/// Outcome of resolving a single column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRef {
    /// Matched a header label.
    Label(String),
    /// Matched a column key directly.
    Key(String),
    /// Matched nothing; uppercased literal kept as best effort.
    Literal(String),
}

impl ResolvedRef {
    pub fn key(&self) -> &str {
        match self {
            ResolvedRef::Label(k) | ResolvedRef::Key(k) | ResolvedRef::Literal(k) => k,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, ResolvedRef::Literal(_))
    }
}

/// Resolve one reference: label first, then key, then literal.
pub fn resolve_reference(reference: &str, columns: &[Column]) -> ResolvedRef {
    let wanted = reference.trim().to_lowercase();
    if let Some(col) = columns
        .iter()
        .find(|c| c.label.trim().to_lowercase() == wanted)
    {
        return ResolvedRef::Label(col.key.clone());
    }
    if let Some(col) = columns.iter().find(|c| c.key.to_lowercase() == wanted) {
        return ResolvedRef::Key(col.key.clone());
    }
    ResolvedRef::Literal(reference.trim().to_uppercase())
}

/// Split a multi-value field on commas, semicolons and whitespace.
pub fn tokenize_columns(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`tokenize_columns`] for writing presets back.
pub fn join_columns(values: &[String]) -> String {
    values.join(", ")
}

/// A preset applied to a sheet: the mapping plus every reference that missed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMapping {
    pub mapping: ColumnMapping,
    pub unresolved: Vec<String>,
}

struct Resolver<'a> {
    columns: &'a [Column],
    unresolved: Vec<String>,
}

impl Resolver<'_> {
    fn single(&mut self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let resolved = resolve_reference(reference, self.columns);
        if !resolved.is_found() {
            warn!(reference, key = resolved.key(), "saved column reference not found on sheet");
            self.unresolved.push(reference.to_string());
        }
        Some(resolved.key().to_string())
    }

    fn multi(&mut self, value: &str) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for token in tokenize_columns(value) {
            if let Some(key) = self.single(&token) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

/// Overlay a saved preset onto `base` (usually the heuristic proposal).
///
/// Fields the preset leaves unset keep the base value. For multi-value fields
/// the first token becomes the primary column, the rest stay as candidates.
pub fn resolve_saved_mapping(
    config: &SavedImportConfig,
    columns: &[Column],
    base: ColumnMapping,
) -> ResolvedMapping {
    let mut resolver = Resolver {
        columns,
        unresolved: Vec::new(),
    };
    let mut mapping = base;

    if let Some(value) = config.code_columns.as_deref() {
        let keys = resolver.multi(value);
        if !keys.is_empty() {
            mapping.code_columns = keys;
        }
    }
    if let Some(value) = config.description_columns.as_deref() {
        let keys = resolver.multi(value);
        if !keys.is_empty() {
            mapping.description_columns = keys;
        }
    }
    if let Some(key) = config.price_column.as_deref().and_then(|v| resolver.single(v)) {
        mapping.price_column = Some(key);
    }
    if let Some(key) = config.quantity_column.as_deref().and_then(|v| resolver.single(v)) {
        mapping.quantity_column = Some(key);
    }

    debug!(
        preset = %config.name,
        unresolved = resolver.unresolved.len(),
        "applied saved mapping"
    );

    ResolvedMapping {
        mapping,
        unresolved: resolver.unresolved,
    }
}

/// Turn a live mapping back into a preset, referencing columns by label.
pub fn preset_from_mapping(
    name: &str,
    mapping: &ColumnMapping,
    columns: &[Column],
) -> SavedImportConfig {
    let label_of = |key: &String| {
        columns
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.label.clone())
            .unwrap_or_else(|| key.clone())
    };
    let labels = |keys: &[String]| -> Option<String> {
        if keys.is_empty() {
            None
        } else {
            // Labels may contain spaces, which would split on read; keys don't.
            let refs: Vec<String> = keys
                .iter()
                .map(|k| {
                    let label = label_of(k);
                    if tokenize_columns(&label).len() == 1 {
                        label
                    } else {
                        k.clone()
                    }
                })
                .collect();
            Some(join_columns(&refs))
        }
    };

    SavedImportConfig {
        name: name.to_string(),
        sheet_name: Some(mapping.sheet_name.clone()),
        code_columns: labels(&mapping.code_columns),
        description_columns: labels(&mapping.description_columns),
        price_column: mapping.price_column.as_ref().map(label_of),
        quantity_column: mapping.quantity_column.as_ref().map(label_of),
        ..Default::default()
    }
}

/// A preset sheet that is not in the workbook yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSheet {
    pub requested: String,
}

impl PendingSheet {
    /// Resolve once a sheet with the same name (case-insensitive) is available.
    pub fn resolve(&self, sheet_names: &[String]) -> Option<String> {
        let wanted = self.requested.trim().to_lowercase();
        sheet_names
            .iter()
            .find(|name| name.trim().to_lowercase() == wanted)
            .cloned()
    }
}

/// Which sheet a preset should be applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelection {
    Found(String),
    /// Named sheet missing; keep it around and retry on the next workbook.
    Pending(PendingSheet),
    /// Preset names no sheet; caller picks (usually the first).
    Unspecified,
}

pub fn select_sheet(config: &SavedImportConfig, sheet_names: &[String]) -> SheetSelection {
    match config.sheet_name.as_deref().map(str::trim) {
        None | Some("") => SheetSelection::Unspecified,
        Some(requested) => {
            let pending = PendingSheet {
                requested: requested.to_string(),
            };
            match pending.resolve(sheet_names) {
                Some(name) => SheetSelection::Found(name),
                None => {
                    debug!(sheet = requested, "preset sheet not in workbook, pending");
                    SheetSelection::Pending(pending)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profiler::build_column;
    use crate::types::CellValue;

    fn columns(labels: &[&str]) -> Vec<Column> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| build_column(i, &CellValue::from(*l), &[]))
            .collect()
    }

    #[test]
    fn test_resolve_reference_order() {
        let cols = columns(&["Codice", "Descrizione", "B"]);
        // label wins over key: "B" is the label of column C
        assert_eq!(resolve_reference("b", &cols), ResolvedRef::Label("C".to_string()));
        assert_eq!(
            resolve_reference("  codice ", &cols),
            ResolvedRef::Label("A".to_string())
        );
        assert_eq!(resolve_reference("a", &cols), ResolvedRef::Key("A".to_string()));
        assert_eq!(resolve_reference("zz", &cols), ResolvedRef::Literal("ZZ".to_string()));
    }

    #[test]
    fn test_tokenize_and_join() {
        assert_eq!(tokenize_columns("A, B;C  D"), vec!["A", "B", "C", "D"]);
        assert!(tokenize_columns(" ;, ").is_empty());
        assert_eq!(join_columns(&["A".to_string(), "B".to_string()]), "A, B");
    }

    #[test]
    fn test_renumbered_sheet_follows_labels() {
        // Preset saved when "Prezzo" was column C; now it's column E.
        let cols = columns(&["Nr", "Codice", "Descrizione", "Qta", "Prezzo"]);
        let preset = SavedImportConfig {
            name: "acme".to_string(),
            code_columns: Some("Codice".to_string()),
            price_column: Some("Prezzo".to_string()),
            quantity_column: Some("Qta".to_string()),
            ..Default::default()
        };
        let resolved = resolve_saved_mapping(&preset, &cols, ColumnMapping::default());
        assert!(resolved.unresolved.is_empty());
        assert_eq!(resolved.mapping.code_columns, vec!["B"]);
        assert_eq!(resolved.mapping.price_column.as_deref(), Some("E"));
        assert_eq!(resolved.mapping.quantity_column.as_deref(), Some("D"));
    }

    #[test]
    fn test_missing_reference_is_reported_not_fatal() {
        let cols = columns(&["Codice", "Prezzo"]);
        let preset = SavedImportConfig {
            name: "p".to_string(),
            price_column: Some("Importo".to_string()),
            ..Default::default()
        };
        let resolved = resolve_saved_mapping(&preset, &cols, ColumnMapping::default());
        assert_eq!(resolved.mapping.price_column.as_deref(), Some("IMPORTO"));
        assert_eq!(resolved.unresolved, vec!["Importo"]);
        assert_eq!(resolved.mapping.missing_keys(&cols), vec!["IMPORTO"]);
    }

    #[test]
    fn test_multi_value_primary_is_first() {
        let cols = columns(&["Cat", "Codice", "Descr", "Descr estesa"]);
        let preset = SavedImportConfig {
            name: "p".to_string(),
            code_columns: Some("Codice; Cat".to_string()),
            description_columns: Some("C,D".to_string()),
            ..Default::default()
        };
        let base = ColumnMapping {
            price_column: Some("X".to_string()),
            ..Default::default()
        };
        let resolved = resolve_saved_mapping(&preset, &cols, base);
        assert_eq!(resolved.mapping.code_columns, vec!["B", "A"]);
        assert_eq!(resolved.mapping.description_columns, vec!["C", "D"]);
        assert_eq!(resolved.mapping.price_column.as_deref(), Some("X"));
    }

    #[test]
    fn test_preset_round_trip_through_labels() {
        let cols = columns(&["Codice", "Descrizione", "Prezzo unitario"]);
        let mapping = ColumnMapping {
            sheet_name: "Offerta".to_string(),
            code_columns: vec!["A".to_string()],
            description_columns: vec!["B".to_string()],
            price_column: Some("C".to_string()),
            ..Default::default()
        };
        let preset = preset_from_mapping("acme", &mapping, &cols);
        assert_eq!(preset.code_columns.as_deref(), Some("Codice"));
        assert_eq!(preset.price_column.as_deref(), Some("Prezzo unitario"));

        let resolved = resolve_saved_mapping(&preset, &cols, ColumnMapping::default());
        assert_eq!(resolved.mapping.code_columns, mapping.code_columns);
        assert_eq!(resolved.mapping.price_column, mapping.price_column);
    }

    #[test]
    fn test_pending_sheet() {
        let preset = SavedImportConfig {
            name: "p".to_string(),
            sheet_name: Some("Offerta".to_string()),
            ..Default::default()
        };
        let first = vec!["Riepilogo".to_string()];
        let pending = match select_sheet(&preset, &first) {
            SheetSelection::Pending(p) => p,
            other => panic!("expected pending, got {:?}", other),
        };
        let later = vec!["Riepilogo".to_string(), "OFFERTA".to_string()];
        assert_eq!(pending.resolve(&later), Some("OFFERTA".to_string()));
        assert_eq!(
            select_sheet(&preset, &later),
            SheetSelection::Found("OFFERTA".to_string())
        );
    }

    #[test]
    fn test_unspecified_sheet() {
        let preset = SavedImportConfig::default();
        assert_eq!(select_sheet(&preset, &[]), SheetSelection::Unspecified);
    }
}
