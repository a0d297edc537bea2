//! Sheet profiler: turns a raw grid into column metadata.
//!
//! Nothing about the input is trusted. The header row is found by looking
//! for the usual Italian bill-of-quantities tokens, a handful of rows below
//! it are sampled, and each column gets four heuristic scores the column
//! scorer later ranks on.

use crate::core::numeric::{has_currency_marker, is_plain_number};
use crate::types::{CellValue, Column, Sheet};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Tokens that mark a header cell (case-insensitive substring match).
pub const DEFAULT_HEADER_TOKENS: [&str; 8] = [
    "cod",
    "categoria",
    "descr",
    "prezzo",
    "importo",
    "unit",
    "qta",
    "quant",
];

/// Knobs for header detection and sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileOptions {
    pub header_tokens: Vec<String>,
    pub sample_size: usize,
    /// Non-empty cells (and token hits) a row needs to qualify as header.
    pub min_header_cells: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            header_tokens: DEFAULT_HEADER_TOKENS.iter().map(|t| t.to_string()).collect(),
            sample_size: 5,
            min_header_cells: 2,
        }
    }
}

/// How the header row was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Enough cells contain a header token.
    Tokens,
    /// No token row; first row with enough non-empty cells.
    FirstDense,
    /// Nothing qualified; row 0 by default.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDetection {
    pub row: usize,
    pub matched_by: HeaderMatch,
}

/// Profiler output for one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetProfile {
    pub header: HeaderDetection,
    pub columns: Vec<Column>,
}

/// Bijective base-26 column letter: 0 → A, 25 → Z, 26 → AA.
pub fn column_key(index: usize) -> String {
    let mut result = String::new();
    let mut num = index;

    loop {
        let remainder = num % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if num < 26 {
            break;
        }
        num = num / 26 - 1;
    }

    result
}

/// Inverse of [`column_key`]. `None` for anything that is not all ASCII letters.
pub fn column_index(key: &str) -> Option<usize> {
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut index = 0usize;
    for c in key.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^[a-z]{1,3}\d{2,4}(?:[._/-][a-z0-9]+)*$").expect("valid code pattern")
    })
}

/// True for item codes like `A100`, `ABC1234.01`, `B20-3a`.
pub fn looks_like_code(value: &str) -> bool {
    code_pattern().is_match(value.trim())
}

fn non_empty_count(row: &[CellValue]) -> usize {
    row.iter().filter(|c| !c.is_empty()).count()
}

/// Find the header row. First token row wins, then the first dense row, then row 0.
pub fn detect_header(rows: &[Vec<CellValue>], options: &ProfileOptions) -> HeaderDetection {
    let tokens: Vec<String> = options
        .header_tokens
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    for (idx, row) in rows.iter().enumerate() {
        if non_empty_count(row) < options.min_header_cells {
            continue;
        }
        let hits = row
            .iter()
            .filter_map(CellValue::as_text)
            .filter(|text| {
                let lowered = text.to_lowercase();
                tokens.iter().any(|t| lowered.contains(t.as_str()))
            })
            .count();
        if hits >= options.min_header_cells {
            debug!(row = idx, hits, "header row matched by tokens");
            return HeaderDetection {
                row: idx,
                matched_by: HeaderMatch::Tokens,
            };
        }
    }

    if let Some(idx) = rows
        .iter()
        .position(|row| non_empty_count(row) >= options.min_header_cells)
    {
        debug!(row = idx, "no token header, using first dense row");
        return HeaderDetection {
            row: idx,
            matched_by: HeaderMatch::FirstDense,
        };
    }

    debug!("no header candidate, falling back to row 0");
    HeaderDetection {
        row: 0,
        matched_by: HeaderMatch::Fallback,
    }
}

fn fraction(samples: &[String], predicate: impl Fn(&str) -> bool) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let hits = samples.iter().filter(|s| predicate(s.as_str())).count();
    (hits as f64 / samples.len() as f64).clamp(0.0, 1.0)
}

fn digit_stripped_len(value: &str) -> usize {
    value.chars().filter(|c| !c.is_ascii_digit()).count()
}

/// Build one column from its header cell and the sampled cells below it.
pub fn build_column(index: usize, header: &CellValue, cells: &[&CellValue]) -> Column {
    let key = column_key(index);
    let samples: Vec<String> = cells.iter().filter_map(|c| c.as_text()).collect();
    let numeric_hits = cells
        .iter()
        .filter(|c| match c {
            CellValue::Number(n) => n.is_finite(),
            CellValue::Text(s) => is_plain_number(s),
            CellValue::Null => false,
        })
        .count();
    let numeric_score = if samples.is_empty() {
        0.0
    } else {
        (numeric_hits as f64 / samples.len() as f64).clamp(0.0, 1.0)
    };

    let label = match header.as_text() {
        Some(text) => text,
        None if samples.is_empty() => String::new(),
        None => format!("Column {}", key),
    };

    Column {
        currency_score: fraction(&samples, has_currency_marker),
        text_score: fraction(&samples, |s| digit_stripped_len(s) > 10),
        code_score: fraction(&samples, looks_like_code),
        numeric_score,
        key,
        index,
        label,
        samples,
    }
}

/// Profile a sheet: detect the header, sample beneath it, score every column.
///
/// Columns with neither a header nor any sampled value are dropped; the
/// remaining columns keep their positional key. A sheet with no row holding
/// at least `min_header_cells` values is not tabular and yields no columns.
pub fn profile_sheet(sheet: &Sheet, options: &ProfileOptions) -> SheetProfile {
    let header = detect_header(&sheet.rows, options);
    if header.matched_by == HeaderMatch::Fallback {
        return SheetProfile {
            header,
            columns: Vec::new(),
        };
    }

    let first_sample = header.row + 1;
    let sample_count = sheet
        .rows
        .len()
        .saturating_sub(first_sample)
        .min(options.sample_size);

    let columns: Vec<Column> = (0..sheet.width())
        .map(|idx| {
            let cells: Vec<&CellValue> = (first_sample..first_sample + sample_count)
                .map(|row| sheet.cell(row, idx))
                .collect();
            build_column(idx, sheet.cell(header.row, idx), &cells)
        })
        .filter(|col| !col.label.is_empty())
        .collect();

    debug!(
        sheet = %sheet.name,
        header_row = header.row,
        columns = columns.len(),
        "profiled sheet"
    );

    SheetProfile { header, columns }
}
