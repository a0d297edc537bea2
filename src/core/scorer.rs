//! Column scorer: ranks profiled columns against a role.
//!
//! Scoring is additive and fully explainable: keyword hits, profile score
//! preferences and a small bonus for having data at all. A disallowed
//! keyword or an excluded key zeroes the column.

use crate::core::profiler::SheetProfile;
use crate::types::{Column, ColumnMapping, ColumnRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

const KEYWORD_WEIGHT: f64 = 3.0;
const CODE_WEIGHT: f64 = 4.0;
const NUMERIC_WEIGHT: f64 = 3.0;
const TEXT_WEIGHT: f64 = 2.0;
const CURRENCY_WEIGHT: f64 = 3.0;
const CURRENCY_PENALTY: f64 = 1.0;
const HAS_SAMPLES_BONUS: f64 = 0.5;

/// Requirements of one role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringCriteria {
    pub keywords: Vec<String>,
    pub disallowed: Vec<String>,
    pub prefer_numeric: bool,
    pub prefer_text: bool,
    pub prefer_code_pattern: bool,
    pub prefer_currency: bool,
    pub penalize_currency: bool,
    pub excluded_keys: Vec<String>,
}

impl ScoringCriteria {
    /// Same criteria with extra keys excluded.
    pub fn excluding<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Self {
        let mut criteria = self.clone();
        criteria.excluded_keys.extend(keys.into_iter().cloned());
        criteria
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// Default criteria for every role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCriteria {
    pub code: ScoringCriteria,
    pub description: ScoringCriteria,
    pub price: ScoringCriteria,
    pub quantity: ScoringCriteria,
    pub progressive: ScoringCriteria,
}

impl Default for RoleCriteria {
    fn default() -> Self {
        Self {
            code: ScoringCriteria {
                prefer_code_pattern: true,
                ..Default::default()
            },
            description: ScoringCriteria {
                prefer_text: true,
                ..Default::default()
            },
            price: ScoringCriteria {
                keywords: words(&["prezzo", "price", "€", "importo unitario"]),
                prefer_currency: true,
                ..Default::default()
            },
            quantity: ScoringCriteria {
                keywords: words(&["quant", "qta", "qty"]),
                prefer_numeric: true,
                ..Default::default()
            },
            progressive: ScoringCriteria {
                keywords: words(&["prog", "progressivo"]),
                prefer_numeric: true,
                ..Default::default()
            },
        }
    }
}

impl RoleCriteria {
    pub fn for_role(&self, role: ColumnRole) -> &ScoringCriteria {
        match role {
            ColumnRole::Code => &self.code,
            ColumnRole::Description => &self.description,
            ColumnRole::Price => &self.price,
            ColumnRole::Quantity => &self.quantity,
            ColumnRole::Progressive => &self.progressive,
        }
    }
}

/// A column's score against one role, with the number of keyword hits behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnScore {
    pub key: String,
    pub label: String,
    pub score: f64,
    pub keyword_hits: usize,
}

fn haystack(column: &Column) -> String {
    format!("{} {}", column.label, column.samples.join(" ")).to_lowercase()
}

/// Score one column. Deterministic, no state.
pub fn score_column(column: &Column, criteria: &ScoringCriteria) -> ColumnScore {
    let text = haystack(column);
    let zero = |hits| ColumnScore {
        key: column.key.clone(),
        label: column.label.clone(),
        score: 0.0,
        keyword_hits: hits,
    };

    if criteria
        .disallowed
        .iter()
        .any(|word| text.contains(&word.to_lowercase()))
    {
        return zero(0);
    }

    let keyword_hits = criteria
        .keywords
        .iter()
        .filter(|word| text.contains(&word.to_lowercase()))
        .count();

    if criteria.excluded_keys.iter().any(|k| k == &column.key) {
        return zero(keyword_hits);
    }

    let mut score = KEYWORD_WEIGHT * keyword_hits as f64;
    if criteria.prefer_code_pattern {
        score += CODE_WEIGHT * column.code_score;
    }
    if criteria.prefer_numeric {
        score += NUMERIC_WEIGHT * column.numeric_score;
    }
    if criteria.prefer_text {
        score += TEXT_WEIGHT * column.text_score;
    }
    if criteria.prefer_currency {
        score += CURRENCY_WEIGHT * column.currency_score;
    }
    if criteria.penalize_currency {
        score -= CURRENCY_PENALTY * column.currency_score;
    }
    if !column.samples.is_empty() {
        score += HAS_SAMPLES_BONUS;
    }

    ColumnScore {
        key: column.key.clone(),
        label: column.label.clone(),
        score,
        keyword_hits,
    }
}

/// All columns, best first. Ties keep sheet order.
pub fn rank_columns(columns: &[Column], criteria: &ScoringCriteria) -> Vec<ColumnScore> {
    let mut scores: Vec<ColumnScore> = columns.iter().map(|c| score_column(c, criteria)).collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

/// Best column scoring above zero, or the fallback.
pub fn select_column(
    columns: &[Column],
    criteria: &ScoringCriteria,
    fallback: Option<&str>,
) -> Option<String> {
    rank_columns(columns, criteria)
        .into_iter()
        .find(|s| s.score > 0.0)
        .map(|s| s.key)
        .or_else(|| fallback.map(str::to_string))
}

/// Why a role ended up on a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleChoice {
    pub role: ColumnRole,
    pub choice: Option<ColumnScore>,
    /// Next best candidate, for the human reviewing the proposal.
    pub runner_up: Option<ColumnScore>,
}

/// A heuristic mapping plus the scores that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingProposal {
    pub mapping: ColumnMapping,
    pub explanation: Vec<RoleChoice>,
}

fn choose(
    columns: &[Column],
    role: ColumnRole,
    criteria: &ScoringCriteria,
    explanation: &mut Vec<RoleChoice>,
) -> Option<String> {
    let mut ranked = rank_columns(columns, criteria)
        .into_iter()
        .filter(|s| s.score > 0.0);
    let mut choice = ranked.next();
    let runner_up = ranked.next();

    // Every column with samples earns a bonus, so progressive needs a real keyword hit.
    if role == ColumnRole::Progressive && choice.as_ref().is_some_and(|c| c.keyword_hits == 0) {
        choice = None;
    }

    if let Some(c) = &choice {
        debug!(%role, key = %c.key, label = %c.label, score = c.score, "role assigned");
    } else {
        debug!(%role, "no column scored above zero");
    }

    let key = choice.as_ref().map(|c| c.key.clone());
    explanation.push(RoleChoice {
        role,
        choice,
        runner_up,
    });
    key
}

/// Propose a full mapping for a profiled sheet.
///
/// Roles are chosen in order code, description, price, quantity,
/// progressive; each excludes the columns already taken.
pub fn propose_mapping(
    sheet_name: &str,
    profile: &SheetProfile,
    criteria: &RoleCriteria,
) -> MappingProposal {
    let columns = &profile.columns;
    let mut explanation = Vec::new();
    let mut taken: Vec<String> = Vec::new();

    let code = choose(columns, ColumnRole::Code, &criteria.code, &mut explanation);
    taken.extend(code.iter().cloned());

    let description = choose(
        columns,
        ColumnRole::Description,
        &criteria.description.excluding(&taken),
        &mut explanation,
    );
    taken.extend(description.iter().cloned());

    let price = choose(
        columns,
        ColumnRole::Price,
        &criteria.price.excluding(&taken),
        &mut explanation,
    );
    taken.extend(price.iter().cloned());

    let quantity = choose(
        columns,
        ColumnRole::Quantity,
        &criteria.quantity.excluding(&taken),
        &mut explanation,
    );
    taken.extend(quantity.iter().cloned());

    let progressive = choose(
        columns,
        ColumnRole::Progressive,
        &criteria.progressive.excluding(&taken),
        &mut explanation,
    );

    MappingProposal {
        mapping: ColumnMapping {
            sheet_name: sheet_name.to_string(),
            header_row: profile.header.row,
            code_columns: code.into_iter().collect(),
            description_columns: description.into_iter().collect(),
            price_column: price,
            quantity_column: quantity,
            progressive_column: progressive,
        },
        explanation,
    }
}
