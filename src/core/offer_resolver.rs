//! Offer label resolver: finds a company-round's offer among raw import keys.
//!
//! Importers label offers inconsistently ("Acme (Round 2)", "ACME round 2",
//! "Acme - Round 2"). Candidate labels are generated from every name an
//! identity goes by, matched exactly against a trimmed/lowercased index,
//! then by containment in either direction.

use crate::types::{CompanyRoundIdentity, OfferRecord};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use tracing::debug;

/// Trimmed, lowercased, inner whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case-insensitive lookup from normalized label to the raw offer key.
#[derive(Debug, Clone, Default)]
pub struct OfferIndex<'a> {
    by_normalized: HashMap<String, &'a str>,
}

impl<'a> OfferIndex<'a> {
    /// Build the index. On normalized collisions the first key in map order is kept.
    pub fn new(offers: &'a BTreeMap<String, OfferRecord>) -> Self {
        let mut by_normalized = HashMap::with_capacity(offers.len());
        for key in offers.keys() {
            by_normalized
                .entry(normalize_label(key))
                .or_insert(key.as_str());
        }
        Self { by_normalized }
    }

    pub fn get(&self, normalized: &str) -> Option<&'a str> {
        self.by_normalized.get(normalized).copied()
    }
}

fn round_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:\(\s*round\s*\d+\s*\)|-?\s*\bround\s+\d+)\s*$")
            .expect("valid round suffix pattern")
    })
}

/// Company name without a trailing round marker ("Acme (Round 2)" → "Acme").
pub fn strip_round_suffix(label: &str) -> String {
    round_suffix().replace(label, "").trim().to_string()
}

fn round_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bround\s*(\d+)\b").expect("valid round marker pattern"))
}

/// Round number written into a raw offer key, if any ("Acme (Round 1) bis" → 1).
pub fn explicit_round(label: &str) -> Option<u32> {
    round_marker()
        .captures_iter(label)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Every label the identity's offer might have been filed under, lowercased and deduplicated.
///
/// Round-bearing labels come first; bare company names are only tried after
/// every round-specific spelling has missed.
pub fn candidate_labels(identity: &CompanyRoundIdentity) -> Vec<String> {
    let stripped = strip_round_suffix(&identity.company_name);
    let bases: Vec<&str> = [
        Some(stripped.as_str()),
        identity.original_company_label.as_deref(),
        identity.normalized_label.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|b| !b.is_empty())
    .collect();
    let round_label = identity
        .round_label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    let mut candidates: Vec<String> = Vec::new();
    let mut push = |label: String| {
        let normalized = normalize_label(&label);
        if !normalized.is_empty() && !candidates.contains(&normalized) {
            candidates.push(normalized);
        }
    };

    push(identity.company_name.clone());
    for base in &bases {
        if let Some(n) = identity.round_number {
            push(format!("{} (Round {})", base, n));
            push(format!("{} Round {}", base, n));
            push(format!("{} - Round {}", base, n));
        }
        if let Some(label) = round_label {
            push(format!("{} ({})", base, label));
            push(format!("{} - {}", base, label));
        }
    }
    for base in &bases {
        push(base.to_string());
    }

    candidates
}

/// How an offer was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOffer<'a> {
    pub key: &'a str,
    pub record: &'a OfferRecord,
    pub matched_by: MatchKind,
}

/// Find the single best offer for `identity`, or `None` if it has none on this line.
///
/// Exact normalized matches always win. The containment fallback ignores keys
/// naming a different round, then prefers the shortest raw key and the
/// alphabetically first, so the result does not depend on how the offers map
/// was populated.
pub fn resolve_offer<'a>(
    identity: &CompanyRoundIdentity,
    offers: &'a BTreeMap<String, OfferRecord>,
    index: &OfferIndex<'a>,
) -> Option<ResolvedOffer<'a>> {
    let candidates = candidate_labels(identity);

    for candidate in &candidates {
        if let Some(key) = index.get(candidate) {
            if let Some(record) = offers.get(key) {
                debug!(company = %identity.company_name, key, "offer matched exactly");
                return Some(ResolvedOffer {
                    key,
                    record,
                    matched_by: MatchKind::Exact,
                });
            }
        }
    }

    let best = offers
        .iter()
        .filter(|(key, _)| match (identity.round_number, explicit_round(key)) {
            (Some(wanted), Some(found)) => wanted == found,
            _ => true,
        })
        .map(|(key, record)| (key, normalize_label(key), record))
        .filter(|(_, normalized, _)| {
            !normalized.is_empty()
                && candidates
                    .iter()
                    .any(|c| normalized.contains(c.as_str()) || c.contains(normalized.as_str()))
        })
        .min_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.1.cmp(&b.1)));

    match best {
        Some((key, _, record)) => {
            debug!(company = %identity.company_name, key = %key, "offer matched by containment");
            Some(ResolvedOffer {
                key: key.as_str(),
                record,
                matched_by: MatchKind::Substring,
            })
        }
        None => {
            debug!(company = %identity.company_name, "no offer for company on this line");
            None
        }
    }
}
