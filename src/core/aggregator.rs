//! Comparison aggregator: one row per line item, one column group per company-round.
//!
//! Pure recomputation over the full input. Offer keys on the line items are
//! resolved here and never rewritten.

use crate::core::offer_resolver::{resolve_offer, OfferIndex};
use crate::types::{
    CompanyComparison, CompanyRoundIdentity, ComparisonRow, LineItem, PriceStats,
};
use serde::Serialize;
use tracing::debug;

/// Quantity deltas at or below this are rounding noise.
pub const QUANTITY_TOLERANCE: f64 = 1e-6;
/// Means at or below this are treated as zero for percentage deltas.
pub const MEAN_EPSILON: f64 = 1e-9;

/// Mean, min, max and population standard deviation. `None` for an empty slice.
pub fn price_stats(prices: &[f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;

    Some(PriceStats {
        mean,
        min,
        max,
        stddev: variance.sqrt(),
        count: prices.len(),
    })
}

/// `(value - reference) / reference * 100`, absent when the reference is zero.
pub fn delta_pct(value: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        None
    } else {
        Some((value - reference) / reference * 100.0)
    }
}

/// Build the comparison row for one line item.
pub fn compare_item<'a>(item: &'a LineItem, companies: &[CompanyRoundIdentity]) -> ComparisonRow<'a> {
    let index = OfferIndex::new(&item.offers);

    let mut companies_out: Vec<CompanyComparison> = companies
        .iter()
        .map(|identity| {
            let resolved = resolve_offer(identity, &item.offers, &index);
            let record = resolved.map(|r| r.record);
            CompanyComparison {
                company_name: identity.company_name.clone(),
                matched_key: resolved.map(|r| r.key.to_string()),
                unit_price: record.and_then(|r| r.unit_price),
                total_amount: record.and_then(|r| r.total_amount),
                quantity: record.and_then(|r| r.quantity),
                quantity_delta: record.and_then(|r| r.quantity_delta),
                delta_vs_project_pct: None,
                delta_vs_mean_pct: None,
            }
        })
        .collect();

    let visible: Vec<f64> = companies_out.iter().filter_map(|c| c.unit_price).collect();
    let stats = price_stats(&visible);

    for company in &mut companies_out {
        let Some(price) = company.unit_price else {
            continue;
        };
        company.delta_vs_project_pct = item
            .project_unit_price
            .and_then(|reference| delta_pct(price, reference));
        company.delta_vs_mean_pct = stats
            .filter(|s| s.mean.abs() > MEAN_EPSILON)
            .and_then(|s| delta_pct(price, s.mean));
    }

    let has_quantity_mismatch = companies_out
        .iter()
        .filter_map(|c| c.quantity_delta)
        .any(|d| d.abs() > QUANTITY_TOLERANCE);

    ComparisonRow {
        item,
        companies: companies_out,
        stats,
        has_quantity_mismatch,
    }
}

/// Compare every line item against the company-rounds in scope.
pub fn aggregate<'a>(
    items: &'a [LineItem],
    companies: &[CompanyRoundIdentity],
) -> Vec<ComparisonRow<'a>> {
    let rows: Vec<ComparisonRow<'a>> = items.iter().map(|item| compare_item(item, companies)).collect();
    debug!(
        rows = rows.len(),
        companies = companies.len(),
        "aggregated comparison matrix"
    );
    rows
}

/// Per company-round totals over the whole matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyTotals {
    pub company_name: String,
    /// Sum of offered totals (quantity × price when no total was given).
    pub total_amount: f64,
    pub priced_items: usize,
    pub missing_items: usize,
}

/// Matrix-level figures for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub rows: usize,
    pub priced_rows: usize,
    pub quantity_mismatch_rows: usize,
    pub project_total: f64,
    pub companies: Vec<CompanyTotals>,
    /// Company with the lowest total among those that priced every priced row.
    pub lowest_bidder: Option<String>,
}

fn offered_total(c: &CompanyComparison) -> Option<f64> {
    c.total_amount
        .or_else(|| Some(c.quantity? * c.unit_price?))
}

/// Summarize a matrix built by [`aggregate`] for the same `companies`.
pub fn summarize(rows: &[ComparisonRow<'_>], companies: &[CompanyRoundIdentity]) -> ComparisonSummary {
    let priced_rows = rows.iter().filter(|r| r.stats.is_some()).count();
    let project_total: f64 = rows
        .iter()
        .filter_map(|r| {
            r.item
                .project_total_amount
                .or_else(|| Some(r.item.project_quantity? * r.item.project_unit_price?))
        })
        .sum();

    let totals: Vec<CompanyTotals> = companies
        .iter()
        .enumerate()
        .map(|(idx, identity)| {
            let cells = rows.iter().filter_map(|r| r.companies.get(idx));
            let mut total_amount = 0.0;
            let mut priced_items = 0;
            let mut missing_items = 0;
            for cell in cells {
                match offered_total(cell) {
                    Some(amount) => {
                        total_amount += amount;
                        priced_items += 1;
                    }
                    None => missing_items += 1,
                }
            }
            CompanyTotals {
                company_name: identity.company_name.clone(),
                total_amount,
                priced_items,
                missing_items,
            }
        })
        .collect();

    // Complete means a visible price on every row that has price stats.
    let covers_priced_rows = |idx: usize| {
        priced_rows > 0
            && rows
                .iter()
                .filter(|r| r.stats.is_some())
                .all(|r| r.companies.get(idx).is_some_and(|c| c.unit_price.is_some()))
    };
    let lowest_bidder = totals
        .iter()
        .enumerate()
        .filter(|(idx, _)| covers_priced_rows(*idx))
        .min_by(|(_, a), (_, b)| a.total_amount.total_cmp(&b.total_amount))
        .map(|(_, t)| t.company_name.clone());

    ComparisonSummary {
        rows: rows.len(),
        priced_rows,
        quantity_mismatch_rows: rows.iter().filter(|r| r.has_quantity_mismatch).count(),
        project_total,
        companies: totals,
        lowest_bidder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OfferRecord;

    fn offer(price: Option<f64>, qty_delta: Option<f64>) -> OfferRecord {
        OfferRecord {
            unit_price: price,
            quantity: Some(1.0),
            quantity_delta: qty_delta,
            ..Default::default()
        }
    }

    #[test]
    fn test_population_stddev() {
        let stats = price_stats(&[90.0, 110.0, 100.0]).unwrap();
        assert_eq!(stats.mean, 100.0);
        assert!((stats.stddev - (200.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(price_stats(&[42.0]).unwrap().stddev, 0.0);
        assert!(price_stats(&[]).is_none());
    }

    #[test]
    fn test_delta_pct() {
        assert!((delta_pct(90.0, 100.0).unwrap() + 10.0).abs() < 1e-9);
        assert_eq!(delta_pct(1.0, 0.0), None);
    }

    #[test]
    fn test_zero_mean_has_no_mean_delta() {
        let mut item = LineItem {
            code: "A1".to_string(),
            project_unit_price: Some(0.0),
            ..Default::default()
        };
        item.offers.insert("A".to_string(), offer(Some(0.0), None));
        let ids = vec![CompanyRoundIdentity::new("A", None)];
        let row = compare_item(&item, &ids);
        assert_eq!(row.mean_price(), Some(0.0));
        assert_eq!(row.companies[0].delta_vs_mean_pct, None);
        assert_eq!(row.companies[0].delta_vs_project_pct, None);
    }

    #[test]
    fn test_missing_offer_does_not_affect_others() {
        let mut item = LineItem {
            code: "A1".to_string(),
            project_unit_price: Some(50.0),
            ..Default::default()
        };
        item.offers.insert("Acme".to_string(), offer(Some(40.0), None));
        let ids = vec![
            CompanyRoundIdentity::new("Acme", None),
            CompanyRoundIdentity::new("Zeta", None),
        ];
        let row = compare_item(&item, &ids);
        assert_eq!(row.companies[1].matched_key, None);
        assert_eq!(row.companies[1].unit_price, None);
        assert_eq!(row.stats.unwrap().count, 1);
        assert_eq!(row.stddev_price(), Some(0.0));
        assert!((row.companies[0].delta_vs_project_pct.unwrap() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_mismatch_tolerance() {
        let mut item = LineItem::default();
        item.offers.insert("A".to_string(), offer(Some(1.0), Some(1e-9)));
        let ids = vec![CompanyRoundIdentity::new("A", None)];
        assert!(!compare_item(&item, &ids).has_quantity_mismatch);

        item.offers.insert("A".to_string(), offer(Some(1.0), Some(-0.5)));
        assert!(compare_item(&item, &ids).has_quantity_mismatch);
    }

    #[test]
    fn test_summary_lowest_bidder() {
        let mut a = LineItem {
            code: "1".to_string(),
            project_quantity: Some(2.0),
            project_unit_price: Some(10.0),
            ..Default::default()
        };
        a.offers.insert("Acme".to_string(), OfferRecord {
            quantity: Some(2.0),
            unit_price: Some(9.0),
            ..Default::default()
        });
        a.offers.insert("Beta".to_string(), OfferRecord {
            quantity: Some(2.0),
            unit_price: Some(8.0),
            ..Default::default()
        });
        let mut b = LineItem {
            code: "2".to_string(),
            project_total_amount: Some(100.0),
            ..Default::default()
        };
        b.offers.insert("Acme".to_string(), OfferRecord {
            unit_price: Some(5.0),
            total_amount: Some(50.0),
            ..Default::default()
        });
        let items = vec![a, b];
        let ids = vec![
            CompanyRoundIdentity::new("Acme", None),
            CompanyRoundIdentity::new("Beta", None),
        ];
        let rows = aggregate(&items, &ids);
        let summary = summarize(&rows, &ids);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.priced_rows, 2);
        assert_eq!(summary.project_total, 120.0);
        assert_eq!(summary.companies[0].total_amount, 68.0);
        assert_eq!(summary.companies[1].missing_items, 1);
        // Beta is cheaper but did not price every line
        assert_eq!(summary.lowest_bidder.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_totals_on_unpriced_rows_do_not_make_a_bid_complete() {
        let priced = |price: f64| OfferRecord {
            quantity: Some(1.0),
            unit_price: Some(price),
            ..Default::default()
        };
        let lump_sum = OfferRecord {
            total_amount: Some(1.0),
            ..Default::default()
        };

        let mut first = LineItem { code: "1".to_string(), ..Default::default() };
        first.offers.insert("Acme".to_string(), priced(10.0));
        first.offers.insert("Beta".to_string(), priced(9.0));
        let mut second = LineItem { code: "2".to_string(), ..Default::default() };
        second.offers.insert("Acme".to_string(), priced(10.0));
        let mut third = LineItem { code: "3".to_string(), ..Default::default() };
        third.offers.insert("Beta".to_string(), lump_sum);

        let items = vec![first, second, third];
        let ids = vec![
            CompanyRoundIdentity::new("Acme", None),
            CompanyRoundIdentity::new("Beta", None),
        ];
        let rows = aggregate(&items, &ids);
        let summary = summarize(&rows, &ids);
        assert_eq!(summary.priced_rows, 2);
        assert_eq!(summary.companies[1].priced_items, 2);
        assert_eq!(summary.companies[1].total_amount, 10.0);
        // Beta counts two priced items but has no price on row 2
        assert_eq!(summary.lowest_bidder.as_deref(), Some("Acme"));
    }
}
