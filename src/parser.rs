use crate::error::{ReconError, ReconResult};
use crate::types::Dataset;
use std::path::Path;
use tracing::debug;

/// Parse a dataset file (project line items plus the company-rounds in scope).
///
/// # Example
/// ```no_run
/// use bid_recon::parser::parse_dataset;
/// use std::path::Path;
///
/// let dataset = parse_dataset(Path::new("tender.yaml"))?;
/// println!("Line items: {}", dataset.line_items.len());
/// # Ok::<(), bid_recon::error::ReconError>(())
/// ```
pub fn parse_dataset(path: &Path) -> ReconResult<Dataset> {
    let content = std::fs::read_to_string(path)?;
    let dataset = parse_dataset_str(&content)?;
    debug!(
        path = %path.display(),
        items = dataset.line_items.len(),
        companies = dataset.companies.len(),
        "parsed dataset"
    );
    Ok(dataset)
}

pub fn parse_dataset_str(content: &str) -> ReconResult<Dataset> {
    let dataset: Dataset = serde_yaml::from_str(content)?;
    check_offer_keys(&dataset)?;
    Ok(dataset)
}

/// Offer keys must be non-blank; a blank key can never be resolved.
fn check_offer_keys(dataset: &Dataset) -> ReconResult<()> {
    for item in &dataset.line_items {
        if item.offers.keys().any(|k| k.trim().is_empty()) {
            return Err(ReconError::Config(format!(
                "line item '{}' has an offer with a blank company label",
                item.code
            )));
        }
    }
    Ok(())
}
