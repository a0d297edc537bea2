use crate::error::ReconResult;
use crate::types::Dataset;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write a dataset as YAML.
///
/// An existing file is copied to `<name>.yaml.bak` first.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> ReconResult<()> {
    if path.exists() {
        let backup_path = path.with_extension("yaml.bak");
        fs::copy(path, &backup_path)?;
    }

    let content = serde_yaml::to_string(dataset)?;
    fs::write(path, content)?;
    info!(
        path = %path.display(),
        items = dataset.line_items.len(),
        "dataset written"
    );
    Ok(())
}
