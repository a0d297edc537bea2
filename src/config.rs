//! Engine configuration and saved mapping presets (YAML)

use crate::core::profiler::{ProfileOptions, DEFAULT_HEADER_TOKENS};
use crate::core::scorer::RoleCriteria;
use crate::error::{ReconError, ReconResult};
use crate::excel::{ExportOptions, ExportPalette};
use crate::types::{ConfigScope, SavedImportConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Tunables for profiling, scoring and export. Every field has a default.
///
/// ```yaml
/// sample_size: 8
/// criteria:
///   price:
///     keywords: [prezzo, "p.u."]
///     prefer_currency: true
/// palette:
///   companies: ["#DDEBF7", "#FCE4D6"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub header_tokens: Vec<String>,
    pub sample_size: usize,
    pub min_header_cells: usize,
    pub criteria: RoleCriteria,
    pub export_sheet_name: String,
    pub palette: ExportPalette,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let profile = ProfileOptions::default();
        Self {
            header_tokens: DEFAULT_HEADER_TOKENS.iter().map(|t| t.to_string()).collect(),
            sample_size: profile.sample_size,
            min_header_cells: profile.min_header_cells,
            criteria: RoleCriteria::default(),
            export_sheet_name: ExportOptions::default().sheet_name,
            palette: ExportPalette::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> ReconResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> ReconResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> ReconResult<()> {
        if self.sample_size == 0 {
            return Err(ReconError::Config("sample_size must be at least 1".to_string()));
        }
        if self.min_header_cells == 0 {
            return Err(ReconError::Config(
                "min_header_cells must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn profile_options(&self) -> ProfileOptions {
        ProfileOptions {
            header_tokens: self.header_tokens.clone(),
            sample_size: self.sample_size,
            min_header_cells: self.min_header_cells,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            sheet_name: self.export_sheet_name.clone(),
            palette: self.palette.clone(),
        }
    }
}

//==============================================================================
// Saved presets
//==============================================================================

impl SavedImportConfig {
    /// Reject a project-scoped preset when no project is known.
    pub fn validate_for_save(&self, project: Option<&str>) -> ReconResult<()> {
        if self.name.trim().is_empty() {
            return Err(ReconError::Config("preset name is empty".to_string()));
        }
        if self.scope == ConfigScope::Project && project.map_or(true, |p| p.trim().is_empty()) {
            return Err(ReconError::Scope(format!(
                "preset '{}' is project-scoped but no project is selected",
                self.name
            )));
        }
        Ok(())
    }
}

pub fn load_preset(path: &Path) -> ReconResult<SavedImportConfig> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Validate, then write the preset as YAML. Nothing is written on a scope conflict.
pub fn save_preset(path: &Path, preset: &SavedImportConfig, project: Option<&str>) -> ReconResult<()> {
    preset.validate_for_save(project)?;
    let yaml = serde_yaml::to_string(preset)?;
    fs::write(path, yaml)?;
    info!(path = %path.display(), preset = %preset.name, "saved mapping preset");
    Ok(())
}
