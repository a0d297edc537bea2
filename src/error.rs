use thiserror::Error;

pub type ReconResult<T> = Result<T, ReconError>;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unreadable or corrupt workbook bytes. Terminal for that import attempt.
    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// A required role (code, price) has no column assigned.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Project-scoped preset requested without a project identity.
    #[error("Scope error: {0}")]
    Scope(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Config error: {0}")]
    Config(String),
}
