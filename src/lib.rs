//! Bid Recon - reconcile construction bid returns against a project estimate
//!
//! Contractors return priced bills of quantities in whatever spreadsheet
//! layout they like. This library reads those sheets, works out which
//! columns hold what, lines every offer up against the project estimate
//! and exports a live comparison workbook.
//!
//! # Features
//!
//! - Header detection and column profiling on sheets of unknown layout
//! - Explainable column-role scoring with saved, label-based presets
//! - Offer label resolution across inconsistent company/round naming
//! - Per-line statistics (mean, min, max, population std dev, deltas)
//! - Excel export where every derived value is a formula
//!
//! # Example
//!
//! ```no_run
//! use bid_recon::core::{aggregate, profile_sheet, propose_mapping, ProfileOptions, RoleCriteria};
//! use bid_recon::excel::ExcelImporter;
//! use bid_recon::parser::parse_dataset;
//! use std::path::Path;
//!
//! let sheet = ExcelImporter::new("offerta.xlsx").read_sheet_or_first(None)?;
//! let profile = profile_sheet(&sheet, &ProfileOptions::default());
//! let proposal = propose_mapping(&sheet.name, &profile, &RoleCriteria::default());
//! println!("Price column: {:?}", proposal.mapping.price_column);
//!
//! let dataset = parse_dataset(Path::new("tender.yaml"))?;
//! let rows = aggregate(&dataset.line_items, &dataset.companies);
//! println!("Rows: {}", rows.len());
//! # Ok::<(), bid_recon::error::ReconError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod parser;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use error::{ReconError, ReconResult};
pub use types::{
    CellValue, Column, ColumnMapping, CompanyRoundIdentity, ComparisonRow, Dataset, LineItem,
    OfferRecord, Sheet,
};
