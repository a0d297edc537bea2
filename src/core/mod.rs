//! Bid reconciliation engine
//!
//! Pure, synchronous functions over fully materialized inputs. Every call
//! recomputes from scratch; nothing here holds state between calls.

pub mod aggregator;
pub mod extract;
pub mod mapping;
pub mod numeric;
pub mod offer_resolver;
pub mod profiler;
pub mod scorer;

pub use aggregator::{aggregate, summarize, ComparisonSummary};
pub use mapping::{resolve_saved_mapping, ResolvedMapping};
pub use offer_resolver::{resolve_offer, OfferIndex};
pub use profiler::{profile_sheet, ProfileOptions, SheetProfile};
pub use scorer::{propose_mapping, select_column, MappingProposal, RoleCriteria, ScoringCriteria};
