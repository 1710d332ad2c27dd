//! Loading, indexing, and querying referring-expression corpora (RefCOCO, RefCOCO+, RefCOCOg).
//!
//! This crate provides utilities for:
//! - Loading the pickled ref list and COCO instances file of a dataset variant
//! - Building id and relation indexes with referential-integrity checks
//! - Filtered id queries and batch lookups through `Refer`
//! - Corpus summaries with configurable quality thresholds

pub mod index;
pub mod refer;
pub mod store;
pub mod types;
pub mod validation;

pub use index::CorpusIndex;
pub use refer::Refer;
pub use store::{load_instances, load_refs, Corpus, CorpusPaths};
pub use types::*;
pub use validation::{summarize_corpus, summarize_with_thresholds, validate_summary};
