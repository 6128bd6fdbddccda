//! # The Foundation - Core Types and Traits for CRYPTEX
//!
//! The Foundation provides the shared types, traits, and error handling
//! used across all CRYPTEX crates, breaking circular dependencies.

pub mod error;
pub mod models;
pub mod platform;
pub mod traits;

// Re-exports
pub use error::{CryptexError, CryptexResult};
pub use models::{
    AgitatorType, Article, IngestionRun, IngestionRunStatus, NewsSource, Reference,
    ReferenceType, Severity, SourceTag, SourceTagPayload, TaskType, TheCertainty, TheInquiry,
    ThePackage, TheReply, Vulnerability,
};
pub use traits::TheAgitator;

/// Source-priority ranking used by the Merger when two sources both supply a
/// non-absent scalar value for the same field. Higher entries win.
///
/// Grounded on `deduplicator.py`'s `source_priority` dict: CISA's KEV catalog
/// is the most authoritative (an advisory body confirming active
/// exploitation), NVD is the comprehensive official record, everything else
/// ranks below by first-seen order.
pub const SOURCE_PRIORITY: &[&str] = &["cisa_kev", "nvd", "bsi_cert", "eu_cve_search"];

/// Rank a source tag for merge precedence; unknown sources rank below every
/// named one, in the order they're first encountered by the caller.
pub fn source_priority_rank(source: &str) -> usize {
    SOURCE_PRIORITY
        .iter()
        .position(|s| *s == source)
        .unwrap_or(SOURCE_PRIORITY.len())
}
