//! # The Assessor — Scorer (C4)
//!
//! A pure function computing a vulnerability's priority score from severity,
//! CVSS, recency, and exploitation flag.
//!
//! CVSS vector parsing and base-score math (`cvss`) are orthogonal machinery
//! the Scorer reuses when a raw CVSS vector is present but no precomputed
//! score was supplied; they carry no I/O or state of their own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use the_assessor::score;
//! use the_foundation::{SourceTag, Vulnerability};
//! use chrono::Utc;
//!
//! let v = Vulnerability::new_from_source("CVE-2024-0001".into(), SourceTag::nvd(), Utc::now());
//! let s = score(&v, Utc::now());
//! assert!((0.0..=1.0).contains(&s));
//! ```

pub mod cvss;
pub mod scoring;
pub mod types;

pub use cvss::*;
pub use scoring::{rescore, score};
pub use types::*;

pub use the_foundation::CryptexResult;
