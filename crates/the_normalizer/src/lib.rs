//! # The Normalizer — Normalizer (C2)
//!
//! Pure, stateless projection from raw per-source records into the
//! canonical `Vulnerability`/`Article` shape. No I/O: every
//! function here is a total or partial map from an already-fetched raw
//! record to a canonical one.
//!
//! Source Clients (`the_infiltrator`) own fetching and feed/HTML parsing;
//! this crate owns only the projection step downstream of that.

pub mod cisa_kev;
pub mod cpe;
pub mod cve_id;
pub mod cwe;
pub mod nvd;
pub mod references;
pub mod rss;

pub use cisa_kev::{normalize as normalize_cisa_kev, CisaKevCatalog, CisaKevEntry};
pub use nvd::{normalize as normalize_nvd, NvdCve};
pub use rss::{normalize as normalize_feed_item, RawFeedItem};
