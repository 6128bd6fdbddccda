//! # The Infiltrator — Source Clients (C1)
//!
//! Per-source bounded HTTP/RSS clients with retry/backoff and per-source
//! rate limits: NVD, CISA KEV, and RSS/Atom.
//!
//! Every client follows the same contract: `fetch(cursor?) -> (records[],
//! next_cursor?, total_estimate?)`, a lazy finite sequence restartable from
//! an opaque cursor, with no side effects beyond HTTP. Errors are classified
//! into [`error::ClientError`]'s taxonomy (retryable / rate-limited /
//! permanent / malformed) rather than raised as exceptions,
//! "exceptions for flow control" redesign note.

pub mod cisa_kev_client;
pub mod error;
pub mod nvd_client;
pub mod retry;
pub mod rss_client;

pub use cisa_kev_client::CisaKevClient;
pub use error::ClientError;
pub use nvd_client::{NvdClient, NvdPage, NvdQuery};
pub use rss_client::RssClient;

pub use the_foundation::CryptexResult;
