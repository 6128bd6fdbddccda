//! # The Collective - Cache Layer and Enrichment Queue
//!
//! The Collective owns the two pieces of the system that sit between the
//! transactional store and everything else that reads it: The Memory (a
//! Redis-backed cache for dashboard stats, filtered-query counts, rate limit
//! counters, and distributed locks) and the enrichment queue that turns
//! freshly merged vulnerabilities into plain-language summaries.
//!
//! ## Philosophy
//!
//! > "Security through autonomy, not authority"
//! > "Decentralized power, distributed knowledge"
//! > "No gods, no masters, no memory leaks"
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         The Collective                   │
//! │  ┌─────────────────────────────────────┐│
//! │  │  The Memory (Redis cache + locks)   ││
//! │  └─────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────┐│
//! │  │  The Enrichment Queue               ││
//! │  │  • priority-tiered selection         ││
//! │  │  • Agitators (OpenAI / Claude)       ││
//! │  │  • rule-based fallback               ││
//! │  └─────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────┐│
//! │  │  The Observer (Metrics)             ││
//! │  └─────────────────────────────────────┘│
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use the_collective::TheCollective;
//! use the_collective::enrichment::EnrichmentTier;
//! use the_archive::TheArchive;
//! use the_coordinator::TheCharter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let charter = TheCharter::the_charter_loading(None)?;
//!     let archive = Arc::new(TheArchive::the_awakening(&charter.archive.database_url, charter.archive.max_connections).await?);
//!
//!     let collective = TheCollective::the_awakening(charter, archive).await?;
//!
//!     let report = collective.run_enrichment_tick(EnrichmentTier::High, 25).await?;
//!     println!("summarized {} entries", report.summarized_by_agitator + report.summarized_by_fallback);
//!
//!     collective.the_rest().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod enrichment;
pub mod error;
pub mod memory;
pub mod observer;

pub use api::TheCollective;
pub use error::{CryptexError, CryptexResult};
pub use the_foundation::{AgitatorType, TaskType, TheCertainty, TheInquiry, ThePackage, TheReply};

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use the_coordinator::LoggingConfig;

/// Holds the non-blocking file appender's flush guard for the process
/// lifetime; dropping it would silently stop the file sink.
static LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// The Chronicler - initialize structured logging for the whole workspace.
///
/// `RUST_LOG`, when set, wins outright (it lets an operator override the
/// charter without touching config). Otherwise the charter's `logging`
/// section drives the filter: `LOG_LEVEL` (`logging.log_level`) becomes the
/// `EnvFilter` directive, and `LOG_FILE` (`logging.log_file`) - when present
/// - adds a non-blocking file sink alongside stdout rather than replacing
/// it. Both binaries (`the_interface_server`, `cryptex-scheduler`) call this
/// once, after loading their charter, so logging is unified across the
/// workspace.
pub fn the_chronicler_awakening(logging: &LoggingConfig) -> CryptexResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.log_level));

    match &logging.log_file {
        Some(path) => {
            let (dir, filename) = split_log_path(path);
            let (non_blocking, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, filename));
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    tracing::info!("The Chronicler has awakened - logging initialized");

    Ok(())
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cryptex.log".to_string());
    (dir, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chronicler_awakening() {
        let result = the_chronicler_awakening(&LoggingConfig::default());
        // May fail if a subscriber is already installed by another test in
        // the same binary, which is fine - logging is best-effort here.
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_split_log_path_with_directory() {
        let (dir, filename) = split_log_path(Path::new("/var/log/cryptex/app.log"));
        assert_eq!(dir, PathBuf::from("/var/log/cryptex"));
        assert_eq!(filename, "app.log");
    }

    #[test]
    fn test_split_log_path_bare_filename() {
        let (dir, filename) = split_log_path(Path::new("app.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(filename, "app.log");
    }
}
