//! # The Interface - Read-Side Query API (spec.md section 6.2)
//!
//! The Interface is the only consumer-facing surface of the core: a
//! paginated, filterable, searchable read layer over the canonical
//! vulnerability store (`the_archive` / `the_archive_query`), with stats
//! aggregation, timeline, vendor rollups, and a trending feed. It never
//! writes CVE data itself - all mutation happens through the Merger
//! (`the_archive::merge`) and the Enrichment Queue (`the_collective`),
//! driven by the scheduler (`the_commune`).
//!
//! Traditional name: `APIServer` or `ReadAPI`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use the_interface::TheInterface;
//! use the_coordinator::TheCharter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let charter = TheCharter::the_charter_loading(None)?;
//!     let interface = TheInterface::the_awakening(charter).await?;
//!     interface.the_manifestation().await?;
//!     Ok(())
//! }
//! ```

mod error;
mod handlers;
mod rate_limit;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;

pub use the_foundation::{CryptexError, CryptexResult};

use the_archive::TheArchive;
use the_archive_query::ArchiveQuery;
use the_collective::memory::TheMemory;
use the_coordinator::TheCharter;

/// Application state shared across every handler: read access to the
/// Archive/ArchiveQuery, the shared cache (for stats memoization and rate
/// limit counters), and the charter section that governs this layer
/// (`interface.*`).
#[derive(Clone)]
pub struct AppState {
    archive: Arc<TheArchive>,
    query: Arc<ArchiveQuery>,
    memory: Arc<TheMemory>,
    charter: Arc<TheCharter>,
}

/// The Interface - the read-side API server.
pub struct TheInterface {
    bind_address: SocketAddr,
    state: AppState,
}

impl TheInterface {
    /// The Awakening - connect to the Archive and the cache, honoring the
    /// charter's `commune.host`/`commune.port` for the bind address.
    pub async fn the_awakening(charter: TheCharter) -> CryptexResult<Self> {
        tracing::info!("The Interface awakening");

        let archive = Arc::new(
            TheArchive::the_awakening(&charter.archive.database_url, charter.archive.max_connections).await?,
        );
        let query = Arc::new(ArchiveQuery::new(archive.clone()));
        let memory = Arc::new(TheMemory::the_awakening(&charter.memory.redis_url, charter.memory.ttl_seconds).await?);

        let bind_address: SocketAddr = format!("{}:{}", charter.commune.host, charter.commune.port)
            .parse()
            .map_err(|e| CryptexError::charter(format!("invalid bind address: {e}")))?;

        Ok(Self {
            bind_address,
            state: AppState {
                archive,
                query,
                memory,
                charter: Arc::new(charter),
            },
        })
    }

    /// Construct directly from already-built collaborators, for tests and
    /// for binaries (`the_commune`) that share an Archive with the scheduler.
    pub fn from_parts(bind_address: SocketAddr, archive: Arc<TheArchive>, memory: Arc<TheMemory>, charter: Arc<TheCharter>) -> Self {
        let query = Arc::new(ArchiveQuery::new(archive.clone()));
        Self {
            bind_address,
            state: AppState { archive, query, memory, charter },
        }
    }

    /// The Manifestation - start serving HTTP.
    pub async fn the_manifestation(self) -> CryptexResult<()> {
        tracing::info!("The Interface manifesting at {}", self.bind_address);

        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| CryptexError::archive(format!("failed to bind to {}: {}", self.bind_address, e)))?;

        tracing::info!("The Interface ready at {}", self.bind_address);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| CryptexError::archive(format!("server error: {e}")))?;

        Ok(())
    }
}

fn create_router(state: AppState) -> Router {
    let cors = rate_limit::cors_layer(&state.charter.interface.allowed_origins);

    let vulnerabilities = Router::new()
        .route("/", get(handlers::list_vulnerabilities))
        .route("/exploited", get(handlers::list_exploited))
        .route("/recent", get(handlers::list_recent))
        .route("/search", get(handlers::search))
        .route("/suggest", get(handlers::suggest))
        .route("/vendor/:vendor", get(handlers::list_by_vendor))
        .route("/:cve_id", get(handlers::get_vulnerability));

    let stats = Router::new()
        .route("/", get(handlers::stats))
        .route("/timeline", get(handlers::timeline))
        .route("/top-vendors", get(handlers::top_vendors))
        .route("/severity-distribution", get(handlers::severity_distribution));

    let ingestion_runs = Router::new()
        .route("/", get(handlers::list_ingestion_runs))
        .route("/:id", get(handlers::get_ingestion_run));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/vulnerabilities", vulnerabilities)
        .nest("/api/v1/stats", stats)
        .route("/api/v1/trending", get(handlers::trending))
        .route("/api/v1/sources", get(handlers::list_sources))
        .nest("/api/v1/ingestion-runs", ingestion_runs)
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_layer))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address_parses_from_charter_defaults() {
        let addr: Result<SocketAddr, _> = "127.0.0.1:8080".parse();
        assert!(addr.is_ok());
    }
}
