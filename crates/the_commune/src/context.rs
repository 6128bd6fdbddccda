//! Shared handles every job dispatch needs: the Archive, the Collective
//! (cache + enrichment + observer), and one client per source kind.
//!
//! Constructed once in `main` and cloned (cheaply, behind `Arc`) into every
//! spawned job task.

use std::sync::Arc;

use the_archive::TheArchive;
use the_collective::TheCollective;
use the_coordinator::TheCharter;
use the_infiltrator::{CisaKevClient, NvdClient, RssClient};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct JobContext {
    pub charter: Arc<TheCharter>,
    pub archive: Arc<TheArchive>,
    pub collective: Arc<TheCollective>,
    pub nvd: Arc<NvdClient>,
    pub cisa_kev: Arc<CisaKevClient>,
    pub rss: Arc<RssClient>,
    pub cancel: CancellationToken,
}
