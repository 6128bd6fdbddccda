//! The Collective - Cache Layer and Enrichment Queue coordination
//!
//! Wires The Memory (Redis cache), The Observer (metrics), the configured
//! agitators (summarizer providers), and The Archive (Postgres) together,
//! and exposes the enrichment queue plus the AI-inquiry path the agitators
//! were originally built around.

use std::sync::Arc;
use std::time::Instant;

use the_foundation::{
    AgitatorType, CryptexError, CryptexResult, TheAgitator, TheInquiry, ThePackage, TheReply,
};

use crate::enrichment::{EnrichmentReport, EnrichmentTier, TheEnrichmentQueue};
use crate::memory::TheMemory;
use crate::observer::TheObserver;
use the_agitator::{ClaudeAgitator, OpenAIAgitator};
use the_archive::TheArchive;
use the_coordinator::TheCharter;

/// The Collective - coordinates the cache layer, the summarizer providers,
/// and the enrichment queue built on top of them.
///
/// Traditional name: `AIService` or `CacheAndQueueService`
pub struct TheCollective {
    charter: Arc<TheCharter>,
    memory: Arc<TheMemory>,
    observer: Arc<TheObserver>,
    agitators: Vec<Arc<dyn TheAgitator>>,
    enrichment: Arc<TheEnrichmentQueue>,
}

impl TheCollective {
    /// The Awakening - connect to Redis, initialize metrics, and bring up
    /// whichever summarizer providers the charter has enabled.
    pub async fn the_awakening(charter: TheCharter, archive: Arc<TheArchive>) -> CryptexResult<Self> {
        tracing::info!("The Collective is awakening...");

        charter.validate().map_err(CryptexError::charter)?;

        let memory = Arc::new(
            TheMemory::the_awakening(&charter.memory.redis_url, charter.memory.ttl_seconds).await?,
        );

        let observer = Arc::new(TheObserver::the_awakening());

        let mut agitators: Vec<Arc<dyn TheAgitator>> = Vec::new();

        for agitator_config in &charter.agitators {
            if !agitator_config.enabled {
                tracing::debug!("Skipping disabled agitator: {}", agitator_config.name);
                continue;
            }

            let api_key = if let Some(ref key) = agitator_config.api_key {
                key.clone()
            } else if let Some(ref env_var) = agitator_config.api_key_env {
                std::env::var(env_var).map_err(|_| {
                    CryptexError::charter(format!(
                        "API key environment variable '{}' not found for agitator '{}'",
                        env_var, agitator_config.name
                    ))
                })?
            } else {
                return Err(CryptexError::charter(format!(
                    "No API key configured for agitator '{}'",
                    agitator_config.name
                )));
            };

            let model = agitator_config.model.clone().unwrap_or_else(|| {
                match agitator_config.agitator_type.as_str() {
                    "openai" => "gpt-4".to_string(),
                    "claude" => "claude-3-sonnet-20240229".to_string(),
                    _ => "unknown".to_string(),
                }
            });

            match agitator_config.agitator_type.as_str() {
                "openai" => {
                    let agitator = OpenAIAgitator::the_awakening(api_key, model)
                        .await
                        .map_err(|e| {
                            CryptexError::agitator(format!(
                                "Failed to initialize OpenAI agitator '{}': {}",
                                agitator_config.name, e
                            ))
                        })?
                        .with_timeout(agitator_config.timeout_seconds);

                    agitators.push(Arc::new(agitator));
                    tracing::info!("OpenAI agitator '{}' awakened successfully", agitator_config.name);
                }
                "claude" => {
                    let agitator = ClaudeAgitator::the_awakening(api_key, model)
                        .await
                        .map_err(|e| {
                            CryptexError::agitator(format!(
                                "Failed to initialize Claude agitator '{}': {}",
                                agitator_config.name, e
                            ))
                        })?
                        .with_timeout(agitator_config.timeout_seconds);

                    agitators.push(Arc::new(agitator));
                    tracing::info!("Claude agitator '{}' awakened successfully", agitator_config.name);
                }
                other => {
                    tracing::warn!(
                        "Unknown agitator type '{}' for agitator '{}', skipping",
                        other,
                        agitator_config.name
                    );
                }
            }
        }

        if agitators.is_empty() {
            tracing::warn!("No agitators initialized - enrichment will use the fallback summarizer only");
        }

        tracing::info!("The Collective has awakened with {} active agitators", agitators.len());

        let enrichment = Arc::new(TheEnrichmentQueue::new(
            Arc::clone(&archive),
            Arc::clone(&memory),
            Arc::clone(&observer),
            agitators.clone(),
        ));

        Ok(Self {
            charter: Arc::new(charter),
            memory,
            observer,
            agitators,
            enrichment,
        })
    }

    /// Run one enrichment tick against the given tier and batch size.
    pub async fn run_enrichment_tick(&self, tier: EnrichmentTier, batch_size: i64) -> CryptexResult<EnrichmentReport> {
        self.enrichment.tick(tier, batch_size).await
    }

    /// Rate-limit check for the read API: fixed window per
    /// `bucket` (typically the client IP, or "global" for the hour window).
    pub async fn rate_limit_allow(&self, bucket: &str, window_seconds: u64, limit: u32) -> bool {
        self.memory.rate_limit_allow(bucket, window_seconds, limit as u64).await
    }

    /// The Inquiry (Synchronous) - process a one-off AI inquiry outside the
    /// enrichment queue (used by ad-hoc tooling and tests).
    pub async fn the_inquiry_sync(&self, inquiry: TheInquiry) -> CryptexResult<TheReply> {
        tracing::debug!("Processing inquiry: {}", inquiry.id);

        self.observer.record_inquiry_start(&inquiry.id);
        let start_time = Instant::now();

        let fingerprint = inquiry.fingerprint();
        if let Some(cached_reply) = self.memory.retrieve(&fingerprint).await? {
            tracing::debug!("Cache hit for inquiry: {}", inquiry.id);
            self.observer.record_cache_hit();
            self.observer
                .record_inquiry_complete(&inquiry.id, start_time.elapsed(), cached_reply.certainty);
            return Ok(cached_reply);
        }

        self.observer.record_cache_miss();

        if self.agitators.is_empty() {
            let error_msg = "No agitators available - please configure AI providers";
            self.observer.record_inquiry_failed(&inquiry.id, error_msg);
            return Err(CryptexError::agitator(error_msg));
        }

        let agitator = if let Some(preferred) = &inquiry.preferred_agitator {
            self.agitators
                .iter()
                .find(|a| a.agitator_type() == *preferred)
                .ok_or_else(|| {
                    CryptexError::agitator(format!("Preferred agitator type {:?} not available", preferred))
                })?
        } else {
            &self.agitators[0]
        };

        tracing::debug!("Selected agitator: {:?} ({})", agitator.agitator_type(), agitator.the_mind());

        let package = ThePackage {
            data: inquiry.package.data.clone(),
            context: inquiry.package.context.clone(),
        };

        let agitator_name = format!("{:?}", agitator.agitator_type());
        let result = agitator.the_agitation(package).await;

        self.observer.record_agitator_request(&agitator_name, result.is_ok()).await;

        match result {
            Ok(mut reply) => {
                reply.inquiry_id = inquiry.id.clone();

                let certainty = reply.certainty;
                let duration = start_time.elapsed();

                if certainty >= self.charter.cache_threshold {
                    if let Err(e) = self.memory.store(fingerprint, reply.clone()).await {
                        tracing::warn!("Failed to cache reply: {}", e);
                    } else {
                        tracing::debug!("Reply cached with certainty {:.2}", certainty);
                    }
                }

                self.observer.record_inquiry_complete(&inquiry.id, duration, certainty);

                tracing::info!(
                    "Inquiry {} completed successfully in {:?} with certainty {:.2}",
                    inquiry.id,
                    duration,
                    certainty
                );

                Ok(reply)
            }
            Err(e) => {
                let error_msg = e.to_string();
                self.observer.record_inquiry_failed(&inquiry.id, &error_msg);
                tracing::error!("Inquiry {} failed: {}", inquiry.id, error_msg);
                Err(e)
            }
        }
    }

    /// Get current metrics.
    pub async fn the_metrics(&self) -> crate::observer::ObserverMetrics {
        self.observer.the_metrics().await
    }

    /// Get cache occupancy statistics.
    pub async fn the_memory_statistics(&self) -> crate::memory::CacheStatistics {
        self.memory.statistics().await
    }

    /// Dashboard stats cache passthrough (`dashboard:stats`), for the read
    /// API to consult before falling back to an aggregate query.
    pub fn memory(&self) -> &Arc<TheMemory> {
        &self.memory
    }

    /// The Rest - graceful shutdown: flush the AI reply cache and record
    /// final metrics.
    pub async fn the_rest(self) -> CryptexResult<()> {
        tracing::info!("The Collective is entering rest state");

        self.memory.the_flush().await?;
        self.observer.record_final_metrics();

        tracing::info!("The Collective has entered rest");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // These exercise charter wiring and error paths that don't require a
    // live Redis connection; full-stack behaviour (cache hits, enrichment
    // dispatch) is covered by `the_collective::enrichment`'s unit tests and
    // needs a reachable `REDIS_URL` to run as an integration test.
    use the_coordinator::{AgitatorConfig, ArchiveConfig, CommuneConfig, InfiltratorConfig, InterfaceConfig, LoggingConfig, MemoryConfig, PoolConfig, TheCharter};

    fn test_charter_no_agitators() -> TheCharter {
        TheCharter {
            commune: CommuneConfig::default(),
            agitators: vec![],
            archive: ArchiveConfig::default(),
            memory: MemoryConfig::default(),
            infiltrator: InfiltratorConfig::default(),
            interface: InterfaceConfig::default(),
            logging: LoggingConfig::default(),
            pool: PoolConfig::default(),
            cache_threshold: 0.8,
        }
    }

    fn test_charter_missing_api_key() -> TheCharter {
        let mut charter = test_charter_no_agitators();
        charter.agitators = vec![AgitatorConfig {
            name: "test-openai".to_string(),
            agitator_type: "openai".to_string(),
            enabled: true,
            api_key: None,
            api_key_env: Some("THE_COLLECTIVE_TEST_MISSING_KEY".to_string()),
            model: Some("gpt-4".to_string()),
            timeout_seconds: 30,
        }];
        charter
    }

    #[test]
    fn test_charter_validates_with_no_agitators() {
        assert!(test_charter_no_agitators().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_env_is_distinguishable_from_a_configured_one() {
        let charter = test_charter_missing_api_key();
        assert_eq!(charter.agitators[0].api_key, None);
        assert!(std::env::var("THE_COLLECTIVE_TEST_MISSING_KEY").is_err());
    }
}
