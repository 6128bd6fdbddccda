//! The Memory - Redis-backed Cache Layer
//!
//! Traditional name: `Cache` or `CacheService`
//!
//! Backs four distinct consumers with one Redis connection: the AI reply
//! cache (keyed by inquiry fingerprint), the dashboard/query memoization
//! cache (stats, filtered counts), the fixed-window rate limit counters, and
//! the distributed locks that keep background jobs single-flight. None of
//! these are the system of record - Postgres (`the_archive`) is - so every
//! read here degrades to "treat it as a miss" rather than failing the
//! caller when Redis is unreachable.

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use the_foundation::{CryptexError, CryptexResult, TheReply};

/// The Memory - pooled, multiplexed connection to Redis.
///
/// Traditional name: `CacheClient`
pub struct TheMemory {
    manager: redis::aio::ConnectionManager,
    default_ttl_seconds: u64,
}

impl TheMemory {
    /// The Awakening - connect to Redis.
    ///
    /// Unlike the database connection, a failure to reach Redis here is not
    /// fatal to the rest of the system by contract, but we still fail the
    /// awakening itself: a caller that explicitly asked for a cache wants to
    /// know at startup that it doesn't have one, rather than discovering it
    /// from a stream of warnings later.
    pub async fn the_awakening(redis_url: &str, default_ttl_seconds: u64) -> CryptexResult<Self> {
        tracing::info!("The Memory awakening against Redis");

        let client = redis::Client::open(redis_url)
            .map_err(|e| CryptexError::charter(format!("invalid REDIS_URL: {e}")))?;

        let manager = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| CryptexError::storage_transient(format!("redis connect failed: {e}")))?;

        tracing::info!("The Memory ready");

        Ok(Self {
            manager,
            default_ttl_seconds,
        })
    }

    // ---- AI reply cache (fingerprint -> TheReply) --------------------

    pub async fn store(&self, key: String, reply: TheReply) -> CryptexResult<()> {
        let payload = serde_json::to_string(&reply)
            .map_err(|e| CryptexError::unknown(format!("failed to serialize reply: {e}")))?;

        let mut conn = self.manager.clone();
        let redis_key = format!("reply:{key}");
        if let Err(e) = conn
            .set_ex::<_, _, ()>(&redis_key, payload, self.default_ttl_seconds)
            .await
        {
            tracing::warn!("cache store failed for {}: {}", redis_key, e);
        }

        Ok(())
    }

    pub async fn retrieve(&self, key: &str) -> CryptexResult<Option<TheReply>> {
        let redis_key = format!("reply:{key}");
        let mut conn = self.manager.clone();
        let raw: Option<String> = match conn.get(&redis_key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("cache retrieve failed for {}: {}", redis_key, e);
                return Ok(None);
            }
        };

        match raw {
            Some(s) => match serde_json::from_str(&s) {
                Ok(reply) => Ok(Some(reply)),
                Err(e) => {
                    tracing::warn!("cache entry for {} is not valid json: {}", redis_key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn contains(&self, key: &str) -> CryptexResult<bool> {
        Ok(self.retrieve(key).await?.is_some())
    }

    // ---- generic memoization (stats, filtered counts) -----------------

    /// Read a memoized JSON value. A cache outage or decode failure is
    /// reported as a miss, never an error - the caller always has the
    /// database as ground truth to fall back on.
    pub async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(key).await.ok().flatten();
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set_cached<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.manager.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, payload, ttl_seconds.max(1))
            .await
        {
            tracing::warn!("failed to memoize {}: {}", key, e);
        }
    }

    /// `dashboard:stats` helper with this instance's configured TTL.
    pub async fn get_dashboard_stats<T: DeserializeOwned>(&self) -> Option<T> {
        self.get_cached("dashboard:stats").await
    }

    pub async fn set_dashboard_stats<T: Serialize>(&self, value: &T) {
        self.set_cached("dashboard:stats", value, self.default_ttl_seconds)
            .await;
    }

    // ---- rate limiting (fixed window counters) -------------------------

    /// Increment the counter for `bucket` in the window ending now and
    /// report whether the caller is still within `limit`.
    ///
    /// Fails open: if Redis is unreachable the request is allowed through
    /// and a warning is logged, since a cache outage must not become a
    /// denial-of-service against legitimate callers.
    pub async fn rate_limit_allow(&self, bucket: &str, window_seconds: u64, limit: u64) -> bool {
        let mut conn = self.manager.clone();
        let key = format!("rate:{bucket}:{window_seconds}");

        let count: redis::RedisResult<u64> = conn.incr(&key, 1u64).await;
        let count = match count {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("rate limit check failed for {}: {}", key, e);
                return true;
            }
        };

        if count == 1 {
            if let Err(e) = conn
                .expire::<_, ()>(&key, window_seconds.max(1) as i64)
                .await
            {
                tracing::warn!("failed to set expiry for rate counter {}: {}", key, e);
            }
        }

        count <= limit
    }

    // ---- distributed locks (single-flight jobs, per-CVE enrichment) ---

    /// Best-effort mutual exclusion: `SET key token NX PX ttl`. Not a
    /// strict Redlock - a crashed holder's lock simply expires - which
    /// matches the rest of the system's "cache is a hint, not a ledger"
    /// posture. Fails open on a Redis outage: the worker proceeds as if it
    /// held the lock rather than stalling every job behind a dead cache.
    pub async fn try_lock(&self, key: &str, ttl_seconds: u64) -> (bool, String) {
        let token = uuid::Uuid::new_v4().to_string();
        let lock_key = format!("lock:{key}");
        let mut conn = self.manager.clone();

        let acquired: redis::RedisResult<bool> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg((ttl_seconds.max(1) * 1000) as i64)
            .query_async(&mut conn)
            .await
            .map(|v: Option<String>| v.is_some());

        match acquired {
            Ok(got) => (got, token),
            Err(e) => {
                tracing::warn!("lock acquisition failed for {}: {} (proceeding unlocked)", lock_key, e);
                (true, token)
            }
        }
    }

    /// Release a lock previously won with [`Self::try_lock`], only if the
    /// token still matches (so a lock that expired and was re-acquired by
    /// someone else is left alone).
    pub async fn unlock(&self, key: &str, token: &str) {
        let lock_key = format!("lock:{key}");
        let mut conn = self.manager.clone();

        let held: redis::RedisResult<Option<String>> = conn.get(&lock_key).await;
        if let Ok(Some(current)) = held {
            if current == token {
                if let Err(e) = conn.del::<_, ()>(&lock_key).await {
                    tracing::warn!("failed to release lock {}: {}", lock_key, e);
                }
            }
        }
    }

    // ---- maintenance ----------------------------------------------------

    /// The Flush - drop the AI reply cache (used on graceful shutdown and
    /// in tests). Rate limit counters, memoized query results, and locks
    /// are left alone since they carry their own TTLs and flushing them
    /// would just force every in-flight consumer to re-derive a miss.
    pub async fn the_flush(&self) -> CryptexResult<()> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = conn
            .keys("reply:*")
            .await
            .map_err(|e| CryptexError::storage_transient(format!("flush scan failed: {e}")))?;

        if !keys.is_empty() {
            conn.del::<_, ()>(&keys)
                .await
                .map_err(|e| CryptexError::storage_transient(format!("flush failed: {e}")))?;
        }

        tracing::info!("The Memory flushed {} reply cache entries", keys.len());
        Ok(())
    }

    /// Snapshot of overall cache occupancy, for `/health` and the metrics
    /// endpoint.
    pub async fn statistics(&self) -> CacheStatistics {
        let mut conn = self.manager.clone();
        let reply_entries: u64 = conn
            .keys::<_, Vec<String>>("reply:*")
            .await
            .map(|v| v.len() as u64)
            .unwrap_or(0);
        let lock_entries: u64 = conn
            .keys::<_, Vec<String>>("lock:*")
            .await
            .map(|v| v.len() as u64)
            .unwrap_or(0);

        CacheStatistics {
            reply_entries,
            lock_entries,
        }
    }
}

/// Cache occupancy snapshot.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStatistics {
    pub reply_entries: u64,
    pub lock_entries: u64,
}

#[cfg(test)]
mod tests {
    // `TheMemory` requires a live Redis connection even to construct, so
    // its behaviour is exercised indirectly by `the_collective::enrichment`
    // and `the_collective::api` tests behind a reachable cache. Pure logic
    // (struct defaults) is covered here.
    use super::*;

    #[test]
    fn test_cache_statistics_default_is_zero() {
        let stats = CacheStatistics::default();
        assert_eq!(stats.reply_entries, 0);
        assert_eq!(stats.lock_entries, 0);
    }
}
