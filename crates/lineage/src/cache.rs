//! Chain cache.
//!
//! Chains are recomputed only when the cache signal read from the store
//! differs from the one recorded with the cached chains. The signal and the
//! chains live in one `Arc`'d entry that is swapped whole, so concurrent
//! passes racing a miss can only ever leave one pass's pair behind.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use yinyang_storage::{InputAssociation, RecordStore, StorageError};

use crate::assemble::Chain;
use crate::config::{LineageConfig, SignalMode};
use crate::issue::LineageIssue;
use crate::pass::reconstruct;

/// Cheap fingerprint of the record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum CacheSignal {
    DistinctCount(u64),
    ContentDigest(String),
}

impl CacheSignal {
    /// Signal of one index listing. Agrees with what `ChainCache` reads from
    /// the store for the same index.
    pub fn from_index(mode: SignalMode, associations: &[InputAssociation]) -> Self {
        match mode {
            SignalMode::DistinctCount => {
                let distinct: HashSet<&str> =
                    associations.iter().map(|a| a.request_id.as_str()).collect();
                CacheSignal::DistinctCount(distinct.len() as u64)
            }
            SignalMode::ContentDigest => {
                let mut hasher = Sha256::new();
                for a in associations {
                    hasher.update(a.input_url.as_bytes());
                    hasher.update([0u8]);
                    hasher.update(a.request_id.as_bytes());
                    hasher.update([b'\n']);
                }
                CacheSignal::ContentDigest(hex::encode(hasher.finalize()))
            }
        }
    }
}

/// How a [`ChainsView`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Recomputed on this call.
    Fresh,
    /// Signal unchanged; served from the cache.
    Cached,
    /// Store unreachable; the last good result is served.
    Stale,
    /// Store unreachable and nothing cached yet; chains are empty.
    Unavailable,
}

/// What `get` hands to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ChainsView {
    pub chains: Arc<Vec<Chain>>,
    pub from_cache: bool,
    pub status: CacheStatus,
    pub issues: Arc<Vec<LineageIssue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<CacheSignal>,
    /// RFC 3339 time the served chains were computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<String>,
}

#[derive(Debug)]
struct CacheEntry {
    /// `None` once invalidated: the chains are kept as a fallback but never
    /// match a live signal.
    signal: Option<CacheSignal>,
    chains: Arc<Vec<Chain>>,
    issues: Arc<Vec<LineageIssue>>,
    computed_at: String,
}

impl CacheEntry {
    fn view(&self, status: CacheStatus) -> ChainsView {
        ChainsView {
            chains: Arc::clone(&self.chains),
            from_cache: status != CacheStatus::Fresh,
            status,
            issues: Arc::clone(&self.issues),
            signal: self.signal.clone(),
            computed_at: Some(self.computed_at.clone()),
        }
    }
}

/// Memoized chain reconstruction over one record store.
///
/// Construct once per process and share (it is `Send + Sync`); the cached
/// state lives as long as the `ChainCache` does.
pub struct ChainCache<S: RecordStore> {
    store: Arc<S>,
    config: LineageConfig,
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl<S: RecordStore> ChainCache<S> {
    pub fn new(store: Arc<S>, config: LineageConfig) -> Self {
        Self {
            store,
            config,
            entry: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Current chains, recomputed only if the signal moved.
    ///
    /// Never fails: an unreachable store degrades to the last good result,
    /// or to an empty `Unavailable` view.
    pub async fn get(&self) -> ChainsView {
        let signal = match self.current_signal().await {
            Ok(signal) => signal,
            Err(e) => return self.degraded(&e).await,
        };

        let cached = self.entry.read().await.clone();
        if let Some(entry) = cached {
            if entry.signal.as_ref() == Some(&signal) {
                tracing::debug!(signal = ?signal, "chain cache hit");
                return entry.view(CacheStatus::Cached);
            }
        }

        tracing::info!(signal = ?signal, "chain cache miss; reconstructing");
        match reconstruct(self.store.as_ref(), &self.config).await {
            Ok(reconstruction) => {
                if reconstruction.signal != signal {
                    tracing::debug!(
                        read = ?signal,
                        listed = ?reconstruction.signal,
                        "record set changed during reconstruction"
                    );
                }
                let entry = Arc::new(CacheEntry {
                    signal: Some(reconstruction.signal),
                    chains: Arc::new(reconstruction.chains),
                    issues: Arc::new(reconstruction.issues),
                    computed_at: now_rfc3339(),
                });
                *self.entry.write().await = Some(Arc::clone(&entry));
                entry.view(CacheStatus::Fresh)
            }
            Err(e) => self.degraded(&e).await,
        }
    }

    /// Force the next `get` to recompute. The current chains stay available
    /// as the fallback for an unreachable store.
    pub async fn invalidate(&self) {
        let mut slot = self.entry.write().await;
        let invalidated = slot.as_ref().map(|entry| {
            Arc::new(CacheEntry {
                signal: None,
                chains: Arc::clone(&entry.chains),
                issues: Arc::clone(&entry.issues),
                computed_at: entry.computed_at.clone(),
            })
        });
        if invalidated.is_some() {
            *slot = invalidated;
        }
    }

    async fn current_signal(&self) -> Result<CacheSignal, StorageError> {
        match self.config.signal {
            SignalMode::DistinctCount => Ok(CacheSignal::DistinctCount(
                self.store.count_distinct_requests().await?,
            )),
            SignalMode::ContentDigest => {
                let associations = self.store.list_distinct_input_associations().await?;
                Ok(CacheSignal::from_index(SignalMode::ContentDigest, &associations))
            }
        }
    }

    async fn degraded(&self, error: &StorageError) -> ChainsView {
        let cached = self.entry.read().await.clone();
        match cached {
            Some(entry) => {
                tracing::warn!(error = %error, "record store unavailable; serving last good chains");
                entry.view(CacheStatus::Stale)
            }
            None => {
                tracing::warn!(error = %error, "record store unavailable and no chains cached");
                ChainsView {
                    chains: Arc::new(Vec::new()),
                    from_cache: false,
                    status: CacheStatus::Unavailable,
                    issues: Arc::new(Vec::new()),
                    signal: None,
                    computed_at: None,
                }
            }
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("unknown"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use yinyang_storage::{GenerationRecord, InMemoryRecordStore};

    use super::*;

    const HOST: &str = "https://images.yinyang.computerpho.be";

    async fn store_with_roots(n: usize) -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        for i in 0..n {
            store
                .insert(
                    format!("https://uploads.example/{i}.png"),
                    GenerationRecord::new(format!("r{i}"), None),
                )
                .await;
        }
        store
    }

    #[tokio::test]
    async fn signal_five_five_seven() {
        let store = store_with_roots(5).await;
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());

        let first = cache.get().await;
        assert_eq!(first.status, CacheStatus::Fresh);
        assert!(!first.from_cache);
        assert_eq!(first.signal, Some(CacheSignal::DistinctCount(5)));
        assert_eq!(first.chains.len(), 5);
        assert_eq!(store.fetch_count(), 5);

        let second = cache.get().await;
        assert_eq!(second.status, CacheStatus::Cached);
        assert!(second.from_cache);
        assert_eq!(store.fetch_count(), 5, "cache hit must not re-fetch");
        assert_eq!(second.chains, first.chains);

        store
            .insert(
                format!("{HOST}/r0.good.png"),
                GenerationRecord::new("r5", Some(format!("{HOST}/r0.good.png"))),
            )
            .await;
        store
            .insert(
                "https://uploads.example/6.png",
                GenerationRecord::new("r6", None),
            )
            .await;

        let third = cache.get().await;
        assert_eq!(third.status, CacheStatus::Fresh);
        assert_eq!(third.signal, Some(CacheSignal::DistinctCount(7)));
        assert_eq!(store.fetch_count(), 12);
        assert!(third
            .chains
            .iter()
            .any(|c| c.request_ids() == vec!["r0", "r5"]));
    }

    #[tokio::test]
    async fn count_preserving_churn_is_a_false_hit_under_distinct_count() {
        let store = store_with_roots(2).await;
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());
        let before = cache.get().await;

        store.remove_request("r1").await;
        store
            .insert(
                "https://uploads.example/x.png",
                GenerationRecord::new("rx", None),
            )
            .await;

        let after = cache.get().await;
        assert_eq!(after.status, CacheStatus::Cached);
        assert_eq!(after.chains, before.chains);
    }

    #[tokio::test]
    async fn content_digest_catches_count_preserving_churn() {
        let store = store_with_roots(2).await;
        let config = LineageConfig {
            signal: SignalMode::ContentDigest,
            ..LineageConfig::default()
        };
        let cache = ChainCache::new(Arc::clone(&store), config);
        let before = cache.get().await;
        assert!(matches!(before.signal, Some(CacheSignal::ContentDigest(ref d)) if d.len() == 64));
        assert_eq!(cache.get().await.status, CacheStatus::Cached);

        store.remove_request("r1").await;
        store
            .insert(
                "https://uploads.example/x.png",
                GenerationRecord::new("rx", None),
            )
            .await;

        let after = cache.get().await;
        assert_eq!(after.status, CacheStatus::Fresh);
        assert_ne!(after.signal, before.signal);
        assert!(after.chains.iter().any(|c| c.leaf().request_id == "rx"));
    }

    #[tokio::test]
    async fn unavailable_store_serves_last_good_chains() {
        let store = store_with_roots(3).await;
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());
        let good = cache.get().await;

        store.set_available(false);
        let stale = cache.get().await;
        assert_eq!(stale.status, CacheStatus::Stale);
        assert!(stale.from_cache);
        assert_eq!(stale.chains, good.chains);

        store.set_available(true);
        assert_eq!(cache.get().await.status, CacheStatus::Cached);
    }

    #[tokio::test]
    async fn unavailable_store_with_empty_cache_is_explicit() {
        let store = store_with_roots(3).await;
        store.set_available(false);
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());

        let view = cache.get().await;
        assert_eq!(view.status, CacheStatus::Unavailable);
        assert!(view.chains.is_empty());
        assert!(!view.from_cache);

        store.set_available(true);
        assert_eq!(cache.get().await.status, CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute_but_keeps_fallback() {
        let store = store_with_roots(2).await;
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());
        let first = cache.get().await;

        cache.invalidate().await;
        store.set_available(false);
        let stale = cache.get().await;
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(stale.chains, first.chains);

        store.set_available(true);
        assert_eq!(cache.get().await.status, CacheStatus::Fresh);
        assert_eq!(store.fetch_count(), 4);
    }

    /// Deletes `r1` right after serving the first count, so the count and
    /// the listing the pass reads next disagree.
    struct ShrinksAfterCount {
        inner: InMemoryRecordStore,
        shrunk: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for ShrinksAfterCount {
        async fn list_distinct_input_associations(
            &self,
        ) -> Result<Vec<InputAssociation>, StorageError> {
            self.inner.list_distinct_input_associations().await
        }

        async fn count_distinct_requests(&self) -> Result<u64, StorageError> {
            let count = self.inner.count_distinct_requests().await?;
            if !self.shrunk.swap(true, Ordering::SeqCst) {
                self.inner.remove_request("r1").await;
            }
            Ok(count)
        }

        async fn get_record(&self, request_id: &str) -> Result<GenerationRecord, StorageError> {
            self.inner.get_record(request_id).await
        }

        async fn request_ids_for_input(
            &self,
            input_url: &str,
        ) -> Result<Vec<String>, StorageError> {
            self.inner.request_ids_for_input(input_url).await
        }
    }

    #[tokio::test]
    async fn entry_signal_matches_the_listing_its_chains_came_from() {
        let inner = InMemoryRecordStore::new();
        for i in 0..3 {
            inner
                .insert(
                    format!("https://uploads.example/{i}.png"),
                    GenerationRecord::new(format!("r{i}"), None),
                )
                .await;
        }
        let store = Arc::new(ShrinksAfterCount {
            inner,
            shrunk: AtomicBool::new(false),
        });
        let cache = ChainCache::new(Arc::clone(&store), LineageConfig::default());

        let first = cache.get().await;
        assert_eq!(first.status, CacheStatus::Fresh);
        assert_eq!(first.chains.len(), 2);
        assert_eq!(first.signal, Some(CacheSignal::DistinctCount(2)));

        let second = cache.get().await;
        assert_eq!(second.status, CacheStatus::Cached);
        assert_eq!(second.chains, first.chains);
    }

    #[test]
    fn index_signal_counts_request_ids_not_rows() {
        let row = |input_url: &str, request_id: &str| InputAssociation {
            input_url: input_url.to_string(),
            request_id: request_id.to_string(),
        };
        let rows = vec![row("https://in/a.png", "r0"), row("https://in/b.png", "r0")];
        assert_eq!(
            CacheSignal::from_index(SignalMode::DistinctCount, &rows),
            CacheSignal::DistinctCount(1)
        );
        assert_ne!(
            CacheSignal::from_index(SignalMode::ContentDigest, &rows),
            CacheSignal::from_index(SignalMode::ContentDigest, &rows[..1])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_leave_a_consistent_entry() {
        let store = store_with_roots(8).await;
        let cache = Arc::new(ChainCache::new(Arc::clone(&store), LineageConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let c = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { c.get().await }));
        }
        for handle in handles {
            let view = handle.await.expect("task panic");
            assert_eq!(view.signal, Some(CacheSignal::DistinctCount(8)));
            assert_eq!(view.chains.len(), 8);
        }

        let settled = cache.get().await;
        assert_eq!(settled.status, CacheStatus::Cached);
        assert_eq!(settled.chains.len(), 8);
    }

    #[tokio::test]
    async fn view_serializes_for_presentation() {
        let store = store_with_roots(1).await;
        let cache = ChainCache::new(store, LineageConfig::default());
        let value = serde_json::to_value(cache.get().await).unwrap();
        assert_eq!(value["from_cache"], serde_json::json!(false));
        assert_eq!(value["status"], serde_json::json!("fresh"));
        assert_eq!(
            value["signal"],
            serde_json::json!({"kind": "distinct-count", "value": 1})
        );
        assert_eq!(value["chains"][0][0]["request_id"], serde_json::json!("r0"));
    }
}
