//! In-memory `RecordStore` backend.
//!
//! Records inserted typed are served as-is. Records loaded from a snapshot
//! or inserted raw are kept as JSON strings, the way the request KV store
//! holds them, so a value that fails to parse surfaces as
//! `StorageError::MalformedRecord` on read exactly like the real backend.
//! The input-URL index is an ordered list of distinct rows.
//!
//! Besides serving the CLI from a snapshot file, this backend carries a few
//! knobs for exercising failure paths: an availability switch, per-record
//! fetch delays, and a counter of `get_record` calls.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{GenerationRecord, InputAssociation};
use crate::traits::RecordStore;

/// On-disk snapshot layout accepted by [`InMemoryRecordStore::load_snapshot`].
///
/// `records` are kept as untyped JSON so that malformed entries survive the
/// load and fail on fetch instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub associations: Vec<InputAssociation>,
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

enum StoredRecord {
    Typed(GenerationRecord),
    Raw(String),
}

impl StoredRecord {
    fn decode(&self, request_id: &str) -> Result<GenerationRecord, StorageError> {
        match self {
            StoredRecord::Typed(record) => Ok(record.clone()),
            StoredRecord::Raw(raw) => {
                serde_json::from_str(raw).map_err(|e| StorageError::MalformedRecord {
                    request_id: request_id.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Distinct index rows, oldest first.
    associations: Vec<InputAssociation>,
    /// Records keyed by request id.
    records: HashMap<String, StoredRecord>,
    /// Artificial latency applied to `get_record` for specific ids.
    delays: HashMap<String, Duration>,
}

impl Inner {
    fn push_association(&mut self, association: InputAssociation) {
        if !self.associations.contains(&association) {
            self.associations.push(association);
        }
    }
}

/// A `RecordStore` held entirely in memory.
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
    fetches: AtomicU64,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            available: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
        }
    }

    /// Build a store from a parsed snapshot.
    ///
    /// Record values without a string `requestId` cannot be keyed and are
    /// dropped with a warning.
    pub fn from_snapshot(snapshot: RecordSnapshot) -> Self {
        let mut inner = Inner::default();
        for association in snapshot.associations {
            inner.push_association(association);
        }
        for value in snapshot.records {
            match value.get("requestId").and_then(|v| v.as_str()) {
                Some(request_id) => {
                    inner
                        .records
                        .insert(request_id.to_string(), StoredRecord::Raw(value.to_string()));
                }
                None => {
                    tracing::warn!(record = %value, "snapshot record has no requestId; dropped");
                }
            }
        }
        Self {
            inner: RwLock::new(inner),
            available: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
        }
    }

    /// Read and parse a JSON snapshot file.
    pub fn load_snapshot(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Backend(format!("could not read '{}': {}", path.display(), e))
        })?;
        let snapshot: RecordSnapshot = serde_json::from_str(&content).map_err(|e| {
            StorageError::Backend(format!("could not parse '{}': {}", path.display(), e))
        })?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Store a record and index it under `input_url`.
    pub async fn insert(&self, input_url: impl Into<String>, record: GenerationRecord) {
        let mut inner = self.inner.write().await;
        inner.push_association(InputAssociation {
            input_url: input_url.into(),
            request_id: record.request_id.clone(),
        });
        inner
            .records
            .insert(record.request_id.clone(), StoredRecord::Typed(record));
    }

    /// Store an arbitrary raw value under `request_id` without touching the index.
    pub async fn insert_raw(&self, request_id: impl Into<String>, raw: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner
            .records
            .insert(request_id.into(), StoredRecord::Raw(raw.into()));
    }

    /// Add an index row without storing a record.
    pub async fn add_association(&self, input_url: impl Into<String>, request_id: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.push_association(InputAssociation {
            input_url: input_url.into(),
            request_id: request_id.into(),
        });
    }

    /// Delete the stored record only; index rows pointing at it remain.
    pub async fn remove_record(&self, request_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.records.remove(request_id).is_some()
    }

    /// Delete a request from both the record map and the index.
    pub async fn remove_request(&self, request_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.associations.len();
        inner.associations.retain(|a| a.request_id != request_id);
        let removed_rows = inner.associations.len() != before;
        inner.records.remove(request_id).is_some() || removed_rows
    }

    /// Delay every `get_record` for `request_id` by `delay`.
    pub async fn set_fetch_delay(&self, request_id: impl Into<String>, delay: Duration) {
        let mut inner = self.inner.write().await;
        inner.delays.insert(request_id.into(), delay);
    }

    /// Toggle availability. While unavailable every call fails with
    /// `StorageError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `get_record` calls served so far, successful or not.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "in-memory store switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_distinct_input_associations(
        &self,
    ) -> Result<Vec<InputAssociation>, StorageError> {
        self.check_available()?;
        Ok(self.inner.read().await.associations.clone())
    }

    async fn count_distinct_requests(&self) -> Result<u64, StorageError> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let distinct: HashSet<&str> = inner
            .associations
            .iter()
            .map(|a| a.request_id.as_str())
            .collect();
        Ok(distinct.len() as u64)
    }

    async fn get_record(&self, request_id: &str) -> Result<GenerationRecord, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let (decoded, delay) = {
            let inner = self.inner.read().await;
            (
                inner
                    .records
                    .get(request_id)
                    .map(|stored| stored.decode(request_id)),
                inner.delays.get(request_id).copied(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        decoded.unwrap_or_else(|| {
            Err(StorageError::RecordNotFound {
                request_id: request_id.to_string(),
            })
        })
    }

    async fn request_ids_for_input(&self, input_url: &str) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .associations
            .iter()
            .filter(|a| a.input_url == input_url)
            .map(|a| a.request_id.clone())
            .collect())
    }
}
