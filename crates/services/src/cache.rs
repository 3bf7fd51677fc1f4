//! # Bucket cache
//!
//! Holds the last-loaded document and its backing reference for every bucket.
//! Each bucket has its own async mutex, so concurrent callers for the same
//! bucket queue behind a single in-flight load or write while other buckets
//! proceed independently.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use domains::{BlobRef, BlobStore, Bucket, Document, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a document mutation.
pub enum Change<T> {
    /// The document was modified and must be written back.
    Persist(T),
    /// Nothing changed; skip the write.
    Unchanged(T),
}

#[derive(Default)]
struct Slot {
    reference: Option<BlobRef>,
    document: Option<Document>,
}

/// Diagnostic view of one bucket slot.
#[derive(Debug, Clone, Serialize)]
pub struct BucketState {
    pub bucket: String,
    pub reference: Option<String>,
    pub cached: bool,
    pub sequence: Option<u64>,
}

pub struct BucketCache {
    store: Arc<dyn BlobStore>,
    slots: DashMap<Bucket, Arc<Mutex<Slot>>>,
    global_fallback: Option<BlobRef>,
}

impl BucketCache {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            slots: DashMap::new(),
            global_fallback: None,
        }
    }

    /// Reference to load the global bucket from when the store cannot name one.
    pub fn with_global_fallback(mut self, reference: Option<BlobRef>) -> Self {
        self.global_fallback = reference;
        self
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    fn slot(&self, bucket: &Bucket) -> Arc<Mutex<Slot>> {
        self.slots.entry(bucket.clone()).or_default().clone()
    }

    /// Returns the bucket's document, loading it on a miss.
    ///
    /// Never fails: an unreachable or corrupt store yields an empty document.
    pub async fn read(&self, bucket: &Bucket) -> Document {
        let slot = self.slot(bucket);
        let mut slot = slot.lock().await;
        self.ensure_loaded(bucket, &mut slot).await;
        slot.document.clone().unwrap_or_default()
    }

    /// Applies `apply` to a copy of the bucket's document and persists it.
    ///
    /// An error from `apply` aborts with nothing written. A write conflict
    /// reloads the bucket and applies the mutation once more.
    pub async fn update<T, F>(&self, bucket: &Bucket, mut apply: F) -> Result<T>
    where
        F: FnMut(&mut Document) -> Result<Change<T>>,
    {
        let slot = self.slot(bucket);
        let mut slot = slot.lock().await;
        let mut retried = false;

        loop {
            self.ensure_loaded(bucket, &mut slot).await;
            let mut draft = slot.document.clone().unwrap_or_default();

            let value = match apply(&mut draft)? {
                Change::Unchanged(value) => return Ok(value),
                Change::Persist(value) => value,
            };

            draft.sequence += 1;
            draft.last_updated = Utc::now();

            match self.store.store(bucket, &draft).await {
                Ok(reference) => {
                    info!(%bucket, %reference, sequence = draft.sequence, "bucket saved");
                    slot.reference = Some(reference);
                    slot.document = Some(draft);
                    return Ok(value);
                }
                Err(err) if err.is_conflict() && !retried => {
                    warn!(%bucket, error = %err, "stale bucket, reloading before retry");
                    retried = true;
                    *slot = Slot::default();
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Drops the cached document and reference for one bucket.
    pub async fn invalidate(&self, bucket: &Bucket) {
        let slot = self.slots.get(bucket).map(|s| s.value().clone());
        if let Some(slot) = slot {
            *slot.lock().await = Slot::default();
            debug!(%bucket, "bucket invalidated");
        }
    }

    /// Drops every cached bucket.
    pub async fn clear(&self) {
        let slots: Vec<_> = self.slots.iter().map(|e| e.value().clone()).collect();
        for slot in slots {
            *slot.lock().await = Slot::default();
        }
        info!("bucket cache cleared");
    }

    pub async fn snapshot(&self) -> Vec<BucketState> {
        let entries: Vec<_> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut states = Vec::with_capacity(entries.len());
        for (bucket, slot) in entries {
            let slot = slot.lock().await;
            states.push(BucketState {
                bucket: bucket.key(),
                reference: slot.reference.as_ref().map(ToString::to_string),
                cached: slot.document.is_some(),
                sequence: slot.document.as_ref().map(|d| d.sequence),
            });
        }
        states.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        states
    }

    async fn ensure_loaded(&self, bucket: &Bucket, slot: &mut Slot) {
        if slot.document.is_some() {
            return;
        }

        let reference = match slot.reference.clone() {
            Some(reference) => Some(reference),
            None => self.resolve_latest(bucket).await,
        };

        let Some(reference) = reference else {
            debug!(%bucket, "no stored document, starting empty");
            slot.document = Some(Document::default());
            return;
        };

        let document = match self.store.retrieve(&reference).await {
            Ok(document) => {
                info!(
                    %bucket,
                    %reference,
                    communities = document.communities.len(),
                    news = document.news.len(),
                    "bucket loaded"
                );
                document
            }
            Err(err) => {
                warn!(%bucket, %reference, error = %err, "bucket unreadable, using empty document");
                Document::default()
            }
        };

        slot.reference = Some(reference);
        slot.document = Some(document);
    }

    async fn resolve_latest(&self, bucket: &Bucket) -> Option<BlobRef> {
        let fallback = match bucket {
            Bucket::Global => self.global_fallback.clone(),
            Bucket::User(_) => None,
        };

        match self.store.latest(bucket).await {
            Ok(Some(pinned)) => Some(pinned.reference),
            Ok(None) => fallback,
            Err(err) => {
                warn!(%bucket, error = %err, "could not resolve latest reference");
                fallback
            }
        }
    }
}
