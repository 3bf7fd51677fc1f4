//! # Local document store
//!
//! Filesystem implementation of `BlobStore`. Each bucket owns one file,
//! `<root>/<bucket-key>.json`; standalone post contents live under
//! `<root>/content/`. Used in development and whenever no pinning
//! credentials are configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{AppError, BlobRef, BlobStore, Bucket, Document, PinnedBlob, PostContent, Result};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const CONTENT_DIR: &str = "content";

pub struct LocalBlobStore {
    /// Root directory for bucket files (e.g., "./data")
    root_path: PathBuf,
    /// Serializes the head check and the write of `store`.
    write_lock: Mutex<()>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Maps a key to its file. Keys never leave the root directory.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != ".." && !part.contains('\\'));
        if !valid {
            return Err(AppError::ValidationError(format!("invalid local key: {key}")));
        }
        Ok(self.root_path.join(format!("{key}.json")))
    }

    async fn read_document(&self, path: &Path) -> Result<Option<Document>> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::internal("unreadable local document", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::internal("local read failed", e)),
        }
    }

    /// Writes through a sibling temp file so readers never see a partial document.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::internal("creating data directory", e))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| AppError::internal("local write failed", e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::internal("local rename failed", e))
    }

    async fn describe(&self, key: &str, path: &Path) -> Result<PinnedBlob> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| AppError::internal("local stat failed", e))?;
        let (sequence, pinned_at) = match self.read_document(path).await {
            Ok(Some(doc)) => (doc.sequence, Some(doc.last_updated)),
            _ => (0, meta.modified().ok().map(DateTime::<Utc>::from)),
        };
        Ok(PinnedBlob {
            reference: BlobRef::Local(key.to_string()),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            bucket: Some(key.to_string()),
            sequence,
            size: Some(meta.len()),
            pinned_at,
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bucket: &Bucket, document: &Document) -> Result<BlobRef> {
        let key = bucket.key();
        let path = self.path_for(&key)?;
        let _guard = self.write_lock.lock().await;

        let head = match self.read_document(&path).await {
            Ok(head) => head,
            Err(err) => {
                warn!(bucket = %key, error = %err, "overwriting unreadable bucket file");
                None
            }
        };
        if let Some(head) = head {
            if head.sequence >= document.sequence {
                return Err(AppError::Conflict(format!(
                    "bucket {key} is at sequence {}, write carries {}",
                    head.sequence, document.sequence
                )));
            }
        }

        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| AppError::internal("serializing document", e))?;
        self.write_atomic(&path, &bytes).await?;
        debug!(bucket = %key, sequence = document.sequence, "bucket written to disk");
        Ok(BlobRef::Local(key))
    }

    async fn retrieve(&self, reference: &BlobRef) -> Result<Document> {
        let BlobRef::Local(key) = reference else {
            return Err(AppError::Internal(format!(
                "remote reference {reference} cannot be read from the local store"
            )));
        };
        let path = self.path_for(key)?;
        self.read_document(&path)
            .await?
            .ok_or_else(|| AppError::Internal(format!("no local document for {reference}")))
    }

    async fn latest(&self, bucket: &Bucket) -> Result<Option<PinnedBlob>> {
        let key = bucket.key();
        let path = self.path_for(&key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        self.describe(&key, &path).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<PinnedBlob>> {
        let mut entries = match fs::read_dir(&self.root_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::internal("listing data directory", e)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::internal("listing data directory", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            blobs.push(self.describe(&key, &path).await?);
        }

        blobs.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at));
        Ok(blobs)
    }

    async fn store_content(&self, content: &PostContent) -> Result<BlobRef> {
        let key = format!("{CONTENT_DIR}/{}", Uuid::new_v4().simple());
        let path = self.path_for(&key)?;
        let bytes = serde_json::to_vec_pretty(content)
            .map_err(|e| AppError::internal("serializing post content", e))?;
        self.write_atomic(&path, &bytes).await?;
        Ok(BlobRef::Local(key))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(sequence: u64) -> Document {
        Document {
            sequence,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_bucket_has_no_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.latest(&Bucket::Global).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_document_is_the_new_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let bucket = Bucket::for_display_name(Some("Alice"));

        let reference = store.store(&bucket, &document(1)).await.unwrap();
        assert_eq!(reference, BlobRef::Local("user-alice".into()));
        assert!(dir.path().join("user-alice.json").exists());

        let head = store.latest(&bucket).await.unwrap().unwrap();
        assert_eq!(head.sequence, 1);
        assert_eq!(head.reference, reference);
        assert_eq!(store.retrieve(&reference).await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn stale_sequence_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.store(&Bucket::Global, &document(2)).await.unwrap();
        let err = store.store(&Bucket::Global, &document(2)).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.store(&Bucket::Global, &document(3)).await.is_ok());
    }

    #[tokio::test]
    async fn content_blobs_do_not_show_up_as_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.store(&Bucket::Global, &document(1)).await.unwrap();

        let content = PostContent {
            title: "t".into(),
            content: "c".into(),
            timestamp: Utc::now(),
        };
        let reference = store.store_content(&content).await.unwrap();
        assert!(reference.to_string().starts_with("local:content/"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].bucket.as_deref(), Some("global"));
    }

    #[tokio::test]
    async fn remote_and_escaping_references_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.retrieve(&BlobRef::Remote("QmX".into())).await.is_err());
        assert!(store.retrieve(&BlobRef::Local("../etc/passwd".into())).await.is_err());
        assert!(store.retrieve(&BlobRef::Local("global".into())).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_file_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("global.json"), b"{not json").unwrap();
        let store = LocalBlobStore::new(dir.path());

        let head = store.latest(&Bucket::Global).await.unwrap().unwrap();
        assert_eq!(head.sequence, 0);
        assert!(store.retrieve(&head.reference).await.is_err());
        assert!(store.store(&Bucket::Global, &document(1)).await.is_ok());
    }
}
