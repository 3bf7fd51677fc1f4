//! # Pinata document store
//!
//! Pins bucket documents as JSON on IPFS through the Pinata API and reads them
//! back through a gateway. Every pin is tagged with `app`, `bucket` and
//! `sequence` keyvalues so the newest document per bucket can be found by
//! listing. Without a JWT every call is served by the embedded local store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{AppError, BlobRef, BlobStore, Bucket, Document, PinnedBlob, PostContent, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::local::LocalBlobStore;

const APP_TAG: &str = "worldfeed";
const CONTENT_KIND: &str = "content";

#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub jwt: Option<SecretString>,
    pub api_url: String,
    pub gateway_url: String,
    pub timeout: Duration,
    pub page_limit: u32,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            jwt: None,
            api_url: "https://api.pinata.cloud".to_string(),
            gateway_url: "https://gateway.pinata.cloud/ipfs/".to_string(),
            timeout: Duration::from_secs(10),
            page_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct PinListResponse {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Debug, Deserialize)]
struct PinRow {
    ipfs_pin_hash: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    date_pinned: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: PinMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PinMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    keyvalues: Option<Map<String, Value>>,
}

impl PinRow {
    fn tag(&self, key: &str) -> Option<String> {
        match self.metadata.keyvalues.as_ref()?.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn is_document(&self) -> bool {
        let tagged = self.tag("app").as_deref() == Some(APP_TAG);
        let named = self
            .metadata
            .name
            .as_deref()
            .is_some_and(|n| n.contains(APP_TAG));
        (tagged || named) && self.tag("kind").as_deref() != Some(CONTENT_KIND)
    }

    /// Untagged pins predate per-user buckets and belong to the global bucket.
    fn bucket(&self) -> String {
        self.tag("bucket").unwrap_or_else(|| Bucket::Global.key())
    }

    fn into_blob(self) -> PinnedBlob {
        let bucket = self.bucket();
        let sequence = self
            .tag("sequence")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        PinnedBlob {
            reference: BlobRef::Remote(self.ipfs_pin_hash),
            name: self.metadata.name,
            bucket: Some(bucket),
            sequence,
            size: self.size,
            pinned_at: self.date_pinned,
        }
    }
}

pub struct PinataBlobStore {
    client: reqwest::Client,
    config: PinataConfig,
    local: LocalBlobStore,
}

impl PinataBlobStore {
    pub fn new(config: PinataConfig, local: LocalBlobStore) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::internal("building pinata client", e))?;
        if config.jwt.is_none() {
            warn!("no pinata credentials configured, documents stay on local disk");
        }
        Ok(Self {
            client,
            config,
            local,
        })
    }

    fn jwt(&self) -> Option<&str> {
        self.config.jwt.as_ref().map(|s| s.expose_secret())
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn gateway(&self, cid: &str) -> String {
        format!("{}/{}", self.config.gateway_url.trim_end_matches('/'), cid)
    }

    async fn pin_json(&self, jwt: &str, content: Value, name: String, keyvalues: Value) -> Result<BlobRef> {
        let body = json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name, "keyvalues": keyvalues },
        });
        let response = self
            .client
            .post(self.api("pinning/pinJSONToIPFS"))
            .header(AUTHORIZATION, format!("Bearer {jwt}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::internal("pinata upload failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Pinata API error: {status} {text}")));
        }
        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| AppError::internal("unexpected pinata response", e))?;
        info!(cid = %pinned.ipfs_hash, name = %name, "document pinned");
        Ok(BlobRef::Remote(pinned.ipfs_hash))
    }

    /// Lists WorldFeed documents, optionally for one bucket, newest first.
    async fn pin_list(&self, jwt: &str, bucket: Option<&str>) -> Result<Vec<PinnedBlob>> {
        let mut query = vec![
            ("status", "pinned".to_string()),
            ("pageLimit", self.config.page_limit.to_string()),
        ];
        // Legacy global pins have no keyvalues; only user buckets filter server-side.
        if let Some(bucket) = bucket.filter(|b| *b != Bucket::Global.key()) {
            let filter = json!({
                "app": { "value": APP_TAG, "op": "eq" },
                "bucket": { "value": bucket, "op": "eq" },
            });
            query.push(("metadata[keyvalues]", filter.to_string()));
        }
        let response = self
            .client
            .get(self.api("data/pinList"))
            .header(AUTHORIZATION, format!("Bearer {jwt}"))
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::internal("pinata listing failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!("Pinata API error: {status} {text}")));
        }
        let listing: PinListResponse = response
            .json()
            .await
            .map_err(|e| AppError::internal("unexpected pinata listing", e))?;

        let mut blobs: Vec<PinnedBlob> = listing
            .rows
            .into_iter()
            .filter(PinRow::is_document)
            .filter(|row| bucket.map_or(true, |b| row.bucket() == b))
            .map(PinRow::into_blob)
            .collect();
        blobs.sort_by(|a, b| {
            b.sequence
                .cmp(&a.sequence)
                .then_with(|| b.pinned_at.cmp(&a.pinned_at))
        });
        debug!(bucket = ?bucket, count = blobs.len(), "pins listed");
        Ok(blobs)
    }
}

#[async_trait]
impl BlobStore for PinataBlobStore {
    async fn store(&self, bucket: &Bucket, document: &Document) -> Result<BlobRef> {
        let Some(jwt) = self.jwt() else {
            return self.local.store(bucket, document).await;
        };

        let key = bucket.key();
        if let Some(head) = self.pin_list(jwt, Some(&key)).await?.into_iter().next() {
            if head.sequence >= document.sequence {
                return Err(AppError::Conflict(format!(
                    "bucket {key} is at sequence {}, write carries {}",
                    head.sequence, document.sequence
                )));
            }
        }

        let now = Utc::now();
        let content =
            serde_json::to_value(document).map_err(|e| AppError::internal("serializing document", e))?;
        let keyvalues = json!({
            "app": APP_TAG,
            "bucket": key,
            "sequence": document.sequence.to_string(),
            "timestamp": now.to_rfc3339(),
        });
        self.pin_json(jwt, content, format!("{APP_TAG}-{key}-{}", now.timestamp_millis()), keyvalues)
            .await
    }

    async fn retrieve(&self, reference: &BlobRef) -> Result<Document> {
        let cid = match reference {
            BlobRef::Local(_) => return self.local.retrieve(reference).await,
            BlobRef::Remote(cid) => cid,
        };
        let response = self
            .client
            .get(self.gateway(cid))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::internal("gateway request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!("gateway returned {status} for {cid}")));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::internal("gateway returned non-JSON content", e))
    }

    async fn latest(&self, bucket: &Bucket) -> Result<Option<PinnedBlob>> {
        match self.jwt() {
            Some(jwt) => Ok(self.pin_list(jwt, Some(&bucket.key())).await?.into_iter().next()),
            None => self.local.latest(bucket).await,
        }
    }

    async fn list(&self) -> Result<Vec<PinnedBlob>> {
        match self.jwt() {
            Some(jwt) => self.pin_list(jwt, None).await,
            None => self.local.list().await,
        }
    }

    async fn store_content(&self, content: &PostContent) -> Result<BlobRef> {
        let Some(jwt) = self.jwt() else {
            return self.local.store_content(content).await;
        };
        let now = Utc::now();
        let body =
            serde_json::to_value(content).map_err(|e| AppError::internal("serializing post content", e))?;
        let keyvalues = json!({
            "app": APP_TAG,
            "kind": CONTENT_KIND,
            "timestamp": now.to_rfc3339(),
        });
        self.pin_json(jwt, body, format!("{APP_TAG}-content-{}", now.timestamp_millis()), keyvalues)
            .await
    }

    fn backend(&self) -> &'static str {
        if self.jwt().is_some() {
            "pinata"
        } else {
            self.local.backend()
        }
    }
}
