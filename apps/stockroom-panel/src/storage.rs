use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Object storage holding deliverables, loaders and temporary packages.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError>;
    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError>;
    fn public_url(&self, path: &str) -> String;
}

/// Resolves the in-bucket object path of a stored file reference.
///
/// Full URLs keep only the part after `<bucket>/`; anything else falls back to
/// the filename. The result is percent-decoded.
pub fn object_path(file_url: Option<&str>, filename: Option<&str>, bucket: &str) -> Option<String> {
    let marker = format!("{}/", bucket);
    let raw = file_url
        .and_then(|url| url.split_once(marker.as_str()).map(|(_, rest)| rest))
        .or(filename)?
        .trim();
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded)
}

/// Supabase-compatible storage REST client.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, encode_path(path))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(res: reqwest::Response, path: &str) -> Result<reqwest::Response, StorageError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let body = res.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let res = self
            .authorized(self.client.post(self.object_endpoint(path)))
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(res, path).await?;
        debug!("Uploaded {} to bucket {}", path, self.bucket);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let res = self
            .authorized(self.client.get(self.object_endpoint(path)))
            .send()
            .await?;
        let res = Self::check(res, path).await?;
        Ok(res.bytes().await?.to_vec())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let res = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check(res, &paths.join(",")).await?;
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        );
        let res = self
            .authorized(self.client.post(url))
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: SignedUrlResponse = Self::check(res, path).await?.json().await?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }
}

/// In-process object store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_removals: Mutex<BTreeSet<String>>,
    signing_down: AtomicBool,
}

impl MemoryStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Self::default()
        }
    }

    pub fn put(&self, path: &str, bytes: &[u8]) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(path.to_string(), bytes.to_vec());
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Removal of `path` will fail until cleared.
    pub fn fail_removal_of(&self, path: &str) {
        if let Ok(mut failing) = self.failing_removals.lock() {
            failing.insert(path.to_string());
        }
    }

    pub fn set_signing_down(&self, down: bool) {
        self.signing_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        self.put(path, &bytes);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let failing = self
            .failing_removals
            .lock()
            .map_err(|_| StorageError::Unavailable("poisoned".to_string()))?;
        if let Some(path) = paths.iter().find(|p| failing.contains(*p)) {
            return Err(StorageError::Unavailable(format!("cannot remove {}", path)));
        }
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("poisoned".to_string()))?;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> Result<String, StorageError> {
        if self.signing_down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("signing disabled".to_string()));
        }
        Ok(format!(
            "memory://{}/{}?expires_in={}",
            self.bucket, path, expires_in_secs
        ))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/public/{}", self.bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_strips_bucket_prefix_and_decodes() {
        let url = "https://p.supabase.co/storage/v1/object/public/product-files/stocks/1/%ED%95%9C%20a.zip";
        assert_eq!(
            object_path(Some(url), Some("ignored.zip"), "product-files").as_deref(),
            Some("stocks/1/한 a.zip")
        );
    }

    #[test]
    fn object_path_falls_back_to_filename() {
        assert_eq!(
            object_path(Some("https://cdn.host/f.zip"), Some("stocks/f.zip"), "product-files").as_deref(),
            Some("stocks/f.zip")
        );
        assert_eq!(object_path(None, None, "product-files"), None);
    }

    #[test]
    fn public_url_encodes_segments() {
        let store = SupabaseStorage::new("https://p.supabase.co/", "key", "product-files");
        assert_eq!(
            store.public_url("files/a b.zip"),
            "https://p.supabase.co/storage/v1/object/public/product-files/files/a%20b.zip"
        );
    }

    #[tokio::test]
    async fn memory_removal_failure_keeps_object() {
        let store = MemoryStorage::new("b");
        store.put("x", b"1");
        store.fail_removal_of("x");
        assert!(store.remove(&["x".to_string()]).await.is_err());
        assert!(store.contains("x"));
    }
}
