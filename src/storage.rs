//! Blob storage for uploaded media.
//!
//! The primary store is either a local directory (served under `/uploads`) or
//! an HTTP object bucket. An optional second local directory (served under
//! `/images`) receives a public mirror copy of every upload.

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{BucketConfig, CONFIG};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bucket rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid object path: {0}")]
    InvalidPath(String),
}

/// Where an object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Store-relative key, e.g. `media/images/hero-1700000000000-ab12cd.png`.
    pub path: String,
    /// URL clients fetch the object from.
    pub url: String,
}

/// Rejects keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }

    /// Inverse of [`LocalDirStore::url_for`]; `None` for URLs outside this store.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.url_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(StoredObject {
            path: key.to_string(),
            url: self.url_for(key),
        })
    }

    /// `Ok(false)` when the file was already gone.
    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Object bucket speaking the Firebase Storage REST dialect.
#[derive(Debug, Clone)]
pub struct BucketStore {
    client: reqwest::Client,
    config: BucketConfig,
}

impl BucketStore {
    pub fn new(config: BucketConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    fn objects_url(&self) -> Result<reqwest::Url, StorageError> {
        let mut url = reqwest::Url::parse(&self.config.api_base)
            .map_err(|e| StorageError::InvalidPath(format!("{}: {}", self.config.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(self.config.api_base.clone()))?
            .pop_if_empty()
            .extend(["v0", "b", self.config.bucket.as_str(), "o"]);
        Ok(url)
    }

    /// Download URL; the key travels as a single encoded segment.
    pub fn object_url(&self, key: &str) -> Result<reqwest::Url, StorageError> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(key.to_string()))?
            .push(key);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        let mut url = self.objects_url()?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let response = self
            .authorize(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(StoredObject {
            path: key.to_string(),
            url: self.object_url(key)?.to_string(),
        })
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(key.to_string()))?
            .push(key);

        let response = self.authorize(self.client.delete(url)).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub enum BlobStore {
    Local(LocalDirStore),
    Bucket(BucketStore),
}

impl BlobStore {
    pub fn backend(&self) -> &'static str {
        match self {
            BlobStore::Local(_) => "local",
            BlobStore::Bucket(_) => "bucket",
        }
    }

    pub async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        match self {
            BlobStore::Local(store) => store.put(key, bytes).await,
            BlobStore::Bucket(store) => store.put(key, bytes, content_type).await,
        }
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        match self {
            BlobStore::Local(store) => store.remove(key).await,
            BlobStore::Bucket(store) => store.remove(key).await,
        }
    }
}

/// Result of a dual write. `public_path` is `None` when the mirror is
/// disabled or its write failed.
#[derive(Debug, Clone)]
pub struct DualUpload {
    pub primary: StoredObject,
    pub public_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    primary: BlobStore,
    mirror: Option<LocalDirStore>,
}

impl MediaStorage {
    pub fn new(primary: BlobStore, mirror: Option<LocalDirStore>) -> Self {
        Self { primary, mirror }
    }

    pub fn from_config() -> Self {
        let primary = match &CONFIG.bucket {
            Some(bucket) => BlobStore::Bucket(BucketStore::new(bucket.clone())),
            None => BlobStore::Local(LocalDirStore::new(CONFIG.upload_dir.clone(), "/uploads")),
        };
        let mirror = CONFIG
            .public_media_dir
            .as_ref()
            .map(|dir| LocalDirStore::new(dir.clone(), "/images"));
        Self::new(primary, mirror)
    }

    pub fn primary(&self) -> &BlobStore {
        &self.primary
    }

    pub fn mirror(&self) -> Option<&LocalDirStore> {
        self.mirror.as_ref()
    }

    /// Writes to the primary store, then copies to the mirror. Only the
    /// primary write can fail the upload; the first copy is never rolled back.
    pub async fn store_dual(
        &self,
        primary_key: &str,
        mirror_key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<DualUpload, StorageError> {
        let primary = self.primary.put(primary_key, bytes, content_type).await?;

        let public_path = match &self.mirror {
            Some(mirror) => match mirror.put(mirror_key, bytes).await {
                Ok(stored) => Some(stored.url),
                Err(e) => {
                    tracing::warn!(key = %mirror_key, error = %e, "Public mirror write failed");
                    None
                }
            },
            None => None,
        };

        Ok(DualUpload {
            primary,
            public_path,
        })
    }

    /// Best effort: failures are logged, never returned.
    pub async fn remove_dual(&self, storage_path: &str, public_path: Option<&str>) {
        match self.primary.remove(storage_path).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(path = %storage_path, "Primary object already gone"),
            Err(e) => tracing::warn!(path = %storage_path, error = %e, "Primary object removal failed"),
        }

        let (Some(mirror), Some(public_path)) = (&self.mirror, public_path) else {
            return;
        };
        let Some(key) = mirror.key_for_url(public_path) else {
            return;
        };
        if let Err(e) = mirror.remove(key).await {
            tracing::warn!(path = %public_path, error = %e, "Mirror copy removal failed");
        }
    }
}

pub static STORAGE: Lazy<MediaStorage> = Lazy::new(MediaStorage::from_config);
