//! Object storage backend built on the Apache Arrow `object_store` crate

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;

use super::{RequestContext, Result, Storage, StorageError};
use crate::config::SourceConfig;

/// Storage backend wrapping any `object_store` implementation
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    /// Stripped from request paths before they become object keys
    key_prefix: Option<String>,
}

impl ObjectStorage {
    /// Create new storage with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            key_prefix: None,
        }
    }

    /// In-memory store for tests and local development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()))
    }

    /// Filesystem store rooted at `root`
    pub fn local(root: &Path) -> Result<Self> {
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// S3 bucket store; the configured path prefix is not part of the key
    pub fn s3(source: &SourceConfig) -> Result<Self> {
        let bucket = source
            .bucket
            .as_deref()
            .ok_or_else(|| StorageError::Misconfigured("source.bucket is not set".into()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = &source.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &source.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(access_key) = &source.access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &source.secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        let store = builder.build()?;
        let storage = Self::new(Arc::new(store));

        Ok(match source.normalized_prefix() {
            Some(prefix) => storage.with_key_prefix(prefix),
            None => storage,
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Upload bytes to storage
    pub async fn put(&self, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let path = StoragePath::parse(key.trim_start_matches('/'))
            .map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        let data: Bytes = data.into();
        self.store.put(&path, data.into()).await?;
        Ok(())
    }

    /// Map a request path onto an object key
    ///
    /// The request path arrives percent-encoded; keys are stored decoded.
    fn key_for(&self, path: &str) -> Result<StoragePath> {
        let path = match &self.key_prefix {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        };

        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        StoragePath::from_url_path(key).map_err(|e| StorageError::InvalidPath(e.to_string()))
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn fetch(&self, ctx: &RequestContext, path: &str) -> Result<Bytes> {
        let key = self.key_for(path)?;

        let download = async {
            let result = self.store.get(&key).await?;
            Ok::<Bytes, object_store::Error>(result.bytes().await?)
        };

        let bytes = ctx
            .within_deadline(download)
            .await
            .map_err(|_| StorageError::Timeout(path.to_string()))??;

        tracing::debug!(
            request_id = %ctx.request_id,
            key = %key,
            size = bytes.len(),
            "Downloaded from object store"
        );

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_existing_object() {
        let storage = ObjectStorage::in_memory();
        storage.put("/cats/tabby.png", "tabby").await.unwrap();

        let bytes = storage
            .fetch(&RequestContext::new(), "/cats/tabby.png")
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("tabby"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = ObjectStorage::in_memory();

        let err = storage
            .fetch(&RequestContext::new(), "/missing.png")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_root_path_is_not_found() {
        let storage = ObjectStorage::in_memory();

        let err = storage.fetch(&RequestContext::new(), "/").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_key_prefix_is_stripped() {
        let storage = ObjectStorage::in_memory().with_key_prefix("/uploads");
        storage.put("avatars/1.jpg", "avatar").await.unwrap();

        let bytes = storage
            .fetch(&RequestContext::new(), "/uploads/avatars/1.jpg")
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("avatar"));
    }

    #[tokio::test]
    async fn test_parent_segments_rejected() {
        let storage = ObjectStorage::in_memory();

        let err = storage
            .fetch(&RequestContext::new(), "/../etc/passwd")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let storage = ObjectStorage::in_memory();
        storage.put("/my image.png", "spaced").await.unwrap();
        storage.put("/caf\u{e9}.png", "accent").await.unwrap();

        let ctx = RequestContext::new();
        let bytes = storage.fetch(&ctx, "/my%20image.png").await.unwrap();
        assert_eq!(bytes, Bytes::from("spaced"));

        let bytes = storage.fetch(&ctx, "/caf%C3%A9.png").await.unwrap();
        assert_eq!(bytes, Bytes::from("accent"));

        let err = storage.fetch(&ctx, "/%2E%2E/secret").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_local_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("photos")).unwrap();
        fs::write(temp_dir.path().join("photos/sea.jpg"), b"sea").unwrap();

        let storage = ObjectStorage::local(temp_dir.path()).unwrap();
        let bytes = storage
            .fetch(&RequestContext::new(), "/photos/sea.jpg")
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"sea"));

        fs::write(temp_dir.path().join("photos/my image.png"), b"spaced").unwrap();
        let bytes = storage
            .fetch(&RequestContext::new(), "/photos/my%20image.png")
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"spaced"));

        let err = storage
            .fetch(&RequestContext::new(), "/photos/land.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
