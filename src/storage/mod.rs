//! Storage capability: resolves a request path to raw image bytes.
//!
//! The image handler only depends on the [`Storage`] trait. Two backends
//! ship with the crate:
//!
//! - [`ObjectStorage`] - `object_store` over S3 or the local filesystem
//! - [`WebStorage`] - plain HTTP GET against a web folder or CloudFront host

mod object;
mod web;

pub use object::ObjectStorage;
pub use web::WebStorage;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, error::Elapsed};
use uuid::Uuid;

use crate::config::{SourceConfig, StorageKind};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Upstream responded with {status} for {path}")]
    Upstream { status: StatusCode, path: String },

    #[error("Deadline exceeded while fetching {0}")]
    Timeout(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("HTTP transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),
}

impl StorageError {
    /// Status code surfaced to the client when the fetch fails
    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            StorageError::Upstream { status, .. } => *status,
            StorageError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            StorageError::ObjectStoreError(object_store::Error::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            StorageError::ObjectStoreError(_) => StatusCode::BAD_GATEWAY,
            StorageError::TransportError(_) => StatusCode::BAD_GATEWAY,
            StorageError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Per-request context handed to the storage backend
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Run `fut` until it completes or the request deadline passes
    pub async fn within_deadline<F: Future>(
        &self,
        fut: F,
    ) -> std::result::Result<F::Output, Elapsed> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut).await,
            None => Ok(fut.await),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-fetching capability consumed by the image handler
///
/// On failure the error's [`StorageError::status_code`] is passed through to
/// the client unchanged, so implementations pick the failure class.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn fetch(&self, ctx: &RequestContext, path: &str) -> Result<Bytes>;
}

/// Build the storage backend for the configured source kind
pub fn from_config(source: &SourceConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match source.kind {
        StorageKind::S3 => Arc::new(ObjectStorage::s3(source)?),
        StorageKind::Local => {
            let root = source
                .root
                .as_deref()
                .ok_or_else(|| StorageError::Misconfigured("source.root is not set".into()))?;
            Arc::new(ObjectStorage::local(root)?)
        }
        StorageKind::Cloudfront | StorageKind::Webfolder => {
            let base_url = source.base_url.as_deref().ok_or_else(|| {
                StorageError::Misconfigured("source.base_url is not set".into())
            })?;
            Arc::new(WebStorage::new(base_url))
        }
    };

    tracing::info!(kind = source.kind.as_str(), "Storage backend initialised");
    Ok(storage)
}
