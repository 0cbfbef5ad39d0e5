//! HTTP backend for `webfolder` and `cloudfront` sources

use async_trait::async_trait;
use bytes::Bytes;

use super::{RequestContext, Result, Storage, StorageError};

const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Fetches `base_url + path` with a plain GET
#[derive(Clone)]
pub struct WebStorage {
    client: reqwest::Client,
    base_url: String,
}

impl WebStorage {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Storage for WebStorage {
    async fn fetch(&self, ctx: &RequestContext, path: &str) -> Result<Bytes> {
        let url = self.url_for(path);

        let download = async {
            let response = self
                .client
                .get(&url)
                .header(REQUEST_ID_HEADER, ctx.request_id.to_string())
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(StorageError::Upstream {
                    status,
                    path: path.to_string(),
                });
            }

            Ok::<Bytes, StorageError>(response.bytes().await?)
        };

        let bytes = ctx
            .within_deadline(download)
            .await
            .map_err(|_| StorageError::Timeout(path.to_string()))??;

        tracing::debug!(
            request_id = %ctx.request_id,
            %url,
            size = bytes.len(),
            "Downloaded from web source"
        );

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_origin() -> SocketAddr {
        let app = Router::new()
            .route("/static/logo.png", get(|| async { "logo-bytes" }))
            .route(
                "/static/private.png",
                get(|| async { StatusCode::FORBIDDEN }),
            )
            .route(
                "/static/slow.png",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "slow"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_url_for_joins_slashes() {
        let storage = WebStorage::new("https://cdn.example.com/");
        assert_eq!(
            storage.url_for("/a/b.png"),
            "https://cdn.example.com/a/b.png"
        );
        assert_eq!(storage.url_for("a.png"), "https://cdn.example.com/a.png");
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let addr = spawn_origin().await;
        let storage = WebStorage::new(&format!("http://{addr}/static"));

        let bytes = storage
            .fetch(&RequestContext::new(), "/logo.png")
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("logo-bytes"));
    }

    #[tokio::test]
    async fn test_upstream_status_passed_through() {
        let addr = spawn_origin().await;
        let storage = WebStorage::new(&format!("http://{addr}/static"));

        let err = storage
            .fetch(&RequestContext::new(), "/private.png")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = storage
            .fetch(&RequestContext::new(), "/absent.png")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deadline_maps_to_gateway_timeout() {
        let addr = spawn_origin().await;
        let storage = WebStorage::new(&format!("http://{addr}/static"));

        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let err = storage.fetch(&ctx, "/slow.png").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
