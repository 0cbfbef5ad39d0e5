use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, warn};

use super::state::Services;
use crate::storage::{RequestContext, StorageError};

/// Catch-all image endpoint (GET <any path>)
///
/// ## Flow:
/// 1. Fetch the bytes for the request path from storage
/// 2. On fetch failure respond with the storage status and an empty body
/// 3. Parse the query into a ProcessSpec; an empty spec serves the bytes as-is
/// 4. Otherwise run the manipulator; any failure becomes 422 with an empty body
///
/// Both awaits are bounded by the configured request timeout. A client that
/// goes away drops this future, which cancels whichever step is in flight.
pub async fn serve_image(
    State(services): State<Arc<Services>>,
    uri: Uri,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let path = uri.path();
    let ctx = RequestContext::with_timeout(services.request_timeout);

    let fetched = ctx
        .within_deadline(services.storage.fetch(&ctx, path))
        .await
        .unwrap_or_else(|_| Err(StorageError::Timeout(path.to_string())));

    let data = match fetched {
        Ok(data) => data,
        Err(err) => {
            let status = err.status_code();
            warn!(
                request_id = %ctx.request_id,
                path,
                status = status.as_u16(),
                error = %err,
                "Storage fetch failed"
            );
            return status.into_response();
        }
    };

    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => {
            debug!(request_id = %ctx.request_id, %rejection, "Ignoring unparsable query");
            Vec::new()
        }
    };

    let spec = services.parser.parse(&pairs);
    if spec.is_empty() {
        return image_response(&services, data);
    }

    let processed = ctx
        .within_deadline(services.manipulator.process(data, &spec))
        .await;

    match processed {
        Ok(Ok(data)) => image_response(&services, data),
        Ok(Err(err)) => {
            warn!(request_id = %ctx.request_id, path, error = %err, "Image processing failed");
            StatusCode::UNPROCESSABLE_ENTITY.into_response()
        }
        Err(_) => {
            warn!(request_id = %ctx.request_id, path, "Image processing exceeded deadline");
            StatusCode::UNPROCESSABLE_ENTITY.into_response()
        }
    }
}

fn image_response(services: &Services, data: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, sniff_content_type(&data)),
            (header::CACHE_CONTROL, services.cache_control()),
        ],
        data,
    )
        .into_response()
}

/// Content type from the leading bytes of the body
pub fn sniff_content_type(data: &[u8]) -> String {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => mime::APPLICATION_OCTET_STREAM.to_string(),
    }
}

/// Health check endpoint (GET /ping)
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_content_type() {
        let png_magic = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(sniff_content_type(png_magic), "image/png");

        let jpeg_magic = b"\xff\xd8\xff\xe0\0\x10JFIF";
        assert_eq!(sniff_content_type(jpeg_magic), "image/jpeg");

        assert_eq!(sniff_content_type(b"validData"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "application/octet-stream");
    }
}
