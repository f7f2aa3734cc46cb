//! Reverse proxy to the image-transform service.
//!
//! Paths are passed through untouched; the service verifies the signature.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use mediaflow_core::AppError;
use std::sync::Arc;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Headers describing the upstream connection rather than the image.
const HOP_BY_HOP: [header::HeaderName; 3] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
];

/// `GET /v1/image/{signature}/{*rest}` where `rest` is `{operations...}/{encoded_source}`.
pub async fn proxy_image(
    State(state): State<Arc<AppState>>,
    Path((signature, rest)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let rest = rest.trim_matches('/');
    if signature.is_empty() || rest.is_empty() || !rest.contains('/') {
        return Err(AppError::BadRequest("Invalid image URL".to_string()).into());
    }

    let url = format!(
        "{}/{}/{}",
        state.config.imgproxy_base_url.trim_end_matches('/'),
        signature,
        rest
    );

    let mut request = state.http.get(&url);
    if let Some(accept) = headers.get(header::ACCEPT) {
        request = request.header(header::ACCEPT, accept.clone());
    }

    let upstream = request.send().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch from image proxy");
        AppError::Upstream("Failed to fetch image".to_string())
    })?;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if !HOP_BY_HOP.contains(name) {
            response_headers.append(name.clone(), value.clone());
        }
    }
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
