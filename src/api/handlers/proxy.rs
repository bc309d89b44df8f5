//! Reverse proxy for the vendor synthesis API.
//!
//! Everything under `/api/*` is forwarded verbatim (minus the `/api` prefix)
//! to the configured upstream; synthesis, translation, and voice cloning all
//! happen there. Bodies are buffered, which is fine for the audio payload
//! sizes involved.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, Request},
    http::{
        HeaderMap, StatusCode,
        header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING},
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use url::Url;

const MAX_PROXY_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared upstream target and HTTP client.
pub struct UpstreamProxy {
    base_url: Url,
    client: reqwest::Client,
}

impl UpstreamProxy {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build proxy HTTP client")?;
        Ok(Self { base_url, client })
    }

    fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut target = self.base_url.clone();
        target.set_path(rewrite_path(path));
        target.set_query(query);
        target
    }

    async fn relay(&self, request: Request) -> Result<Response> {
        let method = request.method().clone();
        let target = self.target_url(request.uri().path(), request.uri().query());
        let request_headers = filter_headers(request.headers());

        let body = axum::body::to_bytes(request.into_body(), MAX_PROXY_BODY_BYTES)
            .await
            .context("failed to read proxy request body")?;

        let upstream = self
            .client
            .request(method, target)
            .headers(request_headers)
            .body(body)
            .send()
            .await
            .context("upstream request failed")?;

        let status = upstream.status();
        let response_headers = filter_headers(upstream.headers());
        let bytes = upstream
            .bytes()
            .await
            .context("failed to read upstream response body")?;

        let mut response = Response::builder()
            .status(status)
            .body(Body::from(bytes))
            .context("failed to build proxy response")?;
        response.headers_mut().extend(response_headers);
        Ok(response)
    }
}

/// Drop the `/api` prefix the way the upstream expects.
fn rewrite_path(path: &str) -> &str {
    let stripped = path.strip_prefix("/api").unwrap_or(path);
    if stripped.is_empty() { "/" } else { stripped }
}

/// Strip connection-level headers; the client recomputes host and length.
fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers {
        if name == HOST || name == CONTENT_LENGTH || name == TRANSFER_ENCODING || name == CONNECTION
        {
            continue;
        }
        filtered.append(name, value.clone());
    }
    filtered
}

pub async fn forward(
    Extension(proxy): Extension<Arc<UpstreamProxy>>,
    request: Request,
) -> Response {
    match proxy.relay(request).await {
        Ok(response) => response,
        Err(err) => {
            error!("Proxy request failed: {err:#}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
