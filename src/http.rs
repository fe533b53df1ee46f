//! Shared HTTP plumbing: the browser-like headers the upstream requires
//! (spec §6) and a cancellation-aware request executor used by both the
//! CAPTCHA pipeline and the API client.

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::error::ApiFailure;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Headers every request to the upstream must carry, it rejects calls
/// missing a browser-like `User-Agent` and an `Origin`/`Referer` pointing
/// at the consular host.
pub fn default_headers(base_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    if let Ok(origin) = HeaderValue::from_str(base_url) {
        headers.insert(ORIGIN, origin.clone());
        headers.insert(REFERER, origin);
    }
    headers
}

/// Sends `builder`, racing it against `cancel`. Cancellation always wins
/// and surfaces as [`ApiFailure::Cancelled`] (classified `timeout`), even
/// if the response was about to arrive.
pub async fn execute(builder: RequestBuilder, cancel: &CancellationToken) -> Result<Response, ApiFailure> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiFailure::Cancelled),
        result = builder.send() => result.map_err(classify_transport_error),
    }
}

fn classify_transport_error(err: reqwest::Error) -> ApiFailure {
    if err.is_timeout() {
        ApiFailure::Timeout(err.to_string())
    } else {
        ApiFailure::Network(err.to_string())
    }
}

/// Turns a non-2xx response into a classified [`ApiFailure::Http`], pulling
/// the upstream `reason` field out of the JSON body when present.
pub async fn ensure_success(response: Response) -> Result<Response, ApiFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    let body = response.text().await.ok();
    let reason = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<serde_json::Value>(b).ok())
        .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string));

    Err(ApiFailure::http(status_code, reason, body))
}
