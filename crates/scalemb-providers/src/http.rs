//! Blocking JSON transport shared by the remote adapters.
//!
//! Maps HTTP failures onto the error taxonomy and never retries: 401/403 is
//! an authentication error, 429 is rate limiting, 400/404/422 mean the
//! provider rejected the model or request shape, everything else (including
//! timeouts) is an unavailable provider.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use scalemb_core::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub(crate) struct HttpClient {
    provider: &'static str,
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub(crate) fn new(provider: &'static str, api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::Authentication { provider: provider.to_string(), reason: "empty credential".to_string() });
        }
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| Error::Authentication {
            provider: provider.to_string(),
            reason: "credential contains invalid header characters".to_string(),
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::unavailable(provider, format!("failed to build HTTP client: {e}")))?;
        Ok(Self { provider, client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub(crate) fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(provider = self.provider, %url, "POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| transport_error(self.provider, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(self.provider, status, &body));
        }
        resp.json::<Resp>()
            .map_err(|e| Error::unavailable(self.provider, format!("unexpected response shape: {e}")))
    }
}

/// Reads a credential from the environment; absence is an authentication error.
pub(crate) fn key_from_env(provider: &'static str, var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Authentication { provider: provider.to_string(), reason: format!("{var} is not set") }),
    }
}

pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> Error {
    let reason = format!("{status}: {}", clip(body));
    let provider = provider.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication { provider, reason },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { provider, reason },
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::UnsupportedConfig { provider, reason }
        }
        _ => Error::ProviderUnavailable { provider, reason },
    }
}

fn transport_error(provider: &str, err: &reqwest::Error) -> Error {
    let reason = if err.is_timeout() { format!("request timed out: {err}") } else { err.to_string() };
    Error::unavailable(provider, reason)
}

fn clip(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(300) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}
