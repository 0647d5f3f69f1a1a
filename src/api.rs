use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use crate::SKIP_WARNING_HEADER;
use crate::types::{
    AccountTier, ConflictBody, PollFailure, PollOutcome, ResultsResponse, SuccessPayload,
};

/// Detail shown on a 409 without one.
pub const DEFAULT_CONFLICT_DETAIL: &str = "Key is in use on another device";

/// HTTP client preconfigured with the ngrok bypass header and a request timeout.
pub fn build_client(timeout: Duration, skip_warning_header: bool) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if skip_warning_header {
        headers.insert(SKIP_WARNING_HEADER, HeaderValue::from_static("true"));
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Results URL with cache-busting timestamp, optional key and claim flag.
pub fn build_url(endpoint: &Url, api_key: &str, claim: bool, timestamp_ms: i64) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("t", &timestamp_ms.to_string());
        if !api_key.is_empty() {
            query.append_pair("key", api_key);
        }
        if claim {
            query.append_pair("claim", "true");
        }
    }
    url
}

/// Classify an HTTP status and body into a poll outcome.
pub fn interpret(status: StatusCode, body: &str) -> PollOutcome {
    if status == StatusCode::CONFLICT {
        let detail = serde_json::from_str::<ConflictBody>(body)
            .ok()
            .and_then(|b| b.detail)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFLICT_DETAIL.to_string());
        return PollOutcome::Conflict { detail };
    }

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return PollOutcome::Error(PollFailure::Network(format!(
                "unreadable response (HTTP {status}): {e}"
            )));
        }
    };
    let response: ResultsResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return PollOutcome::Error(PollFailure::Server(format!(
                "malformed response (HTTP {status}): {e}"
            )));
        }
    };

    match response.status.as_str() {
        "success" => match response.data {
            Some(data) => PollOutcome::Success(SuccessPayload {
                user: response.user,
                tier: AccountTier::from_wire(response.kind.as_deref()),
                timestamp: response.timestamp.unwrap_or_default(),
                data,
                error: response.error.filter(|e| !e.is_empty()),
            }),
            None => PollOutcome::Error(PollFailure::Server(
                "success response without data".to_string(),
            )),
        },
        "waiting" => PollOutcome::Waiting,
        other => PollOutcome::Error(PollFailure::Server(format!(
            "server status {other:?} (HTTP {status})"
        ))),
    }
}

/// Issue one results request. Never fails: transport errors become
/// [`PollFailure::Network`].
pub async fn fetch_results(client: &reqwest::Client, url: Url) -> PollOutcome {
    debug!("GET {url}");
    let resp = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return PollOutcome::Error(PollFailure::Network(e.to_string())),
    };
    let status = resp.status();
    match resp.text().await {
        Ok(body) => interpret(status, &body),
        Err(e) => PollOutcome::Error(PollFailure::Network(e.to_string())),
    }
}
