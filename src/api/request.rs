//! Single request execution: send, record rate-limit headers, classify.

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::client::InfinityClient;
use super::session::write;
use super::types::{RateLimitState, DEFAULT_RATE_LIMIT_REMAINING, LOW_RATE_LIMIT_THRESHOLD};
use crate::error::{InfinityError, Result, RATE_LIMITED};

pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";
const DEFAULT_RETRY_AFTER: &str = "60";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Unix timestamp in (possibly fractional) seconds
fn parse_reset(value: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = value.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((seconds * 1000.0).round() as i64)
        .single()
}

/// Folds the rate-limit headers of one response into the previous state.
///
/// A missing or unreadable remaining count resets to the default; a missing
/// or unreadable reset time keeps the previous one.
pub(crate) fn next_rate_limit_state(previous: RateLimitState, headers: &HeaderMap) -> RateLimitState {
    let remaining = header_str(headers, RATE_LIMIT_REMAINING_HEADER)
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT_REMAINING);
    let reset_at = header_str(headers, RATE_LIMIT_RESET_HEADER)
        .and_then(parse_reset)
        .or(previous.reset_at);

    RateLimitState { remaining, reset_at }
}

/// Message for a non-200, non-429 response: the body's `error` field when it
/// has one, otherwise a generic line carrying the status.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = format!("API request failed with status {}", status.as_u16());
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => fallback,
        },
        Err(_) => format!("{}: {}", fallback, body),
    }
}

impl InfinityClient {
    pub(crate) async fn get(&self, endpoint: &str) -> Result<Value> {
        self.make_request::<()>(Method::GET, endpoint, None).await
    }

    pub(crate) async fn post<B>(&self, endpoint: &str, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        self.make_request(Method::POST, endpoint, Some(body)).await
    }

    /// Performs one request against the open session, opening it first if
    /// necessary. Only a 200 response counts as success.
    pub(crate) async fn make_request<B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let transport = self.transport()?;
        let url = format!("{}{}", self.config().base_url, endpoint);

        debug!("➡️ {} {}", method, url);
        let mut request = transport.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.record_rate_limit(response.headers());

        let status = response.status();
        if status == StatusCode::OK {
            let text = response.text().await?;
            return Ok(serde_json::from_str(&text)?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header_str(response.headers(), RETRY_AFTER.as_str())
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .to_string();
            let message = format!("Rate limited (429). Retry after {} seconds", retry_after);
            warn!("🚫 {}", message);
            return Err(InfinityError::api(message, RATE_LIMITED));
        }

        let text = response.text().await.unwrap_or_default();
        Err(InfinityError::api(error_message(status, &text), status.as_u16()))
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let state = {
            let mut current = write(&self.state.rate_limit);
            *current = next_rate_limit_state(*current, headers);
            *current
        };

        if state.remaining < LOW_RATE_LIMIT_THRESHOLD {
            warn!(
                "⚠️ Rate limit warning: {} requests remaining",
                state.remaining
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_missing_headers_use_defaults() {
        let state = next_rate_limit_state(RateLimitState::default(), &HeaderMap::new());
        assert_eq!(state, RateLimitState::default());
    }

    #[test]
    fn test_headers_update_state() {
        let state = next_rate_limit_state(
            RateLimitState::default(),
            &headers(&[
                ("x-ratelimit-remaining", "7"),
                ("x-ratelimit-reset", "1700000000.5"),
            ]),
        );
        assert_eq!(state.remaining, 7);
        assert_eq!(state.reset_at.unwrap().timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_absent_reset_keeps_previous() {
        let previous = next_rate_limit_state(
            RateLimitState::default(),
            &headers(&[("x-ratelimit-reset", "1700000000")]),
        );
        let next = next_rate_limit_state(previous, &headers(&[("x-ratelimit-remaining", "50")]));
        assert_eq!(next.remaining, 50);
        assert_eq!(next.reset_at, previous.reset_at);
    }

    #[test]
    fn test_unreadable_remaining_falls_back() {
        let state = next_rate_limit_state(
            RateLimitState::default(),
            &headers(&[("x-ratelimit-remaining", "lots")]),
        );
        assert_eq!(state.remaining, DEFAULT_RATE_LIMIT_REMAINING);
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": "Bad Request"}"#),
            "Bad Request"
        );
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"message": "nope"}"#),
            "API request failed with status 404"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>upstream down</html>"),
            "API request failed with status 502: <html>upstream down</html>"
        );
    }
}
