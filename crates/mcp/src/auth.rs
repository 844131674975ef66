//! Bearer-token authentication and per-key rate limiting for the HTTP transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use puddle_core::config::AuthConfig;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A credential accepted by the HTTP transport.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    pub name: String,
    key: SecretString,
    pub requests_per_minute: u32,
}

impl ApiKeyEntry {
    pub fn new(name: impl Into<String>, key: SecretString, requests_per_minute: u32) -> Self {
        Self { name: name.into(), key, requests_per_minute }
    }

    fn matches(&self, presented: &str) -> bool {
        self.key.expose_secret().as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

#[derive(Debug)]
struct RateLimitEntry {
    requests: Vec<Instant>,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self { requests: Vec::new() }
    }

    /// Drops requests outside the window, records this one and returns the in-window count.
    fn record_request(&mut self, window: Duration) -> usize {
        let now = Instant::now();
        self.requests.retain(|&at| now.duration_since(at) < window);
        self.requests.push(now);
        self.requests.len()
    }
}

#[derive(Debug, Clone)]
pub struct AuthManager {
    api_keys: Arc<Vec<ApiKeyEntry>>,
    rate_limits: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    rate_limit_window: Duration,
    auth_required: bool,
}

impl AuthManager {
    /// Accepts every request. Used for the stdio transport, where the process boundary is the
    /// trust boundary.
    pub fn no_auth() -> Self {
        Self {
            api_keys: Arc::new(Vec::new()),
            rate_limits: Arc::new(RwLock::new(HashMap::new())),
            rate_limit_window: Duration::from_secs(60),
            auth_required: false,
        }
    }

    pub fn with_keys(api_keys: Vec<ApiKeyEntry>, rate_limit_window: Duration) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            rate_limits: Arc::new(RwLock::new(HashMap::new())),
            rate_limit_window,
            auth_required: true,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        match &config.api_key {
            Some(key) => Self::with_keys(
                vec![ApiKeyEntry::new("default", key.clone(), config.requests_per_minute)],
                Duration::from_secs(config.rate_limit_window_secs.max(1)),
            ),
            None => Self::no_auth(),
        }
    }

    pub async fn validate_request(&self, api_key: Option<&str>) -> AuthResult {
        if !self.auth_required {
            return AuthResult::Allowed {
                key_name: "anonymous".to_string(),
                remaining_requests: u32::MAX,
            };
        }

        let Some(presented) = api_key else {
            return AuthResult::Denied { reason: "API key required".to_string(), retry_after: None };
        };

        // Every key is compared, even after a match.
        let mut entry = None;
        for candidate in self.api_keys.iter() {
            if candidate.matches(presented) && entry.is_none() {
                entry = Some(candidate.clone());
            }
        }

        let Some(entry) = entry else {
            return AuthResult::Denied { reason: "Invalid API key".to_string(), retry_after: None };
        };

        let mut limits = self.rate_limits.write().await;
        let request_count = limits
            .entry(entry.name.clone())
            .or_insert_with(RateLimitEntry::new)
            .record_request(self.rate_limit_window);
        let limit = entry.requests_per_minute as usize;

        if request_count > limit {
            warn!(
                event_name = "auth.rate_limited",
                key_name = %entry.name,
                request_count,
                limit,
                "rate limit exceeded"
            );
            return AuthResult::Denied {
                reason: "Rate limit exceeded".to_string(),
                retry_after: Some(self.rate_limit_window.as_secs() as u32),
            };
        }

        let remaining = (limit - request_count) as u32;
        debug!(event_name = "auth.allowed", key_name = %entry.name, remaining, "request allowed");
        AuthResult::Allowed { key_name: entry.name, remaining_requests: remaining }
    }

    pub fn is_auth_required(&self) -> bool {
        self.auth_required
    }
}

#[derive(Debug, Clone)]
pub enum AuthResult {
    Allowed { key_name: String, remaining_requests: u32 },
    Denied { reason: String, retry_after: Option<u32> },
}

impl AuthResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthResult::Allowed { .. })
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            AuthResult::Allowed { remaining_requests, .. } => Some(*remaining_requests),
            _ => None,
        }
    }

    pub fn denial_reason(&self) -> Option<&str> {
        match self {
            AuthResult::Denied { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<u32> {
        match self {
            AuthResult::Denied { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Rejects requests without a valid bearer token before they reach the MCP service.
pub async fn require_bearer(
    State(auth): State<AuthManager>,
    request: Request,
    next: Next,
) -> Response {
    let result = auth.validate_request(bearer_token(request.headers())).await;
    match result {
        AuthResult::Allowed { .. } => next.run(request).await,
        AuthResult::Denied { reason, retry_after: Some(seconds) } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "detail": reason })),
            )
                .into_response();
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
        AuthResult::Denied { reason, retry_after: None } => {
            warn!(event_name = "auth.denied", reason = %reason, "rejected unauthenticated request");
            (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "detail": reason })))
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(requests_per_minute: u32) -> AuthManager {
        AuthManager::with_keys(
            vec![ApiKeyEntry::new(
                "agent",
                SecretString::from("test_key_123".to_string()),
                requests_per_minute,
            )],
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_no_auth_mode() {
        let auth = AuthManager::no_auth();

        let result = auth.validate_request(None).await;
        assert!(result.is_allowed());
        assert_eq!(result.remaining(), Some(u32::MAX));
    }

    #[tokio::test]
    async fn test_auth_required_no_key() {
        let result = manager(10).validate_request(None).await;
        assert!(!result.is_allowed());
        assert_eq!(result.denial_reason(), Some("API key required"));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let auth = manager(10);

        let wrong = auth.validate_request(Some("wrong_key")).await;
        assert_eq!(wrong.denial_reason(), Some("Invalid API key"));
        let prefix = auth.validate_request(Some("test_key")).await;
        assert_eq!(prefix.denial_reason(), Some("Invalid API key"));
    }

    #[tokio::test]
    async fn test_rate_limiting() {
        let auth = manager(2);

        assert!(auth.validate_request(Some("test_key_123")).await.is_allowed());
        assert!(auth.validate_request(Some("test_key_123")).await.is_allowed());

        let limited = auth.validate_request(Some("test_key_123")).await;
        assert!(!limited.is_allowed());
        assert_eq!(limited.denial_reason(), Some("Rate limit exceeded"));
        assert_eq!(limited.retry_after(), Some(60));
    }

    #[test]
    fn from_config_without_key_disables_auth() {
        let config =
            AuthConfig { api_key: None, requests_per_minute: 5, rate_limit_window_secs: 60 };
        assert!(!AuthManager::from_config(&config).is_auth_required());

        let config = AuthConfig {
            api_key: Some(SecretString::from("k".to_string())),
            requests_per_minute: 5,
            rate_limit_window_secs: 60,
        };
        assert!(AuthManager::from_config(&config).is_auth_required());
    }

    #[test]
    fn bearer_token_requires_the_scheme_prefix() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  abc "));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
