//! Per-host HTTP client that attaches the host's session to every call.

use crate::{
    ProxmoxError, ProxmoxResult,
    auth::application::{
        response::api_response::ApiResponse, service::session_manager::SessionManager,
    },
    core::domain::{
        model::{
            monitor_config::RateLimitConfig, proxmox_connection::ProxmoxConnection,
            session::Session,
        },
        value_object::ProxmoxCSRFToken,
    },
};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, StatusCode, header::COOKIE};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP client for one host.
///
/// Sessions come from the shared `SessionManager`. If a call receives
/// `401 Unauthorized`, the rejected session is replaced (single-flight
/// across all callers of this host) and the call is retried exactly once.
pub struct ApiClient {
    http_client: Client,
    connection: Arc<ProxmoxConnection>,
    sessions: Arc<SessionManager>,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl ApiClient {
    /// Creates a client for a host already known to `sessions`.
    ///
    /// # Errors
    /// * `ProxmoxError::UnknownHost` if `host_id` is not configured
    /// * `ProxmoxError::Connection` if the HTTP client cannot be built
    /// * `ProxmoxError::Validation` if the rate limit has a zero component
    pub fn new(
        host_id: &str,
        sessions: Arc<SessionManager>,
        request_timeout: Duration,
        rate_limit: Option<RateLimitConfig>,
    ) -> ProxmoxResult<Self> {
        let connection = sessions.connection(host_id)?;
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accepts_invalid_certs())
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

        let rate_limiter = rate_limit.map(build_rate_limiter).transpose()?;

        Ok(Self {
            http_client,
            connection,
            sessions,
            rate_limiter,
        })
    }

    pub fn host_id(&self) -> &str {
        self.connection.host_id()
    }

    /// Performs an authenticated GET and returns the `data` payload.
    ///
    /// # Errors
    /// * `ProxmoxError::Authentication` if re-authentication is rejected
    /// * `ProxmoxError::Unauthorized` if the retried call is rejected again
    /// * `ProxmoxError::Connection` / `ProxmoxError::Api` for transport,
    ///   server or parse failures
    pub async fn get<T>(&self, path: &str) -> ProxmoxResult<T>
    where
        T: DeserializeOwned,
    {
        let host_id = self.host_id();
        let session = self.sessions.acquire(host_id).await?;

        match self.send_get(path, &session).await {
            Err(ProxmoxError::Unauthorized(_)) => {
                debug!(host = host_id, path, "Session rejected, renewing");
                let renewed = self.sessions.reacquire(host_id, &session).await?;
                // Retry exactly once (no further recursion)
                self.send_get(path, &renewed).await
            }
            other => other,
        }
    }

    async fn send_get<T>(&self, path: &str, session: &Session) -> ProxmoxResult<T>
    where
        T: DeserializeOwned,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.connection.url().api_path(path);
        let response = self
            .http_client
            .get(&url)
            .header(COOKIE, session.ticket().as_cookie_header())
            .header(ProxmoxCSRFToken::HEADER, session.csrf_token().as_str())
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProxmoxError::Unauthorized(path.to_string()));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ProxmoxError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| ProxmoxError::Connection(format!("Failed to parse response: {}", e)))
    }
}

fn build_rate_limiter(config: RateLimitConfig) -> ProxmoxResult<DefaultDirectRateLimiter> {
    let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
        ProxmoxError::from(crate::ValidationError::Field {
            field: "requests_per_second".to_string(),
            message: "Rate limit must be greater than 0".to_string(),
        })
    })?;
    let burst = NonZeroU32::new(config.burst_size).ok_or_else(|| {
        ProxmoxError::from(crate::ValidationError::Field {
            field: "burst_size".to_string(),
            message: "Burst size must be greater than 0".to_string(),
        })
    })?;
    Ok(DefaultDirectRateLimiter::direct(
        Quota::per_second(per_second).allow_burst(burst),
    ))
}
