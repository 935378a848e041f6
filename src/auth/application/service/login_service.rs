use crate::{
    ProxmoxError, ProxmoxResult,
    auth::application::{
        request::login_request::LoginRequest,
        response::{api_response::ApiResponse, login_response::LoginResponseData},
    },
    core::domain::{
        model::{proxmox_connection::ProxmoxConnection, session::Session},
        value_object::{ProxmoxCSRFToken, ProxmoxTicket, validate_csrf_token, validate_ticket},
    },
};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use tracing::debug;

/// Performs the ticket exchange against `/access/ticket`.
pub struct LoginService {
    default_headers: HeaderMap,
}

impl LoginService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    /// Logs in with the connection's credentials and returns a fresh session.
    ///
    /// # Errors
    /// * `ProxmoxError::Authentication` if the host rejects the credentials
    /// * `ProxmoxError::Connection` / `ProxmoxError::Api` for transport or server failures
    pub async fn execute(
        &self,
        http_client: &Client,
        connection: &ProxmoxConnection,
        generation: u64,
    ) -> ProxmoxResult<Session> {
        let url = connection.url().api_path("access/ticket");
        let request = self.build_login_request(connection);
        let response = self.send_request(http_client, &url, &request).await?;

        match response.status() {
            StatusCode::OK => {
                self.handle_successful_login(connection, response, generation)
                    .await
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProxmoxError::Authentication(
                format!(
                    "Invalid credentials provided for {}@{}",
                    connection.username().as_str(),
                    connection.realm().as_str()
                ),
            )),
            StatusCode::NOT_FOUND => Err(ProxmoxError::Connection(
                "Login endpoint not found".to_string(),
            )),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProxmoxError::Connection(
                "Proxmox service is currently unavailable".to_string(),
            )),
            status => Err(ProxmoxError::Api {
                status: status.as_u16(),
                message: "Unexpected response status on login".to_string(),
            }),
        }
    }

    fn build_login_request(&self, connection: &ProxmoxConnection) -> LoginRequest {
        LoginRequest {
            username: connection.username().as_str().to_string(),
            password: connection.password().as_str().to_string(),
            realm: connection.realm().as_str().to_string(),
        }
    }

    async fn send_request(
        &self,
        client: &Client,
        url: &str,
        request: &LoginRequest,
    ) -> ProxmoxResult<reqwest::Response> {
        client
            .post(url)
            .headers(self.default_headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(e.to_string()))
    }

    async fn handle_successful_login(
        &self,
        connection: &ProxmoxConnection,
        response: reqwest::Response,
        generation: u64,
    ) -> ProxmoxResult<Session> {
        let login_response = response
            .json::<ApiResponse<LoginResponseData>>()
            .await
            .map_err(|e| {
                ProxmoxError::Connection(format!("Failed to parse login response: {}", e))
            })?;

        let data = login_response.data;
        validate_ticket(&data.ticket)
            .and_then(|_| validate_csrf_token(&data.csrf_token))
            .map_err(|e| ProxmoxError::Connection(format!("Malformed login response: {}", e)))?;

        debug!(
            host = connection.host_id(),
            user = data.username.as_deref().unwrap_or_default(),
            generation,
            "Issued new ticket"
        );

        Ok(Session::new(
            connection.host_id(),
            ProxmoxTicket::new_unchecked(data.ticket),
            ProxmoxCSRFToken::new_unchecked(data.csrf_token),
            generation,
        ))
    }
}

impl Default for LoginService {
    fn default() -> Self {
        Self::new()
    }
}
