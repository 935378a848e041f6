//! Per-host session ownership with single-flight (re-)authentication.
//!
//! Sessions never expire proactively; a session is dropped only when a
//! caller reports that the host rejected it, or when the manager is closed.

use crate::{
    ProxmoxError, ProxmoxResult,
    auth::application::service::login_service::LoginService,
    core::domain::model::{proxmox_connection::ProxmoxConnection, session::Session},
};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Outcome bookkeeping of the login attempts on one host.
#[derive(Default)]
struct LoginState {
    generation: u64,
    last_error: Option<ProxmoxError>,
}

struct HostSlot {
    connection: Arc<ProxmoxConnection>,
    http_client: Client,
    current: RwLock<Option<Arc<Session>>>,
    login: Mutex<LoginState>,
    /// Completed login attempts, successful or not.
    attempts: AtomicU64,
}

/// Owns one authenticated session per configured host.
pub struct SessionManager {
    slots: HashMap<String, HostSlot>,
    /// Host ids in configuration order.
    order: Vec<String>,
    login_service: LoginService,
    closed: AtomicBool,
}

impl SessionManager {
    /// Creates a manager for the given hosts. No login happens until the
    /// first `acquire`.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Connection` if an HTTP client cannot be built.
    pub fn new(
        connections: impl IntoIterator<Item = Arc<ProxmoxConnection>>,
        request_timeout: Duration,
    ) -> ProxmoxResult<Self> {
        let mut slots = HashMap::new();
        let mut order = Vec::new();
        for connection in connections {
            let http_client = Client::builder()
                .danger_accept_invalid_certs(connection.accepts_invalid_certs())
                .timeout(request_timeout)
                .build()
                .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

            order.push(connection.host_id().to_string());
            slots.insert(
                connection.host_id().to_string(),
                HostSlot {
                    connection,
                    http_client,
                    current: RwLock::new(None),
                    login: Mutex::new(LoginState::default()),
                    attempts: AtomicU64::new(0),
                },
            );
        }

        Ok(Self {
            slots,
            order,
            login_service: LoginService::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn slot(&self, host_id: &str) -> ProxmoxResult<&HostSlot> {
        self.slots
            .get(host_id)
            .ok_or_else(|| ProxmoxError::UnknownHost(host_id.to_string()))
    }

    /// Returns the cached session for `host_id`, logging in if there is none.
    ///
    /// Concurrent callers that find no session share one login: the first
    /// performs it, the others wait and reuse its session or its error.
    ///
    /// # Errors
    /// * `ProxmoxError::Authentication` if the host rejects the credentials
    /// * transient errors from the login exchange
    /// * `ProxmoxError::Shutdown` once the manager is closed
    #[instrument(skip(self))]
    pub async fn acquire(&self, host_id: &str) -> ProxmoxResult<Arc<Session>> {
        let slot = self.slot(host_id)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxmoxError::Shutdown);
        }

        let observed_attempts = slot.attempts.load(Ordering::Acquire);
        if let Some(session) = slot.current.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }

        let mut login = slot.login.lock().await;

        // Someone else finished a login while we were waiting for the lock.
        if let Some(session) = slot.current.read().await.as_ref() {
            return Ok(Arc::clone(session));
        }
        if slot.attempts.load(Ordering::Acquire) != observed_attempts {
            if let Some(error) = login.last_error.clone() {
                return Err(error);
            }
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxmoxError::Shutdown);
        }

        self.login(host_id, slot, &mut login).await
    }

    /// Replaces a session the host rejected and returns its successor.
    ///
    /// Holders of the same rejected session share one renewal: if a newer
    /// session exists it is returned, and if the renewal issued after
    /// `rejected` failed, its error is returned without contacting the host.
    ///
    /// # Errors
    /// Same as [`SessionManager::acquire`].
    #[instrument(skip(self, rejected), fields(generation = rejected.generation()))]
    pub async fn reacquire(
        &self,
        host_id: &str,
        rejected: &Session,
    ) -> ProxmoxResult<Arc<Session>> {
        let slot = self.slot(host_id)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxmoxError::Shutdown);
        }

        let mut login = slot.login.lock().await;
        {
            let mut current = slot.current.write().await;
            match current.as_ref() {
                Some(session) if session.generation() != rejected.generation() => {
                    return Ok(Arc::clone(session));
                }
                Some(_) => {
                    *current = None;
                    info!(host = host_id, "Session invalidated");
                }
                None => {
                    if login.generation > rejected.generation() {
                        if let Some(error) = login.last_error.clone() {
                            return Err(error);
                        }
                    }
                }
            }
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxmoxError::Shutdown);
        }

        self.login(host_id, slot, &mut login).await
    }

    /// Performs one login while the caller holds the slot's login lock.
    async fn login(
        &self,
        host_id: &str,
        slot: &HostSlot,
        login: &mut LoginState,
    ) -> ProxmoxResult<Arc<Session>> {
        let generation = login.generation + 1;
        let result = self
            .login_service
            .execute(&slot.http_client, &slot.connection, generation)
            .await;
        login.generation = generation;

        let outcome = match result {
            Ok(session) => {
                let session = Arc::new(session);
                *slot.current.write().await = Some(Arc::clone(&session));
                login.last_error = None;
                info!(host = host_id, generation, "Authenticated");
                Ok(session)
            }
            Err(error) => {
                if error.is_authentication() {
                    warn!(host = host_id, kind = "auth", %error, "Credentials rejected");
                } else {
                    warn!(host = host_id, kind = "transient", %error, "Login failed");
                }
                login.last_error = Some(error.clone());
                Err(error)
            }
        };
        slot.attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Drops the session for `host_id` if it is still the one that was rejected.
    ///
    /// A session issued after `rejected` is left alone, so late reporters of
    /// the same rejection do not trigger another login.
    #[instrument(skip(self, rejected), fields(generation = rejected.generation()))]
    pub async fn invalidate(&self, host_id: &str, rejected: &Session) -> ProxmoxResult<()> {
        let slot = self.slot(host_id)?;
        let mut current = slot.current.write().await;
        if current
            .as_ref()
            .is_some_and(|s| s.generation() == rejected.generation())
        {
            *current = None;
            info!(host = host_id, "Session invalidated");
        }
        Ok(())
    }

    /// Current session of a host without logging in.
    pub async fn current(&self, host_id: &str) -> Option<Arc<Session>> {
        match self.slots.get(host_id) {
            Some(slot) => slot.current.read().await.clone(),
            None => None,
        }
    }

    /// Connection details of a configured host.
    pub fn connection(&self, host_id: &str) -> ProxmoxResult<Arc<ProxmoxConnection>> {
        self.slot(host_id).map(|slot| Arc::clone(&slot.connection))
    }

    /// Ids of all configured hosts, in configuration order.
    pub fn host_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Drops every session and refuses further logins.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for (host_id, slot) in &self.slots {
            if slot.current.write().await.take().is_some() {
                info!(host = host_id.as_str(), "Session closed");
            }
        }
    }
}
