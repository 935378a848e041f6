use crate::core::domain::value_object::{ProxmoxCSRFToken, ProxmoxTicket};
use std::time::SystemTime;

/// Authenticated state for one host: ticket, anti-forgery token and issue time.
///
/// Owned by the `SessionManager`; callers hold it behind an `Arc` only for
/// the duration of a request. `generation` increases with every login on
/// the same host, so a rejection can be matched to the session it hit.
#[derive(Debug, Clone)]
pub struct Session {
    host_id: String,
    ticket: ProxmoxTicket,
    csrf_token: ProxmoxCSRFToken,
    issued_at: SystemTime,
    generation: u64,
}

impl Session {
    pub(crate) fn new(
        host_id: impl Into<String>,
        ticket: ProxmoxTicket,
        csrf_token: ProxmoxCSRFToken,
        generation: u64,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            ticket,
            csrf_token,
            issued_at: SystemTime::now(),
            generation,
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn ticket(&self) -> &ProxmoxTicket {
        &self.ticket
    }

    pub fn csrf_token(&self) -> &ProxmoxCSRFToken {
        &self.csrf_token
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
