use tracing::{debug, info, warn};

use crate::security::session::SessionError;
use crate::transport::AuthApiError;

/// Structured gate events on the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn session_invalid(&self, request_id: &str, path: &str, reason: &SessionError) {
        debug!(target: "audit", event = "session_invalid", request_id, path, reason = %reason);
    }

    pub fn session_refreshed(&self, request_id: &str, path: &str) {
        info!(target: "audit", event = "session_refreshed", request_id, path);
    }

    pub fn refresh_rejected(&self, request_id: &str, path: &str) {
        warn!(target: "audit", event = "refresh_rejected", request_id, path);
    }

    pub fn refresh_failed(&self, request_id: &str, path: &str, error: &AuthApiError) {
        warn!(target: "audit", event = "refresh_failed", request_id, path, error = %error);
    }

    pub fn logout_failed(&self, request_id: &str, error: &AuthApiError) {
        debug!(target: "audit", event = "logout_failed", request_id, error = %error);
    }

    pub fn redirected(&self, request_id: &str, path: &str, location: &str) {
        info!(target: "audit", event = "redirected", request_id, path, location);
    }
}
