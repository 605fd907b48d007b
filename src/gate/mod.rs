//! Per-request session gate.
//!
//! Every request under a protected prefix is evaluated from scratch: the
//! session cookie is decoded, an invalid session triggers one refresh call,
//! and a failed refresh ends in logout plus a redirect to sign-in. Nothing is
//! cached between requests.

pub mod cookies;
pub mod paths;

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::security::audit_log::AuditLogger;
use crate::security::session::{DecodedSession, SessionDecoder};
use crate::transport::{AuthApiError, AuthBackend};

use cookies::{CookiePolicy, CHANGE_PASSWORD_COOKIE, SESSION_COOKIE};
use paths::PathRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    PendingPasswordChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRedirect {
    pub location: String,
    /// Clear `session` and `refreshToken` on the redirect response.
    pub clear_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    /// Pass, after installing `access_token` as the new session cookie.
    Refreshed { access_token: String },
    Redirect(GateRedirect),
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: SessionState,
    pub decision: GateDecision,
    pub session: Option<DecodedSession>,
}

#[derive(Clone)]
pub struct Gate {
    rules: PathRules,
    decoder: SessionDecoder,
    cookie_policy: CookiePolicy,
    backend: Arc<dyn AuthBackend>,
    audit: AuditLogger,
}

impl Gate {
    pub fn new(config: &Config, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            rules: PathRules::from_config(config),
            decoder: SessionDecoder::new(config.session_secret.as_deref()),
            cookie_policy: CookiePolicy::from_config(config),
            backend,
            audit: AuditLogger::new(),
        }
    }

    pub fn rules(&self) -> &PathRules {
        &self.rules
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie_policy
    }

    /// Decide what happens to a request for `path` carrying `headers`.
    /// Callers only invoke this for protected paths.
    pub async fn evaluate(&self, path: &str, headers: &HeaderMap) -> Evaluation {
        let request_id = Uuid::new_v4().to_string();

        match self.decoder.decode(cookies::get_cookie(headers, SESSION_COOKIE)) {
            Ok(session) => self.authenticated(&request_id, path, headers, session),
            Err(reason) => {
                self.audit.session_invalid(&request_id, path, &reason);
                if self.rules.is_auth_boundary(path) {
                    return Evaluation {
                        state: SessionState::Unauthenticated,
                        decision: GateDecision::Pass,
                        session: None,
                    };
                }
                self.refresh(&request_id, path, headers).await
            }
        }
    }

    fn authenticated(
        &self,
        request_id: &str,
        path: &str,
        headers: &HeaderMap,
        session: DecodedSession,
    ) -> Evaluation {
        let pending = cookies::is_truthy_flag(cookies::get_cookie(headers, CHANGE_PASSWORD_COOKIE));

        let (state, decision) = if pending {
            let decision = if self.rules.is_set_password(path) {
                GateDecision::Pass
            } else {
                self.redirect(request_id, path, self.rules.set_password().to_string(), false)
            };
            (SessionState::PendingPasswordChange, decision)
        } else if self.rules.is_auth_boundary(path) {
            let decision = self.redirect(request_id, path, self.rules.home().to_string(), false);
            (SessionState::Authenticated, decision)
        } else {
            (SessionState::Authenticated, GateDecision::Pass)
        };

        Evaluation {
            state,
            decision,
            session: Some(session),
        }
    }

    async fn refresh(&self, request_id: &str, path: &str, headers: &HeaderMap) -> Evaluation {
        let forwarded = cookies::cookie_header(headers);

        match self.backend.refresh(forwarded.as_deref()).await {
            Ok(access_token) => {
                self.audit.session_refreshed(request_id, path);
                let session = self.decoder.decode(Some(&access_token)).ok();
                if session.is_none() {
                    debug!(request_id, "refreshed session credential did not decode");
                }
                Evaluation {
                    state: if session.is_some() {
                        SessionState::Authenticated
                    } else {
                        SessionState::Unauthenticated
                    },
                    decision: GateDecision::Refreshed { access_token },
                    session,
                }
            }
            Err(err) => {
                match &err {
                    AuthApiError::Rejected => self.audit.refresh_rejected(request_id, path),
                    other => self.audit.refresh_failed(request_id, path, other),
                }

                if let Err(logout_err) = self.backend.logout(forwarded.as_deref()).await {
                    self.audit.logout_failed(request_id, &logout_err);
                }

                let location = self.rules.signin_redirect(path);
                Evaluation {
                    state: SessionState::Unauthenticated,
                    decision: self.redirect(request_id, path, location, true),
                    session: None,
                }
            }
        }
    }

    fn redirect(&self, request_id: &str, path: &str, location: String, clear_session: bool) -> GateDecision {
        self.audit.redirected(request_id, path, &location);
        GateDecision::Redirect(GateRedirect {
            location,
            clear_session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;
    use base64::{engine::general_purpose, Engine};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Outcome {
        Grant,
        Reject,
        Fail,
    }

    struct StubBackend {
        outcome: Outcome,
        logout_fails: bool,
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
        seen_cookies: Mutex<Option<String>>,
    }

    impl StubBackend {
        fn new(outcome: Outcome) -> Arc<Self> {
            Self::with_logout(outcome, false)
        }

        fn with_logout(outcome: Outcome, logout_fails: bool) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                logout_fails,
                refresh_calls: AtomicUsize::new(0),
                logout_calls: AtomicUsize::new(0),
                seen_cookies: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl AuthBackend for StubBackend {
        async fn refresh(&self, cookies: Option<&str>) -> Result<String, AuthApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_cookies.lock().unwrap() = cookies.map(str::to_string);
            match self.outcome {
                Outcome::Grant => Ok(token(Utc::now().timestamp() + 900)),
                Outcome::Reject => Err(AuthApiError::Rejected),
                Outcome::Fail => Err(AuthApiError::UnexpectedStatus(502)),
            }
        }

        async fn logout(&self, _cookies: Option<&str>) -> Result<(), AuthApiError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.logout_fails {
                Err(AuthApiError::UnexpectedStatus(500))
            } else {
                Ok(())
            }
        }
    }

    fn token(exp: i64) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = general_purpose::URL_SAFE_NO_PAD
            .encode(format!(r#"{{"id":7,"email":"a@b.c","exp":{exp}}}"#));
        format!("{header}.{body}.x")
    }

    fn cookies(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        map
    }

    fn gate(backend: Arc<StubBackend>) -> Gate {
        Gate::new(&Config::default(), backend)
    }

    #[tokio::test]
    async fn test_valid_session_passes() {
        let backend = StubBackend::new(Outcome::Reject);
        let headers = cookies(&format!("session={}", token(Utc::now().timestamp() + 60)));

        let eval = gate(backend.clone()).evaluate("/dashboard/news", &headers).await;
        assert_eq!(eval.decision, GateDecision::Pass);
        assert_eq!(eval.state, SessionState::Authenticated);
        assert_eq!(eval.session.unwrap().subject().as_deref(), Some("7"));
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_without_identifier_passes_without_refresh() {
        let backend = StubBackend::new(Outcome::Grant);
        let exp = Utc::now().timestamp() + 60;
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = general_purpose::URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        let headers = cookies(&format!("session={header}.{body}.x"));

        let eval = gate(backend.clone()).evaluate("/dashboard/news", &headers).await;
        assert_eq!(eval.decision, GateDecision::Pass);
        assert_eq!(eval.state, SessionState::Authenticated);
        assert!(eval.session.unwrap().subject().is_none());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_session_refreshes_with_forwarded_cookies() {
        let backend = StubBackend::new(Outcome::Grant);
        let headers = cookies("refreshToken=r-123");

        let eval = gate(backend.clone()).evaluate("/dashboard", &headers).await;
        assert!(matches!(eval.decision, GateDecision::Refreshed { .. }));
        assert_eq!(eval.state, SessionState::Authenticated);
        assert!(eval.session.is_some());
        assert_eq!(
            backend.seen_cookies.lock().unwrap().as_deref(),
            Some("refreshToken=r-123")
        );
        assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_logs_out_and_redirects() {
        let backend = StubBackend::new(Outcome::Reject);

        let eval = gate(backend.clone())
            .evaluate("/dashboard/users", &HeaderMap::new())
            .await;
        assert_eq!(
            eval.decision,
            GateDecision::Redirect(GateRedirect {
                location: "/auth/signin?redirect=/dashboard/users".to_string(),
                clear_session: true,
            })
        );
        assert_eq!(eval.state, SessionState::Unauthenticated);
        assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_and_failed_logout_still_redirect() {
        let backend = StubBackend::with_logout(Outcome::Fail, true);

        let eval = gate(backend.clone()).evaluate("/dashboard", &HeaderMap::new()).await;
        assert!(matches!(
            eval.decision,
            GateDecision::Redirect(GateRedirect { clear_session: true, .. })
        ));
        assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_boundary_without_session_passes() {
        let backend = StubBackend::new(Outcome::Reject);

        let eval = gate(backend.clone()).evaluate("/auth/signin", &HeaderMap::new()).await;
        assert_eq!(eval.decision, GateDecision::Pass);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pending_password_change() {
        let backend = StubBackend::new(Outcome::Reject);
        let gate = gate(backend);
        let headers = cookies(&format!(
            "session={}; is_change_password=true",
            token(Utc::now().timestamp() + 60)
        ));

        let eval = gate.evaluate("/dashboard", &headers).await;
        assert_eq!(eval.state, SessionState::PendingPasswordChange);
        assert_eq!(
            eval.decision,
            GateDecision::Redirect(GateRedirect {
                location: "/auth/set-password".to_string(),
                clear_session: false,
            })
        );

        let eval = gate.evaluate("/auth/set-password", &headers).await;
        assert_eq!(eval.decision, GateDecision::Pass);
    }

    #[tokio::test]
    async fn test_authenticated_on_auth_boundary_goes_home() {
        let backend = StubBackend::new(Outcome::Reject);
        let headers = cookies(&format!(
            "session={}; is_change_password=false",
            token(Utc::now().timestamp() + 60)
        ));

        let eval = gate(backend).evaluate("/auth/set-password", &headers).await;
        assert_eq!(
            eval.decision,
            GateDecision::Redirect(GateRedirect {
                location: "/".to_string(),
                clear_session: false,
            })
        );
    }
}
