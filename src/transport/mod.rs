pub mod auth_api;
pub mod upstream;

use async_trait::async_trait;
use thiserror::Error;

pub use auth_api::HttpAuthApi;

#[derive(Debug, Error)]
pub enum AuthApiError {
    /// The API answered 401: the refresh credential is no longer accepted.
    #[error("refresh rejected by auth API")]
    Rejected,

    #[error("auth API returned unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("auth API response carried no access token")]
    MissingToken,

    #[error("auth API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outbound calls the gate makes on behalf of a browser.
///
/// `cookies` is the browser's `Cookie` header, forwarded verbatim so the API
/// sees the refresh credential.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange the refresh credential for a new session credential.
    async fn refresh(&self, cookies: Option<&str>) -> Result<String, AuthApiError>;

    async fn logout(&self, cookies: Option<&str>) -> Result<(), AuthApiError>;
}
