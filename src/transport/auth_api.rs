use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::{AuthApiError, AuthBackend};

const REFRESH_PATH: &str = "/auth/refresh-token";
const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: Option<String>,
}

/// `reqwest` client for the backend auth endpoints.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base_url: String,
    http_client: Client,
}

impl HttpAuthApi {
    /// `timeout` of `None` leaves only the transport defaults in place.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("creating HTTP client")?;

        debug!("auth API client initialized with base_url={}", base_url);
        Ok(Self::with_client(base_url, http_client))
    }

    pub fn with_client(base_url: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, cookies: Option<&str>) -> Result<reqwest::Response, AuthApiError> {
        let url = self.endpoint(path);
        trace!(url = %url, forwards_cookies = cookies.is_some(), "calling auth API");

        let mut request = self.http_client.post(&url);
        if let Some(cookies) = cookies {
            request = request.header(COOKIE, cookies);
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthApi {
    async fn refresh(&self, cookies: Option<&str>) -> Result<String, AuthApiError> {
        let response = self.post(REFRESH_PATH, cookies).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthApiError::Rejected);
        }
        if !status.is_success() {
            return Err(AuthApiError::UnexpectedStatus(status.as_u16()));
        }

        let body: RefreshResponse = response.json().await?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthApiError::MissingToken)
    }

    async fn logout(&self, cookies: Option<&str>) -> Result<(), AuthApiError> {
        let response = self.post(LOGOUT_PATH, cookies).await?;
        debug!(status = %response.status(), "auth API logout answered");
        Ok(())
    }
}
