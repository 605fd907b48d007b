use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::gate::cookies::{self, REFRESH_COOKIE, SESSION_COOKIE};
use crate::gate::{Gate, GateDecision, GateRedirect};
use crate::transport::{upstream, AuthBackend, HttpAuthApi};

const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Gate,
    pub http_client: Client,
}

impl AppState {
    /// State wired to the real auth API at `config.api_base_url`.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let timeout = (config.api_timeout_secs > 0).then(|| Duration::from_secs(config.api_timeout_secs));
        let backend = HttpAuthApi::new(&config.api_base_url, timeout)?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: Arc<Config>, backend: Arc<dyn AuthBackend>) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("creating upstream HTTP client")?;

        Ok(Self {
            gate: Gate::new(&config, backend),
            config,
            http_client,
        })
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn redirect_response(redirect: &GateRedirect) -> Response {
    let location = match HeaderValue::from_str(&redirect.location) {
        Ok(v) => v,
        Err(e) => {
            error!("redirect location is not a valid header: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response();
    if redirect.clear_session {
        for name in [SESSION_COOKIE, REFRESH_COOKIE] {
            let expired = HeaderValue::from_str(&cookies::expired_cookie(name));
            if let Ok(value) = expired {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
    }
    response
}

/// Gate every request under a protected prefix; everything else passes untouched.
pub async fn gate_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.gate.rules().is_protected(&path) {
        return next.run(request).await;
    }

    let evaluation = state.gate.evaluate(&path, request.headers()).await;
    if let Some(session) = evaluation.session {
        request.extensions_mut().insert(session);
    }

    match evaluation.decision {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Refreshed { access_token } => {
            if let Err(e) = cookies::replace_cookie(request.headers_mut(), SESSION_COOKIE, &access_token) {
                warn!("refreshed session not forwarded: {}", e);
            }

            let mut response = next.run(request).await;
            let cookie = state.gate.cookie_policy().session_cookie(&access_token);
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!("refreshed session cookie not set: {}", e),
            }
            response
        }
        GateDecision::Redirect(redirect) => redirect_response(&redirect),
    }
}

async fn forward_upstream(State(state): State<SharedState>, request: Request) -> Response {
    let Some(upstream_url) = state.config.upstream_url.as_deref() else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Not found".to_string(),
            }),
        )
            .into_response();
    };

    match upstream::forward(&state.http_client, upstream_url, request).await {
        Ok(response) => response,
        Err(e) => {
            error!("upstream forwarding failed: {:#}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Upstream unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(forward_upstream)
        .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(Arc::new(config))?);

    match &state.config.upstream_url {
        Some(upstream) => info!("gating requests in front of {}", upstream),
        None => info!("no upstream configured; passed requests answer 404"),
    }

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).into_future().await?;
    Ok(())
}
