//! HTTP surface for the bridge flows.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::bridger::Bridger;
use crate::error::{BridgeError, ErrorKind};
use crate::flow::{
    BridgeService, ClaimRequest, DepositRequest, RegisterRequest, TransferRequest,
    WithdrawRequest,
};
use crate::outcome::{ErrorBody, Outcome};
use crate::types::BridgeResult;

pub struct AppState<B> {
    pub service: Arc<BridgeService<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn error_response(err: &BridgeError) -> Response {
    let status = match err.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody::from(err))).into_response()
}

fn respond(route: &str, result: BridgeResult<Outcome>) -> Response {
    match result {
        Ok(outcome) => {
            info!(route, "request completed");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => {
            info!(route, kind = ?err.kind(), error = %err, "request failed");
            error_response(&err)
        }
    }
}

/// Empty and malformed bodies are client errors.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(error_response(&BridgeError::invalid("request body is empty")));
    }
    serde_json::from_slice(body).map_err(|err| {
        error_response(&BridgeError::invalid(format!(
            "malformed request body: {err}"
        )))
    })
}

async fn deposit<B: Bridger + 'static>(State(state): State<AppState<B>>, body: Bytes) -> Response {
    let request: DepositRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond("/bridge/deposit", state.service.deposit(request).await)
}

async fn withdraw<B: Bridger + 'static>(State(state): State<AppState<B>>, body: Bytes) -> Response {
    let request: WithdrawRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond("/bridge/withdraw", state.service.withdraw(request).await)
}

async fn claim<B: Bridger + 'static>(State(state): State<AppState<B>>, body: Bytes) -> Response {
    let request: ClaimRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond("/bridge/claim", state.service.claim(request).await)
}

async fn transfer<B: Bridger + 'static>(State(state): State<AppState<B>>, body: Bytes) -> Response {
    let request: TransferRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond("/bridge/transfer", state.service.transfer(request).await)
}

async fn register<B: Bridger + 'static>(State(state): State<AppState<B>>, body: Bytes) -> Response {
    let request: RegisterRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    respond("/bridge/register", state.service.register(request).await)
}

pub fn router<B: Bridger + 'static>(service: Arc<BridgeService<B>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bridge/deposit", post(deposit::<B>))
        .route("/bridge/withdraw", post(withdraw::<B>))
        .route("/bridge/claim", post(claim::<B>))
        .route("/bridge/transfer", post(transfer::<B>))
        .route("/bridge/register", post(register::<B>))
        .with_state(AppState { service })
}

/// Serve until ctrl-c.
pub async fn start_server<B: Bridger + 'static>(
    bind_address: &str,
    service: Arc<BridgeService<B>>,
) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| anyhow!("Invalid bind address {bind_address}: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Bridge server listening on {}", listener.local_addr()?);
    info!("  POST /bridge/deposit | /bridge/withdraw | /bridge/claim | /bridge/transfer");
    info!("  GET  /health");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}
