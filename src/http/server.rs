//! HTTP gateway in front of the channel client.
//!
//! # Responsibilities
//! - Expose transaction submission and lookup as JSON endpoints
//! - Wire up middleware (request id, tracing, request timeout)
//! - Stop accepting connections when shutdown fires
//!
//! # Routes
//! - `POST /v1/transactions` `{businessId, hash}` → `201 {transactionId}`
//! - `GET /v1/transactions/{id}` → `200 {transactionId}`
//! - `GET /health` → channel readiness

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::{ChannelClient, CreateTransPayload, TransactionReceipt};
use crate::config::ListenerConfig;
use crate::http::response::ApiError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ChannelClient>,
}

/// Readiness report for `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub channel: String,
    pub peers: usize,
    pub orderers: usize,
}

pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(client: Arc<ChannelClient>, config: &ListenerConfig) -> Self {
        let router = Self::build_router(AppState { client }, config);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, config: &ListenerConfig) -> Router {
        Router::new()
            .route("/v1/transactions", post(submit_transaction))
            .route("/v1/transactions/{id}", get(query_transaction))
            .route("/health", get(health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP gateway starting");

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP gateway stopped");
        Ok(())
    }
}

async fn submit_transaction(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionReceipt>), ApiError> {
    let result: Result<(StatusCode, Json<TransactionReceipt>), ApiError> = async {
        let Json(payload) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
        payload.validate().map_err(ApiError::bad_request)?;
        let transaction_id = state.client.send_transaction(&payload).await?;
        Ok((StatusCode::CREATED, Json(TransactionReceipt { transaction_id })))
    }
    .await;
    metrics::record_request("submit", status_of(&result, StatusCode::CREATED));
    result
}

async fn query_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionReceipt>, ApiError> {
    let result = state
        .client
        .send_query(&id)
        .await
        .map(|transaction_id| Json(TransactionReceipt { transaction_id }))
        .map_err(ApiError::from);
    metrics::record_request("query", status_of(&result, StatusCode::OK));
    result
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let channel = state.client.binding().channel.clone();
    let status = match state.client.cached_topology() {
        Some(topology) if topology.is_initialized() => HealthStatus {
            status: "ready",
            channel,
            peers: topology.peers().len(),
            orderers: topology.orderers().len(),
        },
        _ => HealthStatus {
            status: "starting",
            channel,
            peers: 0,
            orderers: 0,
        },
    };
    Json(status)
}

fn status_of<T>(result: &Result<T, ApiError>, ok: StatusCode) -> u16 {
    match result {
        Ok(_) => ok.as_u16(),
        Err(e) => e.status().as_u16(),
    }
}
