//! Liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::RecordStore;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Clone)]
struct HealthState {
    store: Arc<dyn RecordStore>,
}

pub fn router(store: Arc<dyn RecordStore>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(HealthState { store })
}

/// Serve the health endpoints until the process exits
pub async fn serve(addr: SocketAddr, store: Arc<dyn RecordStore>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Health server listening");
    axum::serve(listener, router(store)).await?;
    Ok(())
}

async fn root() -> Json<Health> {
    Json(Health {
        status: "running",
        service: "time-cop",
    })
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "time-cop",
    })
}

async fn ready(State(state): State<HealthState>) -> (StatusCode, Json<Health>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Health {
                status: "ready",
                service: "time-cop",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health {
                    status: "unavailable",
                    service: "time-cop",
                }),
            )
        }
    }
}
