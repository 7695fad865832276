//! HTTP surface.
//!
//! | Route               | Response                                    |
//! |---------------------|---------------------------------------------|
//! | `GET /api/rankings` | task snapshot, or `{error}` with 400/429/503 |
//! | `GET /health`       | `{status: "ok", tasks: <live task count>}`  |

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::gate::RankingService;
use crate::params::RawQuery;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    tasks: usize,
}

/// Builds the router for `service`.
pub fn router(service: RankingService) -> Router {
    Router::new()
        .route("/api/rankings", get(rankings))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn rankings(State(service): State<RankingService>, Query(raw): Query<RawQuery>) -> Response {
    let admission = service.admit(&raw).await;
    let status = StatusCode::from_u16(admission.outcome.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(admission.outcome)).into_response()
}

async fn health(State(service): State<RankingService>) -> Json<Health> {
    Json(Health {
        status: "ok",
        tasks: service.tasks().len(),
    })
}

/// Serves `service` on `addr` until `shutdown` is cancelled.
pub async fn serve(service: RankingService, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
