//! HTTP entropy server.
//!
//! Serves uniform floats and bounded integers from a running [`BioRng`] pool
//! as JSON. Every draw is bounded by a server-side timeout so a stalled
//! producer turns into `503` responses instead of hung connections.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use biorng_core::{BioRng, EntropyPool, PoolError, PoolStatus};

/// Upper bound on values per request.
pub const MAX_COUNT: usize = 1024;

/// Shared server state.
struct AppState {
    pool: Arc<EntropyPool>,
    source: &'static str,
    mea: u8,
    sample_size: usize,
    draw_timeout: Duration,
}

#[derive(Deserialize)]
struct RandParams {
    count: Option<usize>,
}

#[derive(Deserialize)]
struct RandIntParams {
    min: i64,
    max: i64,
    count: Option<usize>,
}

#[derive(Serialize)]
struct RandResponse<T> {
    count: usize,
    data: Vec<T>,
    success: bool,
    /// Error message if request failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    source: String,
    mea: u8,
    sample_size: usize,
    pool: PoolStatus,
}

fn clamp_count(count: Option<usize>) -> usize {
    count.unwrap_or(1).clamp(1, MAX_COUNT)
}

fn status_for(err: &PoolError) -> StatusCode {
    match err {
        PoolError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
        PoolError::Timeout(_) | PoolError::Cancelled | PoolError::Closed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Build the response for a draw loop. Values drawn before a failure are
/// returned alongside the error so they are not lost from the pool.
fn respond<T>(data: Vec<T>, failure: Option<PoolError>) -> (StatusCode, Json<RandResponse<T>>) {
    let status = failure.as_ref().map_or(StatusCode::OK, status_for);
    (
        status,
        Json(RandResponse {
            count: data.len(),
            data,
            success: failure.is_none(),
            error: failure.map(|e| e.to_string()),
        }),
    )
}

async fn handle_rand(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RandParams>,
) -> (StatusCode, Json<RandResponse<f64>>) {
    let count = clamp_count(params.count);
    let mut data = Vec::with_capacity(count);
    let mut failure = None;
    for _ in 0..count {
        match state.pool.rand_timeout(state.draw_timeout).await {
            Ok(v) => data.push(v),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    respond(data, failure)
}

async fn handle_rand_int(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RandIntParams>,
) -> (StatusCode, Json<RandResponse<i64>>) {
    let count = clamp_count(params.count);
    let mut data = Vec::with_capacity(count);
    let mut failure = None;
    for _ in 0..count {
        match state
            .pool
            .rand_int_timeout(params.min, params.max, state.draw_timeout)
            .await
        {
            Ok(v) => data.push(v),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    respond(data, failure)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pool = state.pool.status();
    let status = if pool.closed || pool.cancelled {
        "stopped"
    } else if pool.available > 0 {
        "healthy"
    } else {
        "starved"
    };
    Json(HealthResponse {
        status: status.to_string(),
        source: state.source.to_string(),
        mea: state.mea,
        sample_size: state.sample_size,
        pool,
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "BioRNG Server",
        "version": biorng_core::VERSION,
        "source": state.source,
        "mea": state.mea,
        "endpoints": {
            "/": "This API index",
            "/api/v1/rand": {
                "method": "GET",
                "description": "Uniform floats in [0, 1]",
                "params": {
                    "count": format!("Number of values (1-{MAX_COUNT}, default: 1)"),
                }
            },
            "/api/v1/randint": {
                "method": "GET",
                "description": "Uniform integers in [min, max]",
                "params": {
                    "min": "Inclusive lower bound (required)",
                    "max": "Inclusive upper bound (required, >= min)",
                    "count": format!("Number of values (1-{MAX_COUNT}, default: 1)"),
                }
            },
            "/health": "Pool and producer status",
        },
        "examples": {
            "floats": "/api/v1/rand?count=8",
            "dice": "/api/v1/randint?min=1&max=6&count=10",
        }
    }))
}

/// Build the axum router over a running generator.
pub fn build_router(rng: &BioRng, draw_timeout: Duration) -> Router {
    let state = Arc::new(AppState {
        pool: rng.pool(),
        source: rng.source_name(),
        mea: rng.config().mea.get(),
        sample_size: rng.config().sample_size,
        draw_timeout,
    });
    router(state)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/v1/rand", get(handle_rand))
        .route("/api/v1/randint", get(handle_rand_int))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the HTTP entropy server until `shutdown` resolves.
pub async fn run_server<F>(
    rng: &BioRng,
    host: &str,
    port: u16,
    draw_timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(rng, draw_timeout);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
