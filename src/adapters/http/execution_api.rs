//! Execution control API.
//!
//! Exposes the execution service over HTTP under `/api/v2/execution`.
//! Start is asynchronous: it returns 202 with the new run id and clients
//! poll the status and progress endpoints. Service errors map to
//! 404 (`NotFound`), 400 (`InvalidState` / bad input), and 500.

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Atom, ExecutionPlan, ExecutionProgress, ExecutionResult, ExecutionState, ExecutionStatus,
    RunMetrics, ServerConfig, WaveResult,
};
use crate::services::ExecutionService;

/// Request to start a run.
#[derive(Debug, Deserialize)]
pub struct StartExecutionRequest {
    pub masterplan_id: Uuid,
    pub plan: ExecutionPlan,
    pub atoms_by_id: HashMap<String, Atom>,
}

/// Response to a start request.
#[derive(Debug, Serialize)]
pub struct StartExecutionResponse {
    pub execution_id: Uuid,
    pub status: String,
}

/// Response to pause/resume requests.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub execution_id: Uuid,
    pub status: String,
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_executions: usize,
}

/// Full run state on the wire. Timestamps are RFC 3339 with offset.
#[derive(Debug, Serialize)]
pub struct ExecutionStateResponse {
    pub execution_id: Uuid,
    pub masterplan_id: Uuid,
    pub status: String,
    pub current_wave: usize,
    pub total_waves: usize,
    pub atoms_completed: usize,
    pub atoms_total: usize,
    pub atoms_succeeded: usize,
    pub atoms_failed: usize,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<ExecutionState> for ExecutionStateResponse {
    fn from(state: ExecutionState) -> Self {
        Self {
            execution_id: state.id,
            masterplan_id: state.masterplan_id,
            status: state.status.as_str().to_string(),
            current_wave: state.current_wave,
            total_waves: state.total_waves,
            atoms_completed: state.atoms_completed,
            atoms_total: state.atoms_total,
            atoms_succeeded: state.atoms_succeeded,
            atoms_failed: state.atoms_failed,
            total_cost_usd: state.total_cost_usd,
            total_time_seconds: state.total_time_seconds,
            error: state.error,
            created_at: state.created_at.to_rfc3339(),
            started_at: state.started_at.map(|dt| dt.to_rfc3339()),
            completed_at: state.completed_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: DomainError) -> ApiError {
    let (status, code) = match &err {
        DomainError::ExecutionNotFound(_)
        | DomainError::WaveNotFound { .. }
        | DomainError::AtomNotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::InvalidStateTransition { .. } => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
        DomainError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
        DomainError::SerializationError(_) | DomainError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Build the control API router.
pub fn build_router(service: Arc<ExecutionService>) -> Router {
    // Specific routes are registered before the parameterised `/{id}`
    // routes so `/health` and `/start` are never parsed as run ids.
    Router::new()
        .route("/api/v2/execution/start", post(start_execution))
        .route("/api/v2/execution/health", get(health))
        .route("/api/v2/execution/{id}", get(get_state))
        .route("/api/v2/execution/{id}/progress", get(get_progress))
        .route("/api/v2/execution/{id}/waves/{wave_index}", get(get_wave_result))
        .route("/api/v2/execution/{id}/atoms/{atom_id}", get(get_atom_result))
        .route("/api/v2/execution/{id}/pause", post(pause_execution))
        .route("/api/v2/execution/{id}/resume", post(resume_execution))
        .route("/api/v2/execution/{id}/metrics", get(get_metrics))
        .with_state(service)
}

/// Configuration plus service, bound into a server.
pub struct ExecutionHttpServer {
    config: ServerConfig,
    service: Arc<ExecutionService>,
}

impl ExecutionHttpServer {
    pub fn new(service: Arc<ExecutionService>, config: ServerConfig) -> Self {
        Self { config, service }
    }

    fn layered_router(&self) -> Router {
        let router = build_router(self.service.clone());
        if self.config.enable_cors {
            router
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(TraceLayer::new_for_http())
        } else {
            router.layer(TraceLayer::new_for_http())
        }
    }

    /// Serve until the shutdown future resolves, then drain the service.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.layered_router();
        let service = self.service.clone();

        tracing::info!("execution control API listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        service.shutdown().await;
        Ok(())
    }
}

// Handler functions

async fn health(State(service): State<Arc<ExecutionService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_executions: service.active_run_count().await,
    })
}

async fn start_execution(
    State(service): State<Arc<ExecutionService>>,
    payload: Result<Json<StartExecutionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartExecutionResponse>), ApiError> {
    // Unparseable or mis-shaped bodies are a 400, not a 422.
    let Json(req) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: rejection.body_text(),
                code: "BAD_REQUEST".to_string(),
            }),
        )
    })?;

    let execution_id = service
        .start_execution(req.masterplan_id, req.plan, req.atoms_by_id)
        .await
        .map_err(error_response)?;

    let status = service
        .get_state(execution_id)
        .await
        .map(|state| state.status.as_str().to_string())
        .unwrap_or_else(|_| ExecutionStatus::Pending.as_str().to_string());

    Ok((
        StatusCode::ACCEPTED,
        Json(StartExecutionResponse {
            execution_id,
            status,
        }),
    ))
}

async fn get_state(
    State(service): State<Arc<ExecutionService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionStateResponse>, ApiError> {
    service
        .get_state(id)
        .await
        .map(|state| Json(ExecutionStateResponse::from(state)))
        .map_err(error_response)
}

async fn get_progress(
    State(service): State<Arc<ExecutionService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionProgress>, ApiError> {
    service
        .get_progress(id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn get_wave_result(
    State(service): State<Arc<ExecutionService>>,
    Path((id, wave_index)): Path<(Uuid, usize)>,
) -> Result<Json<WaveResult>, ApiError> {
    service
        .get_wave_result(id, wave_index)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn get_atom_result(
    State(service): State<Arc<ExecutionService>>,
    Path((id, atom_id)): Path<(Uuid, String)>,
) -> Result<Json<ExecutionResult>, ApiError> {
    service
        .get_atom_result(id, &atom_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn pause_execution(
    State(service): State<Arc<ExecutionService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ControlResponse>, ApiError> {
    service
        .pause(id)
        .await
        .map(|state| {
            Json(ControlResponse {
                execution_id: id,
                status: state.status.as_str().to_string(),
            })
        })
        .map_err(error_response)
}

async fn resume_execution(
    State(service): State<Arc<ExecutionService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ControlResponse>, ApiError> {
    service
        .resume(id)
        .await
        .map(|state| {
            Json(ControlResponse {
                execution_id: id,
                status: state.status.as_str().to_string(),
            })
        })
        .map_err(error_response)
}

async fn get_metrics(
    State(service): State<Arc<ExecutionService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunMetrics>, ApiError> {
    service
        .get_metrics(id)
        .await
        .map(Json)
        .map_err(error_response)
}
