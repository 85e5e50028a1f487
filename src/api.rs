//! REST API handlers for the dance school timetable.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::constraints::calculate_score;
use crate::demo_data::{self, DemoData};
use crate::domain::ProblemId;
use crate::dto::{
    AnalyzeResponse, HealthResponse, InfoResponse, ScheduleSolutionResponse, SolveResponse,
    SolverStatusResponse,
};
use crate::service::SolverService;
use crate::solver::SessionError;
use crate::store::StoreError;

/// Application state shared across handlers.
pub struct AppState {
    service: SolverService,
}

impl AppState {
    pub fn new(service: SolverService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &SolverService {
        &self.service
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}", get(get_demo_data))
        // Solver
        .route("/api/solver/solve", post(solve))
        .route("/api/solver/status/{id}", get(get_status))
        .route("/api/solver/terminate/{id}", post(terminate))
        .route("/api/solver/solution/{id}", get(get_solution))
        .route("/api/solver/analysis/{id}", get(get_analysis))
        .with_state(state)
}

// ============================================================================
// Health & Info
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Dance School Timetable",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "Local Search",
    })
}

// ============================================================================
// Demo data
// ============================================================================

async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

async fn get_demo_data(Path(id): Path<String>) -> Result<Json<ScheduleSolutionResponse>, StatusCode> {
    match id.parse::<DemoData>() {
        Ok(demo) => {
            let mut schedule = demo_data::generate(demo);
            schedule.score = Some(calculate_score(&schedule));
            Ok(Json(ScheduleSolutionResponse::from_schedule(&schedule)))
        }
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

// ============================================================================
// Solver
// ============================================================================

async fn solve(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SolveResponse>), (StatusCode, String)> {
    let id = Utc::now().timestamp_millis().max(0) as ProblemId;
    match state.service.solve(id) {
        Ok(id) => Ok((StatusCode::ACCEPTED, Json(SolveResponse::started(id)))),
        Err(e @ SessionError::AlreadySolving(_)) => Err((StatusCode::CONFLICT, e.to_string())),
        Err(e) => {
            error!(problem_id = id, error = %e, "Failed to start solver");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> Json<SolverStatusResponse> {
    let status = state.service.status(id);
    let score = state.service.best_score(id).map(|s| s.to_string());
    Json(SolverStatusResponse::new(id, status, score))
}

async fn terminate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> (StatusCode, String) {
    if state.service.terminate_early(id) {
        info!(problem_id = id, "Termination requested");
        (
            StatusCode::OK,
            format!("Solver termination requested for schedule {}", id),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            format!("Solver is not running for schedule {}", id),
        )
    }
}

async fn get_solution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> Result<Json<ScheduleSolutionResponse>, (StatusCode, String)> {
    let schedule = state.service.current_solution(id).map_err(store_error)?;
    Ok(Json(ScheduleSolutionResponse::from_schedule(&schedule)))
}

async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, String)> {
    let analysis = state.service.analyze(id).map_err(store_error)?;
    Ok(Json(AnalyzeResponse::new(id, &analysis)))
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Invalid(_) => {
            error!(error = %e, "Stored timetable is inconsistent");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
