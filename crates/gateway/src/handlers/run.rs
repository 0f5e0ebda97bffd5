//! Workflow run handlers
//!
//! Each request drives one run on a spawned task. The handler holds a
//! drop guard on the run's cancellation flag, so a client that disconnects
//! before the run finishes stops it at the next step boundary.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use esr_common::{
    errors::{AppError, Result},
    metrics,
};
use esr_engine::{CancellationFlag, IncidentRecord, RunOutcome, RunRequest};

/// Free-text run request
#[derive(Debug, Deserialize, Validate)]
pub struct RunTaskRequest {
    #[validate(length(min = 1, max = 10000))]
    pub task: String,
}

/// Structured incident run request
#[derive(Debug, Deserialize, Validate)]
pub struct IncidentRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 10000))]
    pub description: String,

    #[validate(length(max = 256))]
    pub material_type: Option<String>,

    #[validate(length(max = 256))]
    pub location: Option<String>,

    #[validate(range(min = 0.0))]
    pub quantity: Option<f64>,

    pub severity: Option<String>,
    pub timestamp: Option<String>,
    pub occurred_at: Option<String>,
    pub recorded_at: Option<String>,
    pub handler_certified: Option<bool>,
    pub labeled: Option<bool>,
    pub contained: Option<bool>,

    #[validate(range(min = -100.0, max = 2000.0))]
    pub temperature_c: Option<f64>,

    pub leak: Option<bool>,
}

impl From<IncidentRequest> for IncidentRecord {
    fn from(r: IncidentRequest) -> Self {
        Self {
            id: r.id,
            description: r.description,
            material_type: r.material_type,
            location: r.location,
            quantity: r.quantity,
            severity: r.severity,
            timestamp: r.timestamp,
            occurred_at: r.occurred_at,
            recorded_at: r.recorded_at,
            handler_certified: r.handler_certified,
            labeled: r.labeled,
            contained: r.contained,
            temperature_c: r.temperature_c,
            leak: r.leak,
        }
    }
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|k| k.to_string()),
    }
}

/// Run a free-text task
pub async fn run_task(
    State(state): State<AppState>,
    Json(request): Json<RunTaskRequest>,
) -> Result<Json<RunOutcome>> {
    request.validate().map_err(validation_error)?;
    execute(&state, RunRequest::Task(request.task), "/v1/run").await
}

/// Run a structured incident
pub async fn run_incident(
    State(state): State<AppState>,
    Json(request): Json<IncidentRequest>,
) -> Result<Json<RunOutcome>> {
    request.validate().map_err(validation_error)?;
    execute(&state, RunRequest::Incident(request.into()), "/v1/incidents").await
}

async fn execute(state: &AppState, request: RunRequest, endpoint: &str) -> Result<Json<RunOutcome>> {
    let start = Instant::now();
    let cancel = CancellationFlag::new();
    let guard = cancel.drop_guard();

    let orchestrator = state.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.run_with_cancel(request, &cancel).await });

    let result = handle
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Run task failed: {}", e),
        })
        .and_then(|r| r);
    guard.disarm();

    match result {
        Ok(outcome) => {
            metrics::record_http_request(endpoint, 200);
            tracing::info!(
                run_id = %outcome.run_id,
                endpoint = endpoint,
                latency_ms = start.elapsed().as_millis() as u64,
                "Run request completed"
            );
            Ok(Json(outcome))
        }
        Err(e) => {
            metrics::record_http_request(endpoint, e.status_code().as_u16());
            Err(e)
        }
    }
}
