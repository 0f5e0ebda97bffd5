//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub discipline: String,
    pub planner: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub graph: GraphCheck,
    pub corpus: CountCheck,
    pub waste: CountCheck,
}

#[derive(Serialize)]
pub struct GraphCheck {
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Serialize)]
pub struct CountCheck {
    pub count: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: esr_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports the size of each loaded data source.
/// Empty sources are valid, so a running server is always ready.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let backends = &state.orchestrator.context().backends;

    Json(ReadyResponse {
        status: "ready".to_string(),
        discipline: state.orchestrator.discipline().to_string(),
        planner: state.config.workflow.planner.to_string(),
        checks: ReadyChecks {
            graph: GraphCheck {
                nodes: backends.graph.node_count(),
                edges: backends.graph.edge_count(),
            },
            corpus: CountCheck {
                count: backends.index.len(),
            },
            waste: CountCheck {
                count: backends.waste.len(),
            },
        },
    })
}
