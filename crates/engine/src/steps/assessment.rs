//! Assessment steps: compliance and risk scoring

use super::{Step, StepContext};
use crate::scoring::{evaluate_compliance, evaluate_risk, parse_timestamp, ComplianceContext, RiskPayload};
use crate::state::{IncidentState, StepOutput};
use crate::step::StepId;
use async_trait::async_trait;

/// Temperature assumed when the incident does not report one
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn mentions_leak(state: &IncidentState) -> bool {
    state.task.to_lowercase().contains("leak")
}

/// Scores the incident against the compliance rules
pub struct ComplianceStep;

impl ComplianceStep {
    /// Incident facts where given, otherwise: both times at run start,
    /// certified and labeled handler, contained unless the task mentions a
    /// leak.
    ///
    /// A defaulted recording time takes the same shape (naive or
    /// offset-aware) as the incident time so the pair stays comparable.
    pub fn context(state: &IncidentState) -> ComplianceContext {
        let incident = state.incident.as_ref();
        let incident_time = incident
            .and_then(|i| i.occurred_at.clone().or_else(|| i.timestamp.clone()));

        let naive_incident = incident_time
            .as_deref()
            .and_then(parse_timestamp)
            .is_some_and(|(_, aware)| !aware);
        let started = if naive_incident {
            state.started_at.naive_utc().format(NAIVE_FORMAT).to_string()
        } else {
            state.started_at.to_rfc3339()
        };

        ComplianceContext {
            incident_time: incident_time.or_else(|| Some(started.clone())),
            recorded_time: incident
                .and_then(|i| i.recorded_at.clone())
                .or(Some(started)),
            handler_certified: incident.and_then(|i| i.handler_certified).unwrap_or(true),
            labeled: incident.and_then(|i| i.labeled).unwrap_or(true),
            contained: incident
                .and_then(|i| i.contained)
                .unwrap_or_else(|| !mentions_leak(state)),
        }
    }
}

#[async_trait]
impl Step for ComplianceStep {
    fn id(&self) -> StepId {
        StepId::ComplianceCheck
    }

    async fn run(&self, state: &IncidentState, _ctx: &StepContext) -> StepOutput {
        StepOutput::Compliance(evaluate_compliance(&Self::context(state)))
    }
}

/// Runs the risk heuristic
pub struct RiskStep;

impl RiskStep {
    /// Material from the graph, else the incident, else `Unknown`. Quantity
    /// from the first waste row, else the incident.
    pub fn payload(state: &IncidentState) -> RiskPayload {
        let incident = state.incident.as_ref();

        let material = state.material().unwrap_or("Unknown").to_string();

        let quantity_kg = state
            .waste_info
            .as_ref()
            .and_then(|w| w.results.first())
            .map(|r| r.quantity_kg)
            .or_else(|| incident.and_then(|i| i.quantity))
            .unwrap_or(0.0);

        RiskPayload {
            material,
            temperature_c: incident
                .and_then(|i| i.temperature_c)
                .unwrap_or(DEFAULT_TEMPERATURE_C),
            leak: incident
                .and_then(|i| i.leak)
                .unwrap_or_else(|| mentions_leak(state)),
            quantity_kg,
        }
    }
}

#[async_trait]
impl Step for RiskStep {
    fn id(&self) -> StepId {
        StepId::RiskAnalysis
    }

    async fn run(&self, state: &IncidentState, _ctx: &StepContext) -> StepOutput {
        StepOutput::Risk(evaluate_risk(&Self::payload(state)))
    }
}
