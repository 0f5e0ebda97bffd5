//! Steps that talk to collaborators: insurer, report narrative, audit sink

use super::{resolve_container, Step, StepContext};
use crate::audit::AuditEntry;
use crate::insurer::InsurerRequest;
use crate::report::{self, Report};
use crate::state::{IncidentState, StepOutput};
use crate::step::StepId;
use async_trait::async_trait;
use esr_common::config::PlannerMode;
use esr_common::metrics;
use sha2::{Digest, Sha256};

/// Query sent for clause lookups on free-text runs
pub const CLAUSE_QUERY: &str = "CLAUSE";

/// Event name of the terminal audit entry
pub const WORKFLOW_COMPLETE_EVENT: &str = "workflow_complete";

/// Claim submission for structured incidents, clause lookup otherwise
pub struct InsurerStep;

#[async_trait]
impl Step for InsurerStep {
    fn id(&self) -> StepId {
        StepId::InsurerLookup
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let request = match &state.incident {
            Some(incident) => InsurerRequest::Claim(incident.clone()),
            None => InsurerRequest::Clause {
                query: CLAUSE_QUERY.to_string(),
            },
        };

        let response = ctx.insurer.submit(&request).await;
        if let Some(error) = &response.error {
            tracing::warn!(
                run_id = %state.run_id,
                client = ctx.insurer.name(),
                error = %error,
                "Insurer submission failed"
            );
        }

        StepOutput::Insurer(response)
    }
}

/// Renders the report, optionally with a classifier narrative
pub struct ReportStep;

impl ReportStep {
    fn narrative_prompt(state: &IncidentState, text: &str) -> String {
        format!(
            "You are an ESR (Environmental, Safety & Risk) analyst. Write a short \
             executive summary of this incident report for management.\n\n\
             Incident ID: {}\n\n{}",
            state.incident_id(),
            text
        )
    }
}

#[async_trait]
impl Step for ReportStep {
    fn id(&self) -> StepId {
        StepId::ReportGenerate
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let text = report::render(state);

        let wants_narrative =
            ctx.workflow.planner == PlannerMode::Classifier && ctx.workflow.ai_report_narrative;

        let narrative = if wants_narrative {
            match ctx.classifier.classify(&Self::narrative_prompt(state, &text)).await {
                Ok(narrative) => {
                    metrics::record_external_call("classifier", true);
                    Some(narrative)
                }
                Err(e) => {
                    metrics::record_external_call("classifier", false);
                    tracing::warn!(run_id = %state.run_id, error = %e, "Report narrative failed");
                    Some(format!("[narrative unavailable: {}]", e))
                }
            }
        } else {
            None
        };

        StepOutput::Report(Report { text, narrative })
    }
}

/// Writes the workflow-complete audit entry and marks the run done
pub struct AuditStep;

impl AuditStep {
    /// Terminal audit entry for the state as it stands
    pub fn entry(state: &IncidentState, ctx: &StepContext) -> AuditEntry {
        let mut executed: Vec<&str> = state.executed.iter().map(|s| s.as_str()).collect();
        executed.push(StepId::AuditLog.as_str());

        let report_sha256 = state
            .report
            .as_ref()
            .map(|r| hex::encode(Sha256::digest(r.text.as_bytes())));

        AuditEntry::new(WORKFLOW_COMPLETE_EVENT)
            .with("run_id", state.run_id)
            .with("incident_id", state.incident_id())
            .with("container", resolve_container(state, ctx))
            .with("compliance", &state.compliance)
            .with("risk", &state.risk)
            .with("executed", executed)
            .with("planner", ctx.workflow.planner)
            .with("classifier", ctx.classifier.provider())
            .with("report_sha256", report_sha256)
    }
}

#[async_trait]
impl Step for AuditStep {
    fn id(&self) -> StepId {
        StepId::AuditLog
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let entry = Self::entry(state, ctx);

        let written = match ctx.audit.append(&entry).await {
            Ok(()) => true,
            Err(e) => {
                metrics::record_audit_failure();
                tracing::warn!(run_id = %state.run_id, error = %e, "Audit write failed");
                false
            }
        };

        StepOutput::Audit { entry, written }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{JsonlAuditSink, MemoryAuditSink};
    use crate::insurer::{MockInsurerClient, MOCK_CLAUSE};
    use crate::state::{IncidentRecord, RunRequest};
    use crate::steps::testing;
    use esr_common::llm::StaticClassifier;
    use std::sync::Arc;

    fn task(text: &str) -> IncidentState {
        IncidentState::new(RunRequest::Task(text.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_insurer_clause() {
        let ctx = testing::context();
        let StepOutput::Insurer(response) = InsurerStep.run(&task("Leak"), &ctx).await else {
            panic!("expected insurer output");
        };
        assert_eq!(response.clause.as_deref(), Some(MOCK_CLAUSE));
    }

    #[tokio::test]
    async fn test_insurer_failure_is_error_value() {
        let mut ctx = testing::context();
        ctx.insurer = Arc::new(MockInsurerClient::failing("connection refused"));

        let output = InsurerStep.run(&task("Leak"), &ctx).await;
        assert!(output.is_error());
    }

    #[tokio::test]
    async fn test_report_without_narrative() {
        let ctx = testing::context();
        let StepOutput::Report(report) = ReportStep.run(&task("Leak at C-456"), &ctx).await else {
            panic!("expected report output");
        };
        assert!(report.text.starts_with("# Incident Report"));
        assert!(report.narrative.is_none());
    }

    #[tokio::test]
    async fn test_report_narrative_from_classifier() {
        let mut ctx = testing::context();
        ctx.workflow.planner = PlannerMode::Classifier;
        ctx.workflow.ai_report_narrative = true;
        ctx.classifier = Arc::new(StaticClassifier::new("Contained lead spill."));

        let StepOutput::Report(report) = ReportStep.run(&task("Leak at C-456"), &ctx).await else {
            panic!("expected report output");
        };
        assert_eq!(report.narrative.as_deref(), Some("Contained lead spill."));
    }

    #[tokio::test]
    async fn test_report_narrative_failure_is_marker() {
        let mut ctx = testing::context();
        ctx.workflow.planner = PlannerMode::Classifier;
        ctx.workflow.ai_report_narrative = true;
        ctx.classifier = Arc::new(StaticClassifier::failing("quota"));

        let StepOutput::Report(report) = ReportStep.run(&task("Leak"), &ctx).await else {
            panic!("expected report output");
        };
        assert!(report.narrative.unwrap().starts_with("[narrative unavailable"));
        assert!(!report.text.is_empty());
    }

    #[tokio::test]
    async fn test_audit_entry_fields() {
        let mut ctx = testing::context();
        let sink = Arc::new(MemoryAuditSink::new());
        ctx.audit = sink.clone();

        let record = IncidentRecord {
            id: Some("INC-7".to_string()),
            description: "Leak at C-456".to_string(),
            ..Default::default()
        };
        let mut state = IncidentState::new(RunRequest::Incident(record)).unwrap();
        state.executed.push(StepId::RiskAnalysis);
        state.report = Some(Report {
            text: "report".to_string(),
            narrative: None,
        });

        let output = AuditStep.run(&state, &ctx).await;
        assert!(!output.is_error());

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        let fields = &entries[0].fields;
        assert_eq!(entries[0].event, WORKFLOW_COMPLETE_EVENT);
        assert_eq!(fields["incident_id"], "INC-7");
        assert_eq!(fields["container"], "C-456");
        assert_eq!(fields["executed"], serde_json::json!(["risk_analysis", "audit_log"]));
        assert_eq!(fields["planner"], "static");
        let expected = hex::encode(Sha256::digest(b"report"));
        assert_eq!(fields["report_sha256"], expected);
        assert_eq!(expected.len(), 64);
    }

    #[tokio::test]
    async fn test_audit_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = testing::context();
        ctx.audit = Arc::new(JsonlAuditSink::new(dir.path()));

        let output = AuditStep.run(&task("Leak"), &ctx).await;
        let StepOutput::Audit { written, .. } = output else {
            panic!("expected audit output");
        };
        assert!(!written);
    }
}
