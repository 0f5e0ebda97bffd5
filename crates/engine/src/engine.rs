//! Orchestration engine
//!
//! State machine: `plan -> graph_query -> doc_search -> waste_lookup ->
//! compliance_check -> risk_analysis -> insurer_lookup -> report_generate ->
//! audit_log -> done`.
//!
//! - Static discipline: every step runs once in canonical order.
//! - Dynamic discipline: after planning, a router consumes the plan cursor
//!   and jumps to the next planned step. Steps missing from the plan are
//!   skipped and `audit_log` always runs last.
//!
//! Only failure to build the initial state fails a run. Cancellation stops
//! scheduling further steps and keeps everything already applied.

use crate::cancel::CancellationFlag;
use crate::plan::PlanResolver;
use crate::report::Report;
use crate::state::{IncidentState, RunRequest};
use crate::step::{StepId, CANONICAL_ORDER};
use crate::steps::{StepContext, StepRegistry};
use esr_common::config::Discipline;
use esr_common::errors::{AppError, Result};
use esr_common::metrics::{self, RunMetrics};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Run result contract
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: IncidentState,
    pub report: Option<Report>,
    pub elapsed_ms: u64,
}

/// Drives runs over a shared step context
pub struct Orchestrator {
    ctx: Arc<StepContext>,
    registry: StepRegistry,
    planner: PlanResolver,
    discipline: Discipline,
}

impl Orchestrator {
    /// Engine using the context's configured discipline and planner
    pub fn new(ctx: Arc<StepContext>) -> Self {
        let discipline = ctx.workflow.discipline;
        Self::with_discipline(ctx, discipline)
    }

    pub fn with_discipline(ctx: Arc<StepContext>, discipline: Discipline) -> Self {
        let planner = PlanResolver::new(ctx.workflow.planner, ctx.classifier.clone());
        Self {
            ctx,
            registry: StepRegistry::standard(),
            planner,
            discipline,
        }
    }

    /// Replace the step registry
    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn context(&self) -> &StepContext {
        &self.ctx
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Run to completion
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        self.run_with_cancel(request, &CancellationFlag::new()).await
    }

    /// Run until done or until `cancel` is set
    pub async fn run_with_cancel(&self, request: RunRequest, cancel: &CancellationFlag) -> Result<RunOutcome> {
        let run_metrics = RunMetrics::start(&self.discipline.to_string());
        let mut state = IncidentState::new(request)?;

        let plan = self.planner.resolve(&state).await;
        tracing::info!(
            run_id = %state.run_id,
            discipline = %self.discipline,
            planner = %self.planner.mode(),
            plan = ?plan.steps,
            fallback = plan.fallback,
            "Run started"
        );
        state.plan = Some(plan);

        let mut static_cursor = 0;
        loop {
            if cancel.is_cancelled() {
                state.cancelled = true;
                tracing::info!(run_id = %state.run_id, executed = ?state.executed, "Run cancelled");
                break;
            }

            let next = match self.discipline {
                Discipline::Static => {
                    let step = CANONICAL_ORDER.get(static_cursor).copied();
                    static_cursor += 1;
                    step
                }
                Discipline::Dynamic => Some(Self::route(&mut state)),
            };

            let Some(step_id) = next else {
                break;
            };

            self.execute(step_id, &mut state).await?;

            if step_id == StepId::AuditLog {
                break;
            }
        }

        let status = if state.cancelled { "cancelled" } else { "completed" };
        let elapsed_ms = run_metrics.elapsed_ms();
        run_metrics.finish(status);

        tracing::info!(
            run_id = %state.run_id,
            status = status,
            executed = ?state.executed,
            elapsed_ms,
            "Run finished"
        );

        Ok(RunOutcome {
            run_id: state.run_id,
            report: state.report.clone(),
            state,
            elapsed_ms,
        })
    }

    /// Next content step under the dynamic discipline
    fn route(state: &mut IncidentState) -> StepId {
        let executed = &state.executed;
        state
            .plan
            .as_mut()
            .and_then(|plan| plan.advance(executed))
            .unwrap_or(StepId::AuditLog)
    }

    async fn execute(&self, step_id: StepId, state: &mut IncidentState) -> Result<()> {
        let step = self.registry.get(step_id).ok_or_else(|| AppError::Internal {
            message: format!("No step registered for {}", step_id),
        })?;

        tracing::debug!(run_id = %state.run_id, step = %step_id, "Step started");
        let started = Instant::now();

        let output = step.run(state, &self.ctx).await;
        let failed = output.is_error();
        metrics::record_step(step_id.as_str(), started.elapsed().as_secs_f64(), failed);

        if failed {
            tracing::warn!(run_id = %state.run_id, step = %step_id, "Step produced an error value");
        }

        if !state.apply(output) {
            tracing::warn!(run_id = %state.run_id, step = %step_id, "Step field already set, value dropped");
        }
        state.executed.push(step_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StepOutput;
    use crate::steps::{testing, Step};
    use async_trait::async_trait;
    use esr_common::config::PlannerMode;
    use esr_common::llm::StaticClassifier;

    fn orchestrator(discipline: Discipline) -> Orchestrator {
        Orchestrator::with_discipline(Arc::new(testing::context()), discipline)
    }

    fn classifier_orchestrator(answer: &str) -> Orchestrator {
        let mut ctx = testing::context();
        ctx.workflow.planner = PlannerMode::Classifier;
        ctx.classifier = Arc::new(StaticClassifier::new(answer));
        Orchestrator::with_discipline(Arc::new(ctx), Discipline::Dynamic)
    }

    fn task(text: &str) -> RunRequest {
        RunRequest::Task(text.to_string())
    }

    #[tokio::test]
    async fn test_static_runs_every_step_in_order() {
        let outcome = orchestrator(Discipline::Static)
            .run(task("Leak detected in container C-456"))
            .await
            .unwrap();

        assert_eq!(outcome.state.executed, CANONICAL_ORDER.to_vec());
        assert!(outcome.state.done);
        assert!(outcome.report.is_some());
        assert_eq!(outcome.state.audit.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_task_fails_run() {
        let err = orchestrator(Discipline::Static).run(task("")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_dynamic_follows_plan_and_ends_with_audit() {
        let outcome = classifier_orchestrator("```json [\"risk_detection\",\"report_generation\"]```")
            .run(task("Leak detected in container C-456"))
            .await
            .unwrap();

        assert_eq!(
            outcome.state.executed,
            vec![StepId::RiskAnalysis, StepId::ReportGenerate, StepId::AuditLog]
        );
        assert!(outcome.state.graph_results.is_none());
        assert!(outcome.state.docs.is_none());
        assert!(outcome.state.done);

        let plan = outcome.state.plan.unwrap();
        assert_eq!(plan.cursor, plan.steps.len());
    }

    #[tokio::test]
    async fn test_dynamic_skips_duplicates_and_planned_audit() {
        let outcome = classifier_orchestrator("[\"audit_trail\", \"risk_detection\", \"report_generation\"]")
            .run(task("Leak"))
            .await
            .unwrap();

        assert_eq!(
            outcome.state.executed,
            vec![StepId::ReportGenerate, StepId::RiskAnalysis, StepId::AuditLog]
        );
    }

    #[tokio::test]
    async fn test_empty_plan_goes_straight_to_audit() {
        let outcome = classifier_orchestrator("[]").run(task("Leak")).await.unwrap();
        assert_eq!(outcome.state.executed, vec![StepId::AuditLog]);
        assert!(outcome.report.is_none());
        assert!(outcome.state.done);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let outcome = orchestrator(Discipline::Static)
            .run_with_cancel(task("Leak"), &cancel)
            .await
            .unwrap();

        assert!(outcome.state.cancelled);
        assert!(outcome.state.executed.is_empty());
        assert!(!outcome.state.done);
        assert!(outcome.state.plan.is_some());
    }

    /// Step that cancels the run while it executes
    struct CancellingStep(CancellationFlag);

    #[async_trait]
    impl Step for CancellingStep {
        fn id(&self) -> StepId {
            StepId::DocSearch
        }

        async fn run(&self, _state: &IncidentState, _ctx: &StepContext) -> StepOutput {
            self.0.cancel();
            StepOutput::Docs(Default::default())
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_applied_state() {
        let cancel = CancellationFlag::new();
        let mut registry = StepRegistry::standard();
        registry.register(Arc::new(CancellingStep(cancel.clone())));

        let outcome = orchestrator(Discipline::Static)
            .with_registry(registry)
            .run_with_cancel(task("Leak at C-456"), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.state.executed, vec![StepId::GraphQuery, StepId::DocSearch]);
        assert!(outcome.state.graph_results.is_some());
        assert!(outcome.state.docs.is_some());
        assert!(outcome.state.waste_info.is_none());
        assert!(outcome.state.cancelled);
    }

    #[tokio::test]
    async fn test_missing_step_is_internal_error() {
        let err = orchestrator(Discipline::Static)
            .with_registry(StepRegistry::new())
            .run(task("Leak"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }
}
