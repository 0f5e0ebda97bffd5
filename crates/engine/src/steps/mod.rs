//! Workflow steps
//!
//! Each step reads the state, does its work against the shared backends and
//! returns exactly the value for the field it owns. Steps never return
//! errors: failures become error-shaped values.
//!
//! Provides:
//! - `Step` trait and `StepRegistry` keyed by `StepId`
//! - `StepContext`: read-only backends plus external collaborators
//! - Lookup steps (graph, documents, waste)
//! - Assessment steps (compliance, risk)
//! - External steps (insurer, report, audit)

mod assessment;
mod external;
mod lookup;

pub use assessment::{ComplianceStep, RiskStep};
pub use external::{AuditStep, InsurerStep, ReportStep};
pub use lookup::{DocSearchStep, GraphQueryStep, WasteLookupStep};

use crate::audit::AuditSink;
use crate::bootstrap::Backends;
use crate::insurer::InsurerClient;
use crate::state::{IncidentState, StepOutput};
use crate::step::StepId;
use async_trait::async_trait;
use esr_common::config::WorkflowConfig;
use esr_common::llm::Classifier;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Trait for a single workflow step
#[async_trait]
pub trait Step: Send + Sync {
    /// Identifier the registry and router use
    fn id(&self) -> StepId;

    /// Produce this step's value from the current state
    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput;
}

/// Everything a step may touch
pub struct StepContext {
    /// Read-only data engines built at startup
    pub backends: Backends,

    pub insurer: Arc<dyn InsurerClient>,

    pub audit: Arc<dyn AuditSink>,

    pub classifier: Arc<dyn Classifier>,

    pub workflow: WorkflowConfig,
}

/// Steps keyed by identifier
pub struct StepRegistry {
    steps: HashMap<StepId, Arc<dyn Step>>,
}

impl StepRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Registry holding the eight standard steps
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GraphQueryStep));
        registry.register(Arc::new(DocSearchStep));
        registry.register(Arc::new(WasteLookupStep));
        registry.register(Arc::new(ComplianceStep));
        registry.register(Arc::new(RiskStep));
        registry.register(Arc::new(InsurerStep));
        registry.register(Arc::new(ReportStep));
        registry.register(Arc::new(AuditStep));
        registry
    }

    /// Add or replace a step
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.insert(step.id(), step);
    }

    pub fn get(&self, id: StepId) -> Option<Arc<dyn Step>> {
        self.steps.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn container_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:^|[\s()])(C-[^\s()]+)").ok())
        .as_ref()
}

/// First whitespace or parenthesis delimited token starting with `C-`,
/// with trailing punctuation removed. Tokens that trim down to a bare `C-`
/// are passed over.
pub fn detect_container(text: &str) -> Option<String> {
    container_pattern()?
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?')))
        .find(|token| token.len() > 2)
        .map(str::to_string)
}

/// Container for a run: the graph step's finding, else one mentioned in the
/// incident text or location, else the configured default
pub fn resolve_container(state: &IncidentState, ctx: &StepContext) -> Option<String> {
    if let Some(container) = state.container() {
        return Some(container.to_string());
    }

    detect_container(&state.task)
        .or_else(|| {
            state
                .incident
                .as_ref()
                .and_then(|i| i.location.as_deref())
                .and_then(detect_container)
        })
        .or_else(|| ctx.workflow.default_container.clone())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunRequest;

    #[test]
    fn test_detect_container() {
        assert_eq!(detect_container("Leak detected in container C-456 at dock"), Some("C-456".to_string()));
        assert_eq!(detect_container("Spill (C-222) reported"), Some("C-222".to_string()));
        assert_eq!(detect_container("Check C-9."), Some("C-9".to_string()));
        assert_eq!(detect_container("ABC-456 is not a container"), None);
        assert_eq!(detect_container("nothing here"), None);
    }

    #[test]
    fn test_detect_container_skips_bare_prefix() {
        assert_eq!(detect_container("C-. see C-456"), Some("C-456".to_string()));
        assert_eq!(detect_container("Tag C-, then (C-310)"), Some("C-310".to_string()));
        assert_eq!(detect_container("Only C-. here"), None);
    }

    #[test]
    fn test_resolve_container_fallbacks() {
        let mut ctx = testing::context();
        let state = IncidentState::new(RunRequest::Task("Drum leaking".to_string())).unwrap();
        assert_eq!(resolve_container(&state, &ctx), None);

        ctx.workflow.default_container = Some("C-456".to_string());
        assert_eq!(resolve_container(&state, &ctx).as_deref(), Some("C-456"));
    }

    #[test]
    fn test_standard_registry_has_every_step() {
        let registry = StepRegistry::standard();
        assert_eq!(registry.len(), 8);
        for id in crate::step::CANONICAL_ORDER {
            assert_eq!(registry.get(id).map(|s| s.id()), Some(id));
        }
    }
}
