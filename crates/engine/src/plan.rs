//! Plan resolver
//!
//! Turns a run into an ordered list of steps.
//!
//! Provides:
//! - Static mode: the canonical eight-step order
//! - Classifier-assisted mode: ask the external classifier for tool names,
//!   extract a JSON list from its free-text answer and map tools to steps
//!
//! Resolution never fails. Any classifier or parse failure yields the
//! default plan.

use crate::state::{IncidentState, Plan};
use crate::step::{StepId, CANONICAL_ORDER, TOOL_CATALOG};
use esr_common::config::PlannerMode;
use esr_common::llm::{Classifier, PLANNING_PROMPT_MARKER};
use std::sync::Arc;

/// Tools used when the classifier answer is unusable
pub const DEFAULT_TOOLS: [&str; 3] = ["risk_detection", "compliance_scoring", "report_generation"];

/// Informational success criteria attached to every plan
pub const SUCCESS_CRITERIA: [&str; 2] = ["report generated", "scores computed"];

/// Way of locating a JSON list inside classifier text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Content after the first ```` ```json ```` up to the next fence
    FencedJsonBlock,
    /// From the first `[` to the last `]`
    BracketSpan,
}

impl ExtractionStrategy {
    /// Candidate JSON text, or `None` when the strategy does not apply.
    ///
    /// A bracket span whose last `]` precedes its first `[` applies but
    /// yields an empty candidate.
    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            ExtractionStrategy::FencedJsonBlock => {
                let start = text.find("```json")? + "```json".len();
                let rest = &text[start..];
                let end = rest.find("```").unwrap_or(rest.len());
                Some(rest[..end].trim())
            }
            ExtractionStrategy::BracketSpan => {
                let open = text.find('[')?;
                let close = text.rfind(']')?;
                if close < open {
                    return Some("");
                }
                Some(&text[open..=close])
            }
        }
    }
}

/// Resolves plans for runs
pub struct PlanResolver {
    mode: PlannerMode,
    classifier: Arc<dyn Classifier>,
    strategies: Vec<ExtractionStrategy>,
}

impl PlanResolver {
    pub fn new(mode: PlannerMode, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            mode,
            classifier,
            strategies: vec![ExtractionStrategy::FencedJsonBlock, ExtractionStrategy::BracketSpan],
        }
    }

    pub fn mode(&self) -> PlannerMode {
        self.mode
    }

    /// Resolve the plan for a run
    pub async fn resolve(&self, state: &IncidentState) -> Plan {
        match self.mode {
            PlannerMode::Static => Self::static_plan(),
            PlannerMode::Classifier => {
                let prompt = planning_prompt(state);
                match self.classifier.classify(&prompt).await {
                    Ok(answer) => self.resolve_from_output(&answer),
                    Err(e) => {
                        tracing::warn!(
                            run_id = %state.run_id,
                            provider = self.classifier.provider(),
                            error = %e,
                            "Classifier unavailable, using default plan"
                        );
                        let mut plan = Self::default_plan();
                        plan.fallback = true;
                        plan
                    }
                }
            }
        }
    }

    /// The canonical eight-step plan
    pub fn static_plan() -> Plan {
        Plan::new(CANONICAL_ORDER.to_vec(), success_criteria())
    }

    /// Plan built from `DEFAULT_TOOLS`
    pub fn default_plan() -> Plan {
        Plan::new(DEFAULT_TOOLS.iter().map(|t| StepId::from_tool(t)).collect(), success_criteria())
    }

    /// Resolve a plan from raw classifier text
    pub fn resolve_from_output(&self, answer: &str) -> Plan {
        match self.parse_tools(answer) {
            Some(tools) => Plan::new(tools.iter().map(|t| StepId::from_tool(t)).collect(), success_criteria()),
            None => {
                tracing::warn!("Classifier answer unusable, using default plan");
                let mut plan = Self::default_plan();
                plan.fallback = true;
                plan
            }
        }
    }

    /// Tool names in the answer, or `None` when the answer has no usable
    /// JSON list. Non-string entries become empty names.
    fn parse_tools(&self, answer: &str) -> Option<Vec<String>> {
        let candidate = self.strategies.iter().find_map(|s| s.extract(answer))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(candidate).ok()?;

        Some(
            values
                .into_iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_default())
                .collect(),
        )
    }
}

fn success_criteria() -> Vec<String> {
    SUCCESS_CRITERIA.iter().map(|s| s.to_string()).collect()
}

/// Planning prompt listing every tool, with the incident as JSON
pub fn planning_prompt(state: &IncidentState) -> String {
    let incident = match &state.incident {
        Some(record) => serde_json::to_string(record).unwrap_or_default(),
        None => serde_json::json!({ "description": state.task }).to_string(),
    };

    let tools = TOOL_CATALOG
        .iter()
        .enumerate()
        .map(|(i, (name, purpose))| format!("{}. {}: {}", i + 1, name, purpose))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an ESR (Environmental, Safety & Risk) workflow planner.\n\
         Analyze this incident and create an action plan.\n\n\
         Incident: {incident}\n\n\
         Determine which tools are needed:\n{tools}\n\n\
         {PLANNING_PROMPT_MARKER} in execution order.\n\
         Example: [\"knowledge_graph\", \"risk_detection\", \"compliance_scoring\", \"report_generation\"]"
    )
}
