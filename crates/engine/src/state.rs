//! Incident state
//!
//! The single record threaded through a run. Every optional field is owned
//! by exactly one step and, once set, is never overwritten.

use crate::audit::AuditEntry;
use crate::insurer::InsurerResponse;
use crate::report::Report;
use crate::scoring::{ComplianceVerdict, RiskVerdict};
use crate::step::StepId;
use chrono::{DateTime, Utc};
use esr_common::errors::{AppError, Result};
use esr_search::{SearchHit, WasteRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured incident submitted instead of free task text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IncidentRecord {
    pub id: Option<String>,
    pub description: String,
    pub material_type: Option<String>,
    pub location: Option<String>,
    pub quantity: Option<f64>,
    pub severity: Option<String>,

    /// Time of the incident as reported (ISO-8601)
    pub timestamp: Option<String>,

    // Optional compliance facts
    pub occurred_at: Option<String>,
    pub recorded_at: Option<String>,
    pub handler_certified: Option<bool>,
    pub labeled: Option<bool>,
    pub contained: Option<bool>,

    // Optional risk facts
    pub temperature_c: Option<f64>,
    pub leak: Option<bool>,
}

/// What a caller submits to start a run
#[derive(Debug, Clone)]
pub enum RunRequest {
    /// Free-form task description
    Task(String),
    /// Structured incident; its description is the task text
    Incident(IncidentRecord),
}

/// Ordered steps for one run plus a cursor into them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub steps: Vec<StepId>,

    /// Informational only
    pub success_criteria: Vec<String>,

    /// Index of the next unconsumed step
    pub cursor: usize,

    /// True when the classifier answer could not be used
    #[serde(default)]
    pub fallback: bool,
}

impl Plan {
    pub fn new(steps: Vec<StepId>, success_criteria: Vec<String>) -> Self {
        Self {
            steps,
            success_criteria,
            cursor: 0,
            fallback: false,
        }
    }

    /// Consume entries until one names a step that still has to run.
    ///
    /// `audit_log` entries and already executed steps are consumed without
    /// being returned. `None` means the plan is exhausted.
    pub fn advance(&mut self, executed: &[StepId]) -> Option<StepId> {
        while self.cursor < self.steps.len() {
            let step = self.steps[self.cursor];
            self.cursor += 1;

            if step == StepId::AuditLog || executed.contains(&step) {
                continue;
            }
            return Some(step);
        }
        None
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.steps.len()
    }
}

/// Relationship graph findings for the incident container
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphResults {
    pub container: Option<String>,
    pub batches: Vec<String>,
    pub materials: Vec<String>,

    /// Regulations linked to the discovered materials
    pub regulations: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Similarity search hits
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocResults {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Waste rows matching the run's selector
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WasteInfo {
    pub selector: Option<String>,
    pub results: Vec<WasteRecord>,
}

/// Value produced by one step
#[derive(Debug, Clone)]
pub enum StepOutput {
    Graph(GraphResults),
    Docs(DocResults),
    Waste(WasteInfo),
    Compliance(ComplianceVerdict),
    Risk(RiskVerdict),
    Insurer(InsurerResponse),
    Report(Report),
    Audit { entry: AuditEntry, written: bool },
}

impl StepOutput {
    /// Whether the value is error-shaped
    pub fn is_error(&self) -> bool {
        match self {
            StepOutput::Graph(g) => g.error.is_some(),
            StepOutput::Insurer(i) => i.error.is_some(),
            StepOutput::Audit { written, .. } => !written,
            _ => false,
        }
    }
}

/// Shared mutable record for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub task: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident: Option<IncidentRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_results: Option<GraphResults>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocResults>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub waste_info: Option<WasteInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceVerdict>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskVerdict>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurer: Option<InsurerResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,

    pub audit: Vec<AuditEntry>,

    /// Steps in the order they ran
    pub executed: Vec<StepId>,

    pub done: bool,

    pub cancelled: bool,
}

impl IncidentState {
    /// Build the initial state. Fails when there is no task text.
    pub fn new(request: RunRequest) -> Result<Self> {
        let (task, incident) = match request {
            RunRequest::Task(task) => (task, None),
            RunRequest::Incident(record) => (record.description.clone(), Some(record)),
        };

        if task.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Task description must not be empty".to_string(),
                field: Some(if incident.is_some() { "description" } else { "task" }.to_string()),
            });
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            task,
            incident,
            plan: None,
            graph_results: None,
            docs: None,
            waste_info: None,
            compliance: None,
            risk: None,
            insurer: None,
            report: None,
            audit: Vec::new(),
            executed: Vec::new(),
            done: false,
            cancelled: false,
        })
    }

    /// Store a step's value in the field that step owns.
    ///
    /// Returns `false`, leaving the state untouched, when the field is
    /// already set.
    pub fn apply(&mut self, output: StepOutput) -> bool {
        fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        }

        match output {
            StepOutput::Graph(v) => set_once(&mut self.graph_results, v),
            StepOutput::Docs(v) => set_once(&mut self.docs, v),
            StepOutput::Waste(v) => set_once(&mut self.waste_info, v),
            StepOutput::Compliance(v) => set_once(&mut self.compliance, v),
            StepOutput::Risk(v) => set_once(&mut self.risk, v),
            StepOutput::Insurer(v) => set_once(&mut self.insurer, v),
            StepOutput::Report(v) => set_once(&mut self.report, v),
            StepOutput::Audit { entry, .. } => {
                if self.done {
                    return false;
                }
                self.audit.push(entry);
                self.done = true;
                true
            }
        }
    }

    /// Incident id for audit entries
    pub fn incident_id(&self) -> &str {
        self.incident
            .as_ref()
            .and_then(|i| i.id.as_deref())
            .unwrap_or("unknown")
    }

    /// Container found by the graph step, if it ran
    pub fn container(&self) -> Option<&str> {
        self.graph_results.as_ref().and_then(|g| g.container.as_deref())
    }

    /// First material found by the graph step, if any
    pub fn first_material(&self) -> Option<&str> {
        self.graph_results
            .as_ref()
            .and_then(|g| g.materials.first())
            .map(String::as_str)
    }

    /// Material under assessment: the first graph material, else the
    /// incident's declared material type
    pub fn material(&self) -> Option<&str> {
        self.first_material().or_else(|| {
            self.incident
                .as_ref()
                .and_then(|i| i.material_type.as_deref())
        })
    }
}
