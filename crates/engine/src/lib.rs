//! ESR Orchestrator Workflow Engine
//!
//! Drives one incident through a resolved plan of analysis steps over a
//! single shared state record and terminates with a report and an audit
//! entry.
//!
//! Provides:
//! - Plan resolution (static order or classifier-assisted)
//! - Compliance and risk scoring
//! - Step registry and the orchestration state machine
//! - Report rendering
//! - Insurer and audit collaborators

pub mod audit;
pub mod bootstrap;
pub mod cancel;
pub mod engine;
pub mod insurer;
pub mod plan;
pub mod report;
pub mod scoring;
pub mod state;
pub mod step;
pub mod steps;

pub use bootstrap::Backends;
pub use cancel::CancellationFlag;
pub use engine::{Orchestrator, RunOutcome};
pub use plan::PlanResolver;
pub use state::{IncidentRecord, IncidentState, Plan, RunRequest};
pub use step::StepId;
pub use steps::{StepContext, StepRegistry};
