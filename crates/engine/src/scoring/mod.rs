//! Scoring engines
//!
//! Two independent pure evaluators:
//! - Compliance: three weighted rules, score rounded to 2 decimals
//! - Risk: Low / Medium / High heuristic with accumulated notes

mod compliance;
mod risk;

pub use compliance::{
    evaluate_compliance, parse_timestamp, ComplianceContext, ComplianceRule, ComplianceVerdict,
    RuleOutcome, ISO_RULES,
};
pub use risk::{evaluate_risk, RiskLevel, RiskPayload, RiskVerdict};
