//! Step identifiers
//!
//! The workflow has eight content steps. Classifier-assisted plans name
//! tools rather than steps; `StepId::from_tool` maps one to the other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One named unit of work in the workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    GraphQuery,
    DocSearch,
    WasteLookup,
    ComplianceCheck,
    RiskAnalysis,
    InsurerLookup,
    ReportGenerate,
    AuditLog,
}

/// Fixed order used by the static discipline and the static planner
pub const CANONICAL_ORDER: [StepId; 8] = [
    StepId::GraphQuery,
    StepId::DocSearch,
    StepId::WasteLookup,
    StepId::ComplianceCheck,
    StepId::RiskAnalysis,
    StepId::InsurerLookup,
    StepId::ReportGenerate,
    StepId::AuditLog,
];

/// Tools offered to the classifier, with the description shown in the
/// planning prompt
pub const TOOL_CATALOG: [(&str, &str); 8] = [
    ("knowledge_graph", "For regulatory compliance lookups"),
    ("vector_store", "For similar incident searches"),
    ("waste_tracking", "For waste material analysis"),
    ("compliance_scoring", "For regulatory compliance assessment"),
    ("risk_detection", "For risk level analysis"),
    ("insurer_api", "For insurance claim processing"),
    ("report_generation", "For final reporting"),
    ("audit_trail", "For audit logging"),
];

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::GraphQuery => "graph_query",
            StepId::DocSearch => "doc_search",
            StepId::WasteLookup => "waste_lookup",
            StepId::ComplianceCheck => "compliance_check",
            StepId::RiskAnalysis => "risk_analysis",
            StepId::InsurerLookup => "insurer_lookup",
            StepId::ReportGenerate => "report_generate",
            StepId::AuditLog => "audit_log",
        }
    }

    /// Map a classifier tool name to a step. Unmapped names (including
    /// `audit_trail`) map to `report_generate`.
    pub fn from_tool(tool: &str) -> StepId {
        match tool {
            "knowledge_graph" => StepId::GraphQuery,
            "vector_store" => StepId::DocSearch,
            "waste_tracking" => StepId::WasteLookup,
            "compliance_scoring" => StepId::ComplianceCheck,
            "risk_detection" => StepId::RiskAnalysis,
            "insurer_api" => StepId::InsurerLookup,
            "report_generation" => StepId::ReportGenerate,
            _ => StepId::ReportGenerate,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_mapping() {
        assert_eq!(StepId::from_tool("knowledge_graph"), StepId::GraphQuery);
        assert_eq!(StepId::from_tool("risk_detection"), StepId::RiskAnalysis);
        assert_eq!(StepId::from_tool("audit_trail"), StepId::ReportGenerate);
        assert_eq!(StepId::from_tool("weather"), StepId::ReportGenerate);
    }

    #[test]
    fn test_canonical_order_ends_with_audit() {
        assert_eq!(CANONICAL_ORDER.first(), Some(&StepId::GraphQuery));
        assert_eq!(CANONICAL_ORDER.last(), Some(&StepId::AuditLog));
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for step in CANONICAL_ORDER {
            let json = serde_json::to_value(step).unwrap();
            assert_eq!(json, step.as_str());
        }
    }
}
