//! Report renderer
//!
//! Folds the accumulated state into a fixed Markdown template. Absent
//! fields render as placeholders rather than failing.

use crate::scoring::RiskLevel;
use crate::state::IncidentState;
use serde::{Deserialize, Serialize};

const ACTION_ESCALATE: &str =
    "- Immediately isolate area; escalate to emergency response per ISO 14001 Clause 8.2";
const ACTION_MONITOR: &str = "- Monitor and document remediation steps";
const ACTION_INSURER_FORMS: &str = "- File required insurer forms within the specified time window";

/// Rendered report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    /// Deterministic template text
    pub text: String,

    /// Classifier-written summary, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// Hazard label for a material
pub fn hazard_for(material: &str) -> &'static str {
    if material.to_lowercase().contains("lead") {
        "Toxic"
    } else {
        "Unknown"
    }
}

/// Render the report text for a state
pub fn render(state: &IncidentState) -> String {
    let material = state.material().unwrap_or("Unknown");
    let time = state
        .incident
        .as_ref()
        .and_then(|i| i.timestamp.clone())
        .unwrap_or_else(|| state.started_at.format("%Y-%m-%dT%H:%M:%S").to_string());

    let mut lines = vec!["# Incident Report".to_string()];
    lines.push(format!("- **Summary**: {}", state.task));
    lines.push(format!("- **Container**: {}", state.container().unwrap_or("N/A")));
    lines.push(format!("- **Time**: {}", time));
    lines.push(format!("- **Material**: {} | Hazard: {}", material, hazard_for(material)));

    match &state.compliance {
        Some(compliance) => {
            lines.push(format!("- **Compliance Score**: {}", format_score(compliance.score)));
            for detail in &compliance.details {
                lines.push(format!(
                    "  - {}: {}",
                    detail.rule,
                    if detail.ok { "OK" } else { "MISSING" }
                ));
            }
        }
        None => lines.push("- **Compliance Score**: ?".to_string()),
    }

    let (risk_label, notes) = match &state.risk {
        Some(risk) => (risk.risk.to_string(), risk.notes.join(", ")),
        None => ("?".to_string(), String::new()),
    };
    lines.push(format!("- **Risk**: {} | Notes: {}", risk_label, notes));

    let clause = state
        .insurer
        .as_ref()
        .and_then(|i| i.clause.as_deref())
        .unwrap_or("N/A");
    lines.push(format!("- **Insurer Clause**: {}", clause));

    lines.push("\n## Recommended Actions".to_string());
    let high = state.risk.as_ref().map(|r| r.risk == RiskLevel::High).unwrap_or(false);
    lines.push(if high { ACTION_ESCALATE } else { ACTION_MONITOR }.to_string());
    lines.push(ACTION_INSURER_FORMS.to_string());

    lines.join("\n")
}

/// Scores always show at least one decimal place
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        score.to_string()
    }
}
