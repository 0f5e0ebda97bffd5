//! Risk heuristic evaluator

use serde::{Deserialize, Serialize};
use std::fmt;

const HIGH_TEMPERATURE_C: f64 = 45.0;

/// Risk level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("Low"),
            RiskLevel::Medium => f.write_str("Medium"),
            RiskLevel::High => f.write_str("High"),
        }
    }
}

/// Inputs to the risk heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPayload {
    pub material: String,
    pub temperature_c: f64,
    pub leak: bool,
    pub quantity_kg: f64,
}

impl Default for RiskPayload {
    fn default() -> Self {
        Self {
            material: String::new(),
            temperature_c: 20.0,
            leak: false,
            quantity_kg: 0.0,
        }
    }
}

/// Risk level with the notes that produced it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskVerdict {
    pub risk: RiskLevel,
    pub notes: Vec<String>,
}

/// Checks run leak, then temperature, then lead with leak. Each check that
/// fires overwrites the level and appends its note.
pub fn evaluate_risk(payload: &RiskPayload) -> RiskVerdict {
    let mut risk = RiskLevel::Low;
    let mut notes = Vec::new();

    if payload.leak {
        risk = RiskLevel::Medium;
        notes.push("Leak detected".to_string());
    }

    if payload.temperature_c > HIGH_TEMPERATURE_C {
        risk = RiskLevel::High;
        notes.push("High temperature".to_string());
    }

    if payload.leak && payload.material.to_lowercase().contains("lead") {
        risk = RiskLevel::High;
        notes.push("Toxic material leak".to_string());
    }

    RiskVerdict { risk, notes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(material: &str, temperature_c: f64, leak: bool) -> RiskPayload {
        RiskPayload {
            material: material.to_string(),
            temperature_c,
            leak,
            quantity_kg: 0.0,
        }
    }

    #[test]
    fn test_lead_leak_is_high() {
        let verdict = evaluate_risk(&payload("Lead-acid batteries", 25.0, true));
        assert_eq!(verdict.risk, RiskLevel::High);
        assert_eq!(verdict.notes, vec!["Leak detected", "Toxic material leak"]);
    }

    #[test]
    fn test_hot_without_leak() {
        let verdict = evaluate_risk(&payload("Sand", 50.0, false));
        assert_eq!(verdict.risk, RiskLevel::High);
        assert_eq!(verdict.notes, vec!["High temperature"]);
    }

    #[test]
    fn test_benign() {
        let verdict = evaluate_risk(&payload("Sand", 20.0, false));
        assert_eq!(verdict.risk, RiskLevel::Low);
        assert!(verdict.notes.is_empty());
    }

    #[test]
    fn test_plain_leak_is_medium() {
        let verdict = evaluate_risk(&payload("Sand", 45.0, true));
        assert_eq!(verdict.risk, RiskLevel::Medium);
        assert_eq!(verdict.notes, vec!["Leak detected"]);
    }

    #[test]
    fn test_all_checks_fire_in_order() {
        let verdict = evaluate_risk(&payload("LEAD sludge", 60.0, true));
        assert_eq!(verdict.risk, RiskLevel::High);
        assert_eq!(verdict.notes, vec!["Leak detected", "High temperature", "Toxic material leak"]);
    }

    #[test]
    fn test_level_serializes_capitalised() {
        assert_eq!(serde_json::to_value(RiskLevel::Medium).unwrap(), "Medium");
    }
}
