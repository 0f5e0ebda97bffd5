//! Compliance rule evaluator

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Weighted compliance rule
#[derive(Debug, Clone, Copy)]
pub struct ComplianceRule {
    pub name: &'static str,
    pub weight: f64,
}

/// Rules in declared order. Weights sum to 1.0.
pub const ISO_RULES: [ComplianceRule; 3] = [
    ComplianceRule {
        name: "Spill recording within 24h",
        weight: 0.4,
    },
    ComplianceRule {
        name: "Training cert for hazardous handlers",
        weight: 0.3,
    },
    ComplianceRule {
        name: "Proper containment and labeling",
        weight: 0.3,
    },
];

const RECORDING_WINDOW_SECS: i64 = 24 * 3600;

/// Facts the compliance rules are evaluated against
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceContext {
    /// When the incident happened (ISO-8601)
    pub incident_time: Option<String>,

    /// When the incident was recorded (ISO-8601)
    pub recorded_time: Option<String>,

    /// Handler holds the hazardous material certification
    pub handler_certified: bool,

    pub labeled: bool,

    pub contained: bool,
}

/// Pass/fail of a single rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleOutcome {
    pub rule: String,
    pub ok: bool,
}

/// Compliance score plus per-rule breakdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceVerdict {
    pub score: f64,
    pub details: Vec<RuleOutcome>,
}

/// Evaluate every rule in declared order. Never fails: an unparseable or
/// missing timestamp fails the recording rule.
pub fn evaluate_compliance(context: &ComplianceContext) -> ComplianceVerdict {
    let mut score = 0.0;
    let mut details = Vec::with_capacity(ISO_RULES.len());

    for (i, rule) in ISO_RULES.iter().enumerate() {
        let ok = match i {
            0 => recorded_within_window(context),
            1 => context.handler_certified,
            _ => context.labeled && context.contained,
        };

        if ok {
            score += rule.weight;
        }
        details.push(RuleOutcome {
            rule: rule.name.to_string(),
            ok,
        });
    }

    ComplianceVerdict {
        score: (score * 100.0).round() / 100.0,
        details,
    }
}

fn recorded_within_window(context: &ComplianceContext) -> bool {
    let (Some(incident), Some(recorded)) = (
        context.incident_time.as_deref().and_then(parse_timestamp),
        context.recorded_time.as_deref().and_then(parse_timestamp),
    ) else {
        return false;
    };

    // Offset-aware and naive timestamps are not comparable
    if incident.1 != recorded.1 {
        return false;
    }

    (recorded.0 - incident.0).num_seconds() <= RECORDING_WINDOW_SECS
}

/// Parse an ISO-8601 timestamp.
///
/// Returns the instant as a naive UTC datetime plus whether the input
/// carried an offset. Accepts RFC 3339, naive `T` or space separated
/// datetimes with optional fractional seconds, and bare dates.
pub fn parse_timestamp(value: &str) -> Option<(NaiveDateTime, bool)> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some((dt.naive_utc(), true));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some((dt, false));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| (dt, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(incident: &str, recorded: &str) -> ComplianceContext {
        ComplianceContext {
            incident_time: Some(incident.to_string()),
            recorded_time: Some(recorded.to_string()),
            handler_certified: true,
            labeled: true,
            contained: true,
        }
    }

    #[test]
    fn test_all_rules_pass() {
        let verdict = evaluate_compliance(&context("2025-08-11T09:00:00", "2025-08-12T08:00:00"));
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.details.iter().all(|d| d.ok));
        assert_eq!(verdict.details[0].rule, "Spill recording within 24h");
    }

    #[test]
    fn test_late_recording() {
        let verdict = evaluate_compliance(&context("2025-08-11T09:00:00", "2025-08-12T10:00:00"));
        assert_eq!(verdict.score, 0.6);
        assert!(!verdict.details[0].ok);
        assert!(verdict.details[1].ok && verdict.details[2].ok);
    }

    #[test]
    fn test_unparseable_time_fails_rule_only() {
        let verdict = evaluate_compliance(&context("yesterday", "2025-08-12T10:00:00"));
        assert_eq!(verdict.score, 0.6);
        assert!(!verdict.details[0].ok);
    }

    #[test]
    fn test_uncontained_spill() {
        let mut ctx = context("2025-08-11T09:00:00", "2025-08-11T18:00:00");
        ctx.contained = false;
        let verdict = evaluate_compliance(&ctx);
        assert_eq!(verdict.score, 0.7);
        assert!(!verdict.details[2].ok);
    }

    #[test]
    fn test_empty_context_scores_zero() {
        let verdict = evaluate_compliance(&ComplianceContext::default());
        assert_eq!(verdict.score, 0.0);
        assert_eq!(verdict.details.len(), 3);
    }

    #[test]
    fn test_offset_timestamps_compare_in_utc() {
        let verdict = evaluate_compliance(&context("2025-08-11T09:00:00+02:00", "2025-08-12T06:30:00Z"));
        assert!(verdict.details[0].ok);

        let mixed = evaluate_compliance(&context("2025-08-11T09:00:00Z", "2025-08-11T10:00:00"));
        assert!(!mixed.details[0].ok);
    }

    #[test]
    fn test_parse_formats() {
        assert!(parse_timestamp("2025-08-11").is_some());
        assert!(parse_timestamp("2025-08-11 09:00:00").is_some());
        assert!(parse_timestamp("2025-08-11T09:00:00.250").is_some());
        assert!(parse_timestamp("11/08/2025").is_none());
    }
}
