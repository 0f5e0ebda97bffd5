//! Triple pattern parsing
//!
//! The query language has exactly one shape: `SUBJECT -> relation -> ?`.
//! The object segment must be present but its content is not interpreted.

use esr_common::errors::{AppError, Result};

/// Parsed `SUBJECT -> relation -> OBJECT` pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl TriplePattern {
    /// Parse a pattern. Anything other than three `->` separated segments
    /// is a `QueryFormat` error.
    pub fn parse(query: &str) -> Result<Self> {
        let parts: Vec<&str> = query.split("->").map(str::trim).collect();

        match parts.as_slice() {
            [subject, relation, object] => Ok(Self {
                subject: subject.to_string(),
                relation: relation.to_string(),
                object: object.to_string(),
            }),
            _ => Err(AppError::QueryFormat {
                query: query.to_string(),
            }),
        }
    }

    /// Build the canonical pattern text for a subject and relation
    pub fn format(subject: &str, relation: &str) -> String {
        format!("{} -> {} -> ?", subject, relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let pattern = TriplePattern::parse("C-456 -> contains_batch -> ?").unwrap();
        assert_eq!(pattern.subject, "C-456");
        assert_eq!(pattern.relation, "contains_batch");
        assert_eq!(pattern.object, "?");
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let pattern = TriplePattern::parse("  WB-789->contains_material   ->?").unwrap();
        assert_eq!(pattern.subject, "WB-789");
        assert_eq!(pattern.relation, "contains_material");
    }

    #[test]
    fn test_malformed_patterns() {
        for bad in ["C-456", "C-456 -> contains_batch", "a -> b -> c -> d", ""] {
            let err = TriplePattern::parse(bad).unwrap_err();
            assert!(matches!(err, AppError::QueryFormat { .. }), "{bad:?} should be malformed");
        }
    }

    #[test]
    fn test_format_round_trip() {
        let text = TriplePattern::format("C-1", "contains_batch");
        assert_eq!(TriplePattern::parse(&text).unwrap().subject, "C-1");
    }
}
