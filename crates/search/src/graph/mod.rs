//! Relationship graph
//!
//! Typed multi-relation graph linking containers, waste batches, materials
//! and regulation clauses. Built once at startup from the waste table and
//! the regulation file, read-only afterwards.

mod query;
mod store;

pub use query::TriplePattern;
pub use store::RelationshipStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Node type tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Container,
    Batch,
    Material,
    Regulation,
}

/// Graph node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Globally unique identifier
    pub id: String,

    /// Type tag
    pub kind: NodeKind,

    /// Attribute bag (only populated for batches)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Edge relation label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Container -> Batch
    ContainsBatch,
    /// Batch -> Material
    ContainsMaterial,
    /// Regulation -> Material
    AppliesTo,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::ContainsBatch => "contains_batch",
            Relation::ContainsMaterial => "contains_material",
            Relation::AppliesTo => "applies_to",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains_batch" => Ok(Relation::ContainsBatch),
            "contains_material" => Ok(Relation::ContainsMaterial),
            "applies_to" => Ok(Relation::AppliesTo),
            other => Err(format!("unknown relation '{}'", other)),
        }
    }
}

/// Directed, labelled edge. Parallel edges are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub relation: Relation,
    pub to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_round_trip_names() {
        for relation in [Relation::ContainsBatch, Relation::ContainsMaterial, Relation::AppliesTo] {
            assert_eq!(relation.as_str().parse::<Relation>().unwrap(), relation);
        }
        assert!("contains".parse::<Relation>().is_err());
    }

    #[test]
    fn test_edge_serializes_with_relation_name() {
        let edge = Edge {
            from: "C-456".to_string(),
            relation: Relation::ContainsBatch,
            to: "WB-789".to_string(),
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["relation"], "contains_batch");
        assert_eq!(json["from"], "C-456");
    }
}
