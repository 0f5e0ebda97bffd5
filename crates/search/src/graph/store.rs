//! In-memory relationship store
//!
//! Provides:
//! - Node registry with insertion order
//! - Forward and reverse adjacency per node
//! - Triple-pattern queries (`SUBJECT -> relation -> ?`)

use super::{Edge, Node, NodeKind, Relation, TriplePattern};
use crate::waste::WasteRecord;
use esr_common::errors::Result;
use esr_common::metrics;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Typed multigraph of containers, batches, materials and regulations
#[derive(Debug, Default)]
pub struct RelationshipStore {
    /// All nodes keyed by id
    nodes: HashMap<String, Node>,

    /// Node ids in insertion order
    order: Vec<String>,

    /// node id -> edges leaving it, in insertion order
    outgoing: HashMap<String, Vec<Edge>>,

    /// node id -> edges arriving at it
    incoming: HashMap<String, Vec<Edge>>,

    edge_count: usize,
}

impl RelationshipStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from waste rows and regulation clause lines.
    ///
    /// Every row contributes a container, a batch and a material node plus the
    /// `contains_batch` and `contains_material` edges. Every non-blank
    /// regulation line then becomes a regulation node with an `applies_to`
    /// edge to each material known at that point.
    pub fn load<S: AsRef<str>>(records: &[WasteRecord], regulation_lines: &[S]) -> Self {
        let mut store = Self::new();

        for record in records {
            store.add_record(record);
        }

        for line in regulation_lines {
            store.add_regulation(line.as_ref());
        }

        tracing::info!(
            nodes = store.node_count(),
            edges = store.edge_count(),
            "Relationship store built"
        );

        store
    }

    /// Read the regulation source, one clause per line. An absent file
    /// yields no clauses.
    pub fn read_regulation_lines(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Regulation source not found, no clauses loaded");
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(path)?;
        Ok(text.lines().map(|l| l.to_string()).collect())
    }

    /// Add one waste row
    pub fn add_record(&mut self, record: &WasteRecord) {
        self.add_node(&record.container_id, NodeKind::Container, BTreeMap::new());
        self.add_node(&record.batch_id, NodeKind::Batch, record.attributes());
        self.add_node(&record.material, NodeKind::Material, BTreeMap::new());

        self.add_edge(&record.container_id, Relation::ContainsBatch, &record.batch_id);
        self.add_edge(&record.batch_id, Relation::ContainsMaterial, &record.material);
    }

    /// Add one regulation clause and link it to every material present now.
    /// Materials added afterwards are not linked.
    pub fn add_regulation(&mut self, line: &str) {
        let clause = line.trim();
        if clause.is_empty() {
            return;
        }

        self.add_node(clause, NodeKind::Regulation, BTreeMap::new());

        let materials: Vec<String> = self
            .nodes_of_kind(NodeKind::Material)
            .map(|n| n.id.clone())
            .collect();

        for material in materials {
            self.add_edge(clause, Relation::AppliesTo, &material);
        }
    }

    /// Insert a node. Returns `false` when the id already exists.
    ///
    /// Re-adding an id with the same kind merges attributes. A different kind
    /// keeps the first registration.
    pub fn add_node(&mut self, id: &str, kind: NodeKind, attributes: BTreeMap<String, String>) -> bool {
        if let Some(existing) = self.nodes.get_mut(id) {
            if existing.kind == kind {
                existing.attributes.extend(attributes);
            } else {
                tracing::warn!(
                    id = id,
                    existing = ?existing.kind,
                    requested = ?kind,
                    "Node id already registered with a different kind"
                );
            }
            return false;
        }

        self.nodes.insert(
            id.to_string(),
            Node {
                id: id.to_string(),
                kind,
                attributes,
            },
        );
        self.order.push(id.to_string());
        true
    }

    /// Add a directed edge. Parallel edges are kept.
    pub fn add_edge(&mut self, from: &str, relation: Relation, to: &str) {
        let edge = Edge {
            from: from.to_string(),
            relation,
            to: to.to_string(),
        };

        self.incoming.entry(to.to_string()).or_default().push(edge.clone());
        self.outgoing.entry(from.to_string()).or_default().push(edge);
        self.edge_count += 1;
    }

    /// Answer `SUBJECT -> relation -> ?`.
    ///
    /// Malformed patterns are a `QueryFormat` error. An unknown subject or
    /// relation yields an empty result.
    pub fn query(&self, pattern: &str) -> Result<Vec<Edge>> {
        let pattern = TriplePattern::parse(pattern)?;
        metrics::record_graph_query(&pattern.relation);

        let relation = match pattern.relation.parse::<Relation>() {
            Ok(r) => r,
            Err(_) => {
                tracing::debug!(relation = %pattern.relation, "Unknown relation in query");
                return Ok(Vec::new());
            }
        };

        Ok(self.edges_from(&pattern.subject, relation))
    }

    /// Outgoing edges of `subject` with the given relation, in insertion order
    pub fn edges_from(&self, subject: &str, relation: Relation) -> Vec<Edge> {
        self.outgoing
            .get(subject)
            .map(|edges| edges.iter().filter(|e| e.relation == relation).cloned().collect())
            .unwrap_or_default()
    }

    /// Sources of incoming edges of `target` with the given relation.
    ///
    /// `sources_of(material, AppliesTo)` lists the regulations that cover a
    /// material.
    pub fn sources_of(&self, target: &str, relation: Relation) -> Vec<String> {
        self.incoming
            .get(target)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| e.relation == relation)
                    .map(|e| e.from.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes of one kind, in insertion order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(move |n| n.kind == kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waste::WasteTable;
    use esr_common::errors::AppError;

    fn sample_records() -> Vec<WasteRecord> {
        WasteTable::from_csv_str(
            "batch_id,container_id,material,quantity_kg\n\
             WB-789,C-456,Lead-acid batteries,120\n\
             WB-790,C-222,Lithium-ion batteries,45\n",
        )
        .unwrap()
        .records()
        .to_vec()
    }

    fn targets(edges: &[Edge]) -> Vec<&str> {
        edges.iter().map(|e| e.to.as_str()).collect()
    }

    #[test]
    fn test_container_and_batch_queries() {
        let store = RelationshipStore::load(&sample_records(), &["Clause 8.2 emergency"]);

        let batches = store.query("C-456 -> contains_batch -> ?").unwrap();
        assert_eq!(targets(&batches), vec!["WB-789"]);

        let materials = store.query("WB-789 -> contains_material -> ?").unwrap();
        assert_eq!(targets(&materials), vec!["Lead-acid batteries"]);

        let batch = store.node("WB-789").unwrap();
        assert_eq!(batch.kind, NodeKind::Batch);
        assert_eq!(batch.attributes["quantity_kg"], "120");
    }

    #[test]
    fn test_regulation_applies_to_all_loaded_materials() {
        let store = RelationshipStore::load(&sample_records(), &["Clause 8.2 emergency", "  ", "Clause 6.1"]);

        let covered = store.query("Clause 8.2 emergency -> applies_to -> ?").unwrap();
        assert_eq!(targets(&covered), vec!["Lead-acid batteries", "Lithium-ion batteries"]);

        let regs = store.sources_of("Lead-acid batteries", Relation::AppliesTo);
        assert_eq!(regs, vec!["Clause 8.2 emergency", "Clause 6.1"]);
        assert_eq!(store.nodes_of_kind(NodeKind::Regulation).count(), 2);
    }

    #[test]
    fn test_regulation_fan_out_is_order_dependent() {
        let mut store = RelationshipStore::new();
        store.add_regulation("Clause 8.2");
        for record in sample_records() {
            store.add_record(&record);
        }

        assert!(store.query("Clause 8.2 -> applies_to -> ?").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_subject_or_relation_is_empty() {
        let store = RelationshipStore::load(&sample_records(), &[] as &[&str]);
        assert!(store.query("C-999 -> contains_batch -> ?").unwrap().is_empty());
        assert!(store.query("C-456 -> owns -> ?").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_query() {
        let store = RelationshipStore::new();
        let err = store.query("C-456 contains_batch").unwrap_err();
        assert!(matches!(err, AppError::QueryFormat { .. }));
    }

    #[test]
    fn test_duplicate_rows_keep_parallel_edges() {
        let mut records = sample_records();
        records.push(records[0].clone());
        let store = RelationshipStore::load(&records, &[] as &[&str]);

        assert_eq!(store.query("C-456 -> contains_batch -> ?").unwrap().len(), 2);
        assert_eq!(store.node_count(), 6);
    }

    #[test]
    fn test_kind_conflict_keeps_first() {
        let mut store = RelationshipStore::new();
        assert!(store.add_node("X-1", NodeKind::Container, BTreeMap::new()));
        assert!(!store.add_node("X-1", NodeKind::Material, BTreeMap::new()));
        assert_eq!(store.node("X-1").unwrap().kind, NodeKind::Container);
    }

    #[test]
    fn test_missing_regulation_file() {
        let dir = tempfile::tempdir().unwrap();
        let lines = RelationshipStore::read_regulation_lines(&dir.path().join("none.txt")).unwrap();
        assert!(lines.is_empty());
    }
}
