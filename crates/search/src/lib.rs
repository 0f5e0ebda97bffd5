//! ESR Orchestrator Data Engines
//!
//! Read-only engines built once at startup and shared by every run:
//! - Relationship graph over containers, batches, materials and regulations
//! - Similarity index over a free-text document corpus
//! - Waste tracking table loaded from CSV

pub mod graph;
pub mod retrieval;
pub mod waste;

pub use graph::{Edge, Node, NodeKind, Relation, RelationshipStore, TriplePattern};
pub use retrieval::{SearchHit, SimilarityIndex};
pub use waste::{WasteRecord, WasteTable};
