//! Startup wiring
//!
//! Builds the read-only data engines once and assembles the step context
//! from configuration. Missing data sources yield empty engines.

use crate::audit::JsonlAuditSink;
use crate::insurer::HttpInsurerClient;
use crate::steps::StepContext;
use esr_common::config::AppConfig;
use esr_common::embeddings::create_embedder;
use esr_common::errors::Result;
use esr_common::llm::create_classifier;
use esr_search::{RelationshipStore, SimilarityIndex, WasteTable};
use std::sync::Arc;

/// Data engines shared by every run. Never mutated after construction.
#[derive(Clone)]
pub struct Backends {
    pub graph: Arc<RelationshipStore>,
    pub index: Arc<SimilarityIndex>,
    pub waste: Arc<WasteTable>,
}

impl Backends {
    pub fn new(graph: RelationshipStore, index: SimilarityIndex, waste: WasteTable) -> Self {
        Self {
            graph: Arc::new(graph),
            index: Arc::new(index),
            waste: Arc::new(waste),
        }
    }

    /// Load waste rows, regulations and the document corpus
    pub fn load(config: &AppConfig) -> Result<Self> {
        let waste = WasteTable::load(&config.data.waste_csv)?;
        let regulations = RelationshipStore::read_regulation_lines(&config.data.regulations)?;
        let graph = RelationshipStore::load(waste.records(), &regulations);

        let embedder = create_embedder(&config.embedding.provider, config.embedding.dimension);
        let mut index = SimilarityIndex::new(embedder);
        index.add_corpus(&config.data.corpus_dir)?;

        tracing::info!(
            graph_nodes = graph.node_count(),
            graph_edges = graph.edge_count(),
            documents = index.len(),
            waste_rows = waste.len(),
            "Backends loaded"
        );

        Ok(Self::new(graph, index, waste))
    }
}

impl StepContext {
    /// Assemble backends and collaborators from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            backends: Backends::load(config)?,
            insurer: Arc::new(HttpInsurerClient::new(&config.insurer)?),
            audit: Arc::new(JsonlAuditSink::new(config.audit.path.clone())),
            classifier: create_classifier(&config.llm)?,
            workflow: config.workflow.clone(),
        })
    }
}
