//! Lookup steps: relationship graph, document search, waste records

use super::{resolve_container, Step, StepContext};
use crate::state::{DocResults, GraphResults, IncidentState, StepOutput, WasteInfo};
use crate::step::StepId;
use async_trait::async_trait;
use esr_search::{Relation, TriplePattern};

/// Walks container -> batches -> materials -> regulations
pub struct GraphQueryStep;

impl GraphQueryStep {
    fn lookup(container: &str, ctx: &StepContext) -> GraphResults {
        let graph = &ctx.backends.graph;
        let mut results = GraphResults {
            container: Some(container.to_string()),
            ..Default::default()
        };

        let batches = match graph.query(&TriplePattern::format(container, Relation::ContainsBatch.as_str())) {
            Ok(edges) => edges,
            Err(e) => {
                results.error = Some(e.to_string());
                return results;
            }
        };

        for batch in batches {
            match graph.query(&TriplePattern::format(&batch.to, Relation::ContainsMaterial.as_str())) {
                Ok(edges) => results.materials.extend(edges.into_iter().map(|e| e.to)),
                Err(e) => results.error = Some(e.to_string()),
            }
            results.batches.push(batch.to);
        }

        for material in &results.materials {
            for regulation in graph.sources_of(material, Relation::AppliesTo) {
                if !results.regulations.contains(&regulation) {
                    results.regulations.push(regulation);
                }
            }
        }

        results
    }
}

#[async_trait]
impl Step for GraphQueryStep {
    fn id(&self) -> StepId {
        StepId::GraphQuery
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let results = match resolve_container(state, ctx) {
            Some(container) => Self::lookup(&container, ctx),
            None => GraphResults::default(),
        };

        tracing::debug!(
            run_id = %state.run_id,
            container = ?results.container,
            batches = results.batches.len(),
            materials = results.materials.len(),
            "Graph lookup complete"
        );

        StepOutput::Graph(results)
    }
}

/// Similarity search over the document corpus
pub struct DocSearchStep;

#[async_trait]
impl Step for DocSearchStep {
    fn id(&self) -> StepId {
        StepId::DocSearch
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let query = match &state.incident {
            Some(incident) => incident.description.clone(),
            None => ctx.workflow.doc_query.clone(),
        };

        let results = ctx.backends.index.search(&query, ctx.workflow.top_k);
        StepOutput::Docs(DocResults { query, results })
    }
}

/// Waste rows for the run's container, else its material
pub struct WasteLookupStep;

impl WasteLookupStep {
    fn selector(state: &IncidentState, ctx: &StepContext) -> Option<String> {
        resolve_container(state, ctx)
            .or_else(|| state.incident.as_ref().and_then(|i| i.material_type.clone()))
            .or_else(|| state.first_material().map(str::to_string))
            .filter(|s| !s.trim().is_empty())
    }
}

#[async_trait]
impl Step for WasteLookupStep {
    fn id(&self) -> StepId {
        StepId::WasteLookup
    }

    async fn run(&self, state: &IncidentState, ctx: &StepContext) -> StepOutput {
        let selector = Self::selector(state, ctx);
        let results = selector
            .as_deref()
            .map(|s| ctx.backends.waste.lookup(s))
            .unwrap_or_default();

        StepOutput::Waste(WasteInfo { selector, results })
    }
}
