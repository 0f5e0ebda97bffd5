//! Flat similarity index
//!
//! Documents are embedded once at build time. Adding a directory re-embeds
//! the whole corpus, matching a rebuild of the underlying flat index.

use super::{SearchHit, CORPUS_EXTENSIONS};
use esr_common::embeddings::{inner_product, l2_normalize, Embedder};
use esr_common::errors::Result;
use esr_common::metrics;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// In-memory index of (document text, unit embedding)
pub struct SimilarityIndex {
    embedder: Arc<dyn Embedder>,
    documents: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl SimilarityIndex {
    /// Create an empty index
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            documents: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Scan `dir` recursively for `.txt` / `.md` files (case-insensitive)
    /// and add their contents. Returns the number of documents added.
    ///
    /// A missing directory adds nothing. Files that are not valid UTF-8 are
    /// skipped with a warning.
    pub fn add_corpus(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            tracing::info!(dir = %dir.display(), "Corpus directory not found");
            return Ok(0);
        }

        let mut added = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable corpus entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_corpus_file(entry.path()) {
                continue;
            }

            match std::fs::read_to_string(entry.path()) {
                Ok(text) => added.push(text),
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Skipping corpus file"
                    );
                }
            }
        }

        let count = added.len();
        self.add_documents(added);

        tracing::info!(
            dir = %dir.display(),
            added = count,
            total = self.len(),
            "Corpus indexed"
        );

        Ok(count)
    }

    /// Add documents directly and rebuild the index
    pub fn add_documents<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.documents.len();
        self.documents.extend(documents);
        if self.documents.len() == before {
            return;
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.vectors = self
            .embedder
            .embed_batch(&self.documents)
            .into_iter()
            .map(|mut v| {
                l2_normalize(&mut v);
                v
            })
            .collect();
    }

    /// Top `k` documents by normalised inner product, best first.
    ///
    /// Returns `min(k, len)` hits. Ties keep corpus order.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if self.documents.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut query_vec = self.embedder.embed(query);
        l2_normalize(&mut query_vec);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, inner_product(&query_vec, v)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .map(|(index, score)| SearchHit {
                index,
                score,
                text: self.documents[index].clone(),
            })
            .collect();

        metrics::record_similarity_search(hits.len());
        hits
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }
}

fn is_corpus_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CORPUS_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esr_common::embeddings::HashEmbedder;
    use std::fs;

    fn index() -> SimilarityIndex {
        SimilarityIndex::new(Arc::new(HashEmbedder::new(64)))
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let idx = index();
        assert!(idx.search("anything", 5).is_empty());
    }

    #[test]
    fn test_exact_text_scores_highest() {
        let mut idx = index();
        idx.add_documents(vec![
            "Spills must be reported within 24 hours".to_string(),
            "Containers require labels".to_string(),
            "Training certificates expire yearly".to_string(),
        ]);

        let hits = idx.search("Containers require labels", 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "Containers require labels");
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_k_larger_than_corpus() {
        let mut idx = index();
        idx.add_documents(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(idx.search("q", 10).len(), 2);
        assert!(idx.search("q", 0).is_empty());
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut idx = index();
        idx.add_documents(vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]);
        let first: Vec<usize> = idx.search("delta", 3).iter().map(|h| h.index).collect();
        let second: Vec<usize> = idx.search("delta", 3).iter().map(|h| h.index).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_corpus_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "clause one").unwrap();
        fs::write(dir.path().join("B.MD"), "clause two").unwrap();
        fs::write(dir.path().join("data.csv"), "x,y").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.md"), "clause three").unwrap();
        fs::write(dir.path().join("bin.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let mut idx = index();
        let added = idx.add_corpus(dir.path()).unwrap();
        assert_eq!(added, 3);
        assert_eq!(idx.len(), 3);
        assert!(!idx.documents().iter().any(|d| d.contains("x,y")));
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let mut idx = index();
        idx.add_documents(vec![
            "unrelated note".to_string(),
            "leak procedure".to_string(),
            "leak procedure".to_string(),
            "leak procedure".to_string(),
        ]);

        let hits = idx.search("leak procedure", 3);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(hits.iter().all(|h| h.score == hits[0].score));
    }

    #[test]
    fn test_add_corpus_accumulates_across_directories() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("spill.md"), "spill response steps").unwrap();
        fs::write(second.path().join("labels.txt"), "label every container").unwrap();
        fs::write(second.path().join("training.txt"), "handler training records").unwrap();

        let mut idx = index();
        assert_eq!(idx.add_corpus(first.path()).unwrap(), 1);
        assert_eq!(idx.add_corpus(second.path()).unwrap(), 2);
        assert_eq!(idx.len(), 3);

        for text in ["spill response steps", "label every container", "handler training records"] {
            let hits = idx.search(text, 1);
            assert_eq!(hits[0].text, text);
        }
        assert_eq!(idx.search("anything", 10).len(), 3);
    }

    #[test]
    fn test_missing_corpus_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = index();
        assert_eq!(idx.add_corpus(&dir.path().join("missing")).unwrap(), 0);
        assert!(idx.is_empty());
    }
}
