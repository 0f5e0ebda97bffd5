//! Document retrieval
//!
//! Provides a flat inner-product similarity index over a free-text corpus.
//! Scores compare unit-normalised embeddings, so they lie in [-1, 1].

mod index;

pub use index::SimilarityIndex;

use serde::{Deserialize, Serialize};

/// File extensions picked up when scanning a corpus directory
pub const CORPUS_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Retrieved document with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Position of the document in the index
    #[serde(skip)]
    pub index: usize,

    /// Normalised inner product with the query
    pub score: f32,

    /// Full document text
    pub text: String,
}
