use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSource {
    Title,
    Comment,
}

impl ChunkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkSource::Title => "title",
            ChunkSource::Comment => "comment",
        }
    }
}

/// A paragraph of a document with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    /// 1-based, dense within `(document_id, source)`.
    pub chunk_id: u32,
    pub source: ChunkSource,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub score: f32,
}

impl Chunk {
    /// Sets the embedding once. Returns `false` and keeps the existing vector
    /// if one is already attached.
    pub fn attach_embedding(&mut self, embedding: Vec<f32>) -> bool {
        if self.embedding.is_some() {
            return false;
        }
        self.embedding = Some(embedding);
        true
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// Every chunk of one document, cached as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSet {
    pub document_id: String,
    pub chunks: Vec<Chunk>,
}

impl EvidenceSet {
    pub fn new(document_id: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            document_id: document_id.into(),
            chunks,
        }
    }

    /// Non-empty, every chunk belongs to this document and carries an embedding.
    pub fn is_complete(&self) -> bool {
        !self.chunks.is_empty()
            && self
                .chunks
                .iter()
                .all(|c| c.document_id == self.document_id && c.has_embedding())
    }
}

/// Result of answering a query about a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Scores of every ranked chunk, highest first.
    pub ranked_scores: Vec<f32>,
    pub answer: String,
}
