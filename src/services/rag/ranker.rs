//! Cosine ranking and top-K selection

use super::types::Chunk;
use crate::error::{AppError, AppResult};

/// Cosine similarity in `[-1, 1]`. A zero-magnitude input scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(AppError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Scores every chunk against `query` and sorts by score, highest first.
/// Ties keep their input order.
pub fn rank(mut chunks: Vec<Chunk>, query: &[f32]) -> AppResult<Vec<Chunk>> {
    for chunk in chunks.iter_mut() {
        let embedding = chunk.embedding.as_deref().ok_or_else(|| {
            AppError::Validation(format!(
                "chunk {}:{}#{} has no embedding",
                chunk.document_id,
                chunk.source.as_str(),
                chunk.chunk_id
            ))
        })?;
        chunk.score = cosine_similarity(query, embedding)?;
    }

    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(chunks)
}

/// At most `k` chunks scoring strictly above `min_score`, in ranked order.
pub fn select_top_k(ranked: &[Chunk], k: usize, min_score: f32) -> Vec<&Chunk> {
    ranked
        .iter()
        .filter(|chunk| chunk.score > min_score)
        .take(k)
        .collect()
}
