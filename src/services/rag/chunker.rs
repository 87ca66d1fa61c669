//! Paragraph chunker

use super::types::{Chunk, ChunkSource};
use crate::db::{DiscussionItem, Document};

/// Splits `text` on line breaks. Blank paragraphs are dropped without
/// consuming an id, so ids are dense from 1.
pub fn chunk_text(document_id: &str, source: ChunkSource, text: &str) -> Vec<Chunk> {
    text.lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .zip(1u32..)
        .map(|(paragraph, chunk_id)| Chunk {
            document_id: document_id.to_string(),
            chunk_id,
            source,
            text: paragraph.to_string(),
            embedding: None,
            score: 0.0,
        })
        .collect()
}

/// Title chunks followed by the chunks of every discussion item, in order.
/// Comment ids continue across items so they stay unique per source.
pub fn chunk_document(document: &Document, discussion: &[DiscussionItem]) -> Vec<Chunk> {
    let mut chunks = chunk_text(&document.id, ChunkSource::Title, &document.title);

    let mut next_comment_id = 1u32;
    for item in discussion {
        for mut chunk in chunk_text(&document.id, ChunkSource::Comment, &item.content) {
            chunk.chunk_id = next_comment_id;
            next_comment_id += 1;
            chunks.push(chunk);
        }
    }
    chunks
}
