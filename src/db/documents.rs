//! SQLite-backed document reader

use async_trait::async_trait;

use super::types::{millis_to_datetime, DiscussionItemRow, DocumentRow};
use super::{DbPool, DiscussionItem, Document, DocumentKind, DocumentStamp};
use crate::error::{AppError, AppResult};
use crate::traits::DocumentStore;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: DbPool,
}

impl SqliteDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_document(&self, document_id: &str) -> AppResult<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT document_id, title, body, kind, tags, embeddings, updated_at
             FROM documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("document", document_id))?;

        document_from_row(row)
    }

    async fn find_discussion_items(&self, document_id: &str) -> AppResult<Vec<DiscussionItem>> {
        let rows = sqlx::query_as::<_, DiscussionItemRow>(
            "SELECT item_id, document_id, content, created_at
             FROM discussion_items WHERE document_id = ?
             ORDER BY created_at ASC, item_id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DiscussionItem {
                id: row.item_id,
                document_id: row.document_id,
                content: row.content,
                created_at: millis_to_datetime(row.created_at),
            })
            .collect())
    }

    async fn update_document_embeddings(
        &self,
        document_id: &str,
        embeddings: &[f32],
    ) -> AppResult<()> {
        let encoded = serde_json::to_string(embeddings)?;
        // updated_at is left alone: the vector is derived data, not an edit.
        let result = sqlx::query("UPDATE documents SET embeddings = ? WHERE document_id = ?")
            .bind(encoded)
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("document", document_id));
        }
        tracing::debug!(document_id, dims = embeddings.len(), "Document embeddings updated");
        Ok(())
    }

    async fn list_document_stamps(&self) -> AppResult<Vec<DocumentStamp>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT document_id, updated_at FROM documents ORDER BY document_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, updated_at)| DocumentStamp {
                id,
                updated_at: millis_to_datetime(updated_at),
            })
            .collect())
    }
}

fn document_from_row(row: DocumentRow) -> AppResult<Document> {
    let tags: Vec<String> = serde_json::from_str(&row.tags)?;
    let embeddings = match row.embeddings.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(serde_json::from_str::<Vec<f32>>(raw)?),
        _ => None,
    };

    Ok(Document {
        id: row.document_id,
        title: row.title,
        body: row.body,
        kind: row.kind,
        tags,
        updated_at: millis_to_datetime(row.updated_at),
        embeddings,
    })
}

pub struct NewDocument<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub kind: DocumentKind,
    pub tags: &'a [String],
    pub updated_at_ms: i64,
}

/// Inserts or replaces a document row.
pub async fn upsert_document(pool: &DbPool, doc: NewDocument<'_>) -> AppResult<()> {
    let tags = serde_json::to_string(doc.tags)?;
    sqlx::query(
        "INSERT INTO documents (document_id, title, body, kind, tags, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(document_id) DO UPDATE SET
             title = excluded.title,
             body = excluded.body,
             kind = excluded.kind,
             tags = excluded.tags,
             updated_at = excluded.updated_at",
    )
    .bind(doc.id)
    .bind(doc.title)
    .bind(doc.body)
    .bind(doc.kind)
    .bind(tags)
    .bind(doc.updated_at_ms)
    .bind(doc.updated_at_ms)
    .execute(pool)
    .await?;

    tracing::debug!(document_id = doc.id, "Document upserted");
    Ok(())
}

pub async fn insert_discussion_item(
    pool: &DbPool,
    item_id: &str,
    document_id: &str,
    content: &str,
    created_at_ms: i64,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO discussion_items (item_id, document_id, content, created_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(document_id)
    .bind(content)
    .bind(created_at_ms)
    .execute(pool)
    .await?;
    Ok(())
}
