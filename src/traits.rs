//! Capability traits consumed by the core.
//!
//! - [`Embedder`]: text to vector
//! - [`TextGenerator`]: prompt to text
//! - [`DocumentStore`]: read documents and their discussion, persist embeddings
//! - [`KvStore`]: byte cache with per-key expiry
//! - [`QueueTransport`]: durable job backlog
//! - [`Mailer`]: transactional email
//!
//! Every implementation is constructed explicitly and injected as `Arc<dyn …>`,
//! so tests swap in doubles without touching process-wide state.

use std::time::Duration;

use async_trait::async_trait;

use crate::db::{DiscussionItem, Document, DocumentStamp, JobArgs, NackOutcome, QueuedJob};
use crate::error::AppResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `AppError::NotFound` when the document does not exist.
    async fn find_document(&self, document_id: &str) -> AppResult<Document>;

    /// Discussion items of a document, oldest first.
    async fn find_discussion_items(&self, document_id: &str) -> AppResult<Vec<DiscussionItem>>;

    async fn update_document_embeddings(&self, document_id: &str, embeddings: &[f32])
        -> AppResult<()>;

    async fn list_document_stamps(&self) -> AppResult<Vec<DocumentStamp>>;
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Appends a job and returns its id.
    async fn enqueue(&self, queue: &str, job_type: &str, args: &JobArgs) -> AppResult<String>;

    /// Leases the next ready job of `queue`. A leased job is invisible to other
    /// claimers until it is acked, nacked or its lease runs out.
    async fn claim(&self, queue: &str, lease: Duration) -> AppResult<Option<QueuedJob>>;

    /// Removes a successfully handled job. Returns false when `job`'s lease
    /// is no longer current and nothing was changed.
    async fn ack(&self, job: &QueuedJob) -> AppResult<bool>;

    /// Records a failed attempt; requeues after `retry_in` or dead-letters once
    /// the attempt budget is spent.
    async fn nack(&self, job: &QueuedJob, error: &str, retry_in: Duration)
        -> AppResult<NackOutcome>;

    /// Moves a job straight to the dead-letter state. Returns false when the
    /// lease is no longer current.
    async fn dead_letter(&self, job: &QueuedJob, error: &str) -> AppResult<bool>;

    /// Whether a job with exactly these arguments is queued or running.
    async fn has_pending(&self, queue: &str, job_type: &str, args: &JobArgs) -> AppResult<bool>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Returns the provider's message id.
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String>;
}
