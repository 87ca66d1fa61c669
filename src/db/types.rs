//! Records read and written by the core

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Job arguments. Ordered so serialized payloads are stable.
pub type JobArgs = BTreeMap<String, String>;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Link,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub kind: DocumentKind,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub embeddings: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionItem {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// What the scheduler needs to decide whether a document is due for refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStamp {
    pub id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct DocumentRow {
    pub document_id: String,
    pub title: String,
    pub body: String,
    pub kind: DocumentKind,
    pub tags: String,
    pub embeddings: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct DiscussionItemRow {
    pub item_id: String,
    pub document_id: String,
    pub content: String,
    pub created_at: i64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Dead,
}

/// A job leased to one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: String,
    /// Token of this delivery. Settling with a stale token is a no-op.
    pub lease_id: String,
    pub queue: String,
    pub job_type: String,
    pub args: JobArgs,
    /// Deliveries so far, including this one.
    pub attempts: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NackOutcome {
    Retrying { available_at: DateTime<Utc> },
    DeadLettered,
    /// The lease expired and the job was handed to someone else.
    LeaseLost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub id: String,
    pub job_type: String,
    pub args: JobArgs,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct JobRow {
    pub job_id: String,
    pub lease_id: String,
    pub queue: String,
    pub job_type: String,
    pub args: String,
    pub attempts: i64,
    pub max_attempts: i64,
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
