//! Job producers

use std::sync::Arc;

use super::jobs::{JobKind, ARG_EMAIL, ARG_POST_ID, ARG_USER_ID};
use crate::db::JobArgs;
use crate::error::AppResult;
use crate::traits::QueueTransport;
use crate::utils::{require_arg, validate_email};

/// Typed front door to the queue transport. Arguments are checked here so a
/// malformed job never reaches a worker.
#[derive(Clone)]
pub struct JobQueue {
    transport: Arc<dyn QueueTransport>,
}

impl JobQueue {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    pub async fn enqueue(&self, kind: JobKind, args: JobArgs) -> AppResult<String> {
        for key in kind.required_args() {
            require_arg(&args, key)?;
        }
        if kind == JobKind::WelcomeEmail {
            validate_email(require_arg(&args, ARG_EMAIL)?)?;
        }

        let job_id = self
            .transport
            .enqueue(kind.queue_name(), kind.as_str(), &args)
            .await?;
        tracing::debug!(
            job_id = %job_id,
            job_type = %kind,
            queue = kind.queue_name(),
            "Job enqueued"
        );
        Ok(job_id)
    }

    pub async fn enqueue_welcome_email(&self, user_id: &str, email: &str) -> AppResult<String> {
        let mut args = JobArgs::new();
        args.insert(ARG_USER_ID.to_string(), user_id.trim().to_string());
        args.insert(ARG_EMAIL.to_string(), email.trim().to_string());
        self.enqueue(JobKind::WelcomeEmail, args).await
    }

    pub async fn enqueue_ai_summary(&self, document_id: &str) -> AppResult<String> {
        self.enqueue(JobKind::AiSummary, post_args(document_id)).await
    }

    pub async fn enqueue_embedding_refresh(&self, document_id: &str) -> AppResult<String> {
        self.enqueue(JobKind::AiEmbeddings, post_args(document_id))
            .await
    }

    /// Whether an embedding refresh for `document_id` is queued or running.
    pub async fn embedding_refresh_pending(&self, document_id: &str) -> AppResult<bool> {
        let kind = JobKind::AiEmbeddings;
        self.transport
            .has_pending(kind.queue_name(), kind.as_str(), &post_args(document_id))
            .await
    }
}

fn post_args(document_id: &str) -> JobArgs {
    let mut args = JobArgs::new();
    args.insert(ARG_POST_ID.to_string(), document_id.trim().to_string());
    args
}
