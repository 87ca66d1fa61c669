//! Job handlers
//!
//! Every handler is an idempotent overwrite, so redelivery after a crash or an
//! expired lease is harmless.

use std::sync::Arc;

use crate::db::QueuedJob;
use crate::error::{AppError, AppResult};
use crate::services::rag::EvidenceCache;
use crate::services::{build_summary_prompt, welcome_email_html, WELCOME_SUBJECT};
use crate::traits::{DocumentStore, Embedder, Mailer, TextGenerator};
use crate::utils::compute_sha256;

use super::jobs::JobKind;
use super::middleware::{run_chain, JobContext, LoadedPost};

/// Capabilities shared by every handler of a pool.
#[derive(Clone)]
pub struct JobDeps {
    pub store: Arc<dyn DocumentStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn TextGenerator>,
    pub mailer: Arc<dyn Mailer>,
    pub cache: EvidenceCache,
}

/// Resolves the job type, runs its middleware chain, then its handler.
/// Returns a short outcome for the log.
pub async fn execute(job: &QueuedJob, deps: &JobDeps) -> AppResult<String> {
    let kind = JobKind::from_job_type(&job.job_type)?;
    if job.queue != kind.queue_name() {
        return Err(AppError::Validation(format!(
            "{kind} belongs on {}, found on {}",
            kind.queue_name(),
            job.queue
        )));
    }
    let ctx = run_chain(kind.middleware(), JobContext::new(job, kind), deps).await?;

    match kind {
        JobKind::WelcomeEmail => send_welcome_email(&ctx, deps).await,
        JobKind::AiSummary => send_ai_summary(&ctx, deps).await,
        JobKind::AiEmbeddings => generate_ai_embeddings(&ctx, deps).await,
    }
}

async fn send_welcome_email(ctx: &JobContext, deps: &JobDeps) -> AppResult<String> {
    let user = ctx.user()?;
    let message_id = deps
        .mailer
        .send(&user.email, WELCOME_SUBJECT, &welcome_email_html())
        .await?;

    tracing::info!(
        job_id = %ctx.job_id,
        user_id = %user.user_id,
        message_id = %message_id,
        "Welcome email sent"
    );
    Ok(message_id)
}

async fn send_ai_summary(ctx: &JobContext, deps: &JobDeps) -> AppResult<String> {
    let post = ctx.post()?;
    let prompt = build_summary_prompt(&post.document, &post.discussion);
    let summary = deps.generator.generate(&prompt).await?;

    tracing::info!(
        job_id = %ctx.job_id,
        document_id = %post.document.id,
        summary = %summary,
        "AI summary generated"
    );
    Ok(summary)
}

async fn generate_ai_embeddings(ctx: &JobContext, deps: &JobDeps) -> AppResult<String> {
    let post = ctx.post()?;
    let document_id = post.document.id.as_str();
    let text = embedding_text(post);

    let embedding = deps.embedder.embed(&text).await?;
    deps.store
        .update_document_embeddings(document_id, &embedding)
        .await?;
    deps.cache.invalidate(document_id).await;

    let fingerprint = compute_sha256(&text);
    tracing::info!(
        job_id = %ctx.job_id,
        document_id,
        dims = embedding.len(),
        model = deps.embedder.model_name(),
        content_hash = %fingerprint,
        "Document embeddings refreshed"
    );
    Ok(fingerprint)
}

/// Title, body and every discussion item, one per line.
fn embedding_text(post: &LoadedPost) -> String {
    let mut parts = vec![post.document.title.as_str(), post.document.body.as_str()];
    parts.extend(post.discussion.iter().map(|item| item.content.as_str()));
    parts.join("\n")
}
