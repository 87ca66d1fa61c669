//! Steps that run before a job handler
//!
//! Each step takes the context built so far and returns it enriched, or an
//! error that stops the chain. Argument checks always happen before any store
//! access.

use crate::db::{DiscussionItem, Document, JobArgs, QueuedJob};
use crate::error::{AppError, AppResult};
use crate::utils::{require_arg, validate_email};

use super::handlers::JobDeps;
use super::jobs::{JobKind, ARG_EMAIL, ARG_POST_ID, ARG_USER_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Middleware {
    /// Logs job type, id and attempt.
    Log,
    /// Extracts `user_id` and `email_addr`.
    RequireUser,
    /// Extracts `post_id`, then loads the document and its discussion.
    LoadPost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobUser {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPost {
    pub document: Document,
    pub discussion: Vec<DiscussionItem>,
}

#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub kind: JobKind,
    pub attempt: u32,
    pub args: JobArgs,
    pub user: Option<JobUser>,
    pub post: Option<LoadedPost>,
}

impl JobContext {
    pub fn new(job: &QueuedJob, kind: JobKind) -> Self {
        Self {
            job_id: job.id.clone(),
            kind,
            attempt: job.attempts,
            args: job.args.clone(),
            user: None,
            post: None,
        }
    }

    pub fn user(&self) -> AppResult<&JobUser> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Validation(format!("{} requires user arguments", self.kind)))
    }

    pub fn post(&self) -> AppResult<&LoadedPost> {
        self.post
            .as_ref()
            .ok_or_else(|| AppError::Validation(format!("{} requires a loaded post", self.kind)))
    }
}

impl Middleware {
    pub async fn apply(self, mut ctx: JobContext, deps: &JobDeps) -> AppResult<JobContext> {
        match self {
            Middleware::Log => {
                tracing::info!(
                    job_type = %ctx.kind,
                    job_id = %ctx.job_id,
                    attempt = ctx.attempt,
                    "Background job is running"
                );
            }
            Middleware::RequireUser => {
                let user_id = require_arg(&ctx.args, ARG_USER_ID)?.to_string();
                let email = validate_email(require_arg(&ctx.args, ARG_EMAIL)?)?.to_string();
                ctx.user = Some(JobUser { user_id, email });
            }
            Middleware::LoadPost => {
                let post_id = require_arg(&ctx.args, ARG_POST_ID)?.to_string();
                let document = deps.store.find_document(&post_id).await?;
                let discussion = deps.store.find_discussion_items(&post_id).await?;
                ctx.post = Some(LoadedPost {
                    document,
                    discussion,
                });
            }
        }
        Ok(ctx)
    }
}

/// Runs `steps` in order; the first failure short-circuits.
pub async fn run_chain(
    steps: &[Middleware],
    mut ctx: JobContext,
    deps: &JobDeps,
) -> AppResult<JobContext> {
    for step in steps {
        ctx = step.apply(ctx, deps).await?;
    }
    Ok(ctx)
}
