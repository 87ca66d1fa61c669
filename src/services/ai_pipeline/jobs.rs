use crate::error::{AppError, AppResult};

use super::middleware::Middleware;

pub const EMAIL_QUEUE: &str = "email_queue";
pub const AI_SUMMARY_QUEUE: &str = "ai_summary_queue";
pub const AI_EMBEDDINGS_QUEUE: &str = "ai_embeddings_queue";

pub const ARG_USER_ID: &str = "user_id";
pub const ARG_EMAIL: &str = "email_addr";
pub const ARG_POST_ID: &str = "post_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    WelcomeEmail,
    AiSummary,
    AiEmbeddings,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::WelcomeEmail, JobKind::AiSummary, JobKind::AiEmbeddings];

    /// Wire name stored with the job.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::WelcomeEmail => "send_welcome_email",
            JobKind::AiSummary => "send_ai_summary",
            JobKind::AiEmbeddings => "generate_ai_embeddings",
        }
    }

    pub fn queue_name(&self) -> &'static str {
        match self {
            JobKind::WelcomeEmail => EMAIL_QUEUE,
            JobKind::AiSummary => AI_SUMMARY_QUEUE,
            JobKind::AiEmbeddings => AI_EMBEDDINGS_QUEUE,
        }
    }

    pub fn required_args(&self) -> &'static [&'static str] {
        match self {
            JobKind::WelcomeEmail => &[ARG_USER_ID, ARG_EMAIL],
            JobKind::AiSummary | JobKind::AiEmbeddings => &[ARG_POST_ID],
        }
    }

    /// Steps run before the handler, in order.
    pub fn middleware(&self) -> &'static [Middleware] {
        match self {
            JobKind::WelcomeEmail => &[Middleware::Log, Middleware::RequireUser],
            JobKind::AiSummary | JobKind::AiEmbeddings => &[Middleware::Log, Middleware::LoadPost],
        }
    }

    pub fn from_job_type(job_type: &str) -> AppResult<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == job_type)
            .ok_or_else(|| AppError::Validation(format!("unknown job type {job_type}")))
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_job_type(kind.as_str()).unwrap(), kind);
        }
        assert!(matches!(
            JobKind::from_job_type("send_newsletter"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn each_kind_has_its_own_queue() {
        assert_eq!(JobKind::WelcomeEmail.queue_name(), "email_queue");
        assert_eq!(JobKind::AiSummary.queue_name(), "ai_summary_queue");
        assert_eq!(JobKind::AiEmbeddings.queue_name(), "ai_embeddings_queue");
    }

    #[test]
    fn hydration_follows_logging() {
        for kind in JobKind::ALL {
            assert_eq!(kind.middleware()[0], Middleware::Log);
        }
        assert_eq!(JobKind::AiEmbeddings.middleware()[1], Middleware::LoadPost);
        assert_eq!(JobKind::WelcomeEmail.middleware()[1], Middleware::RequireUser);
    }
}
