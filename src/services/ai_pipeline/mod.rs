//! Background job pipeline
//!
//! Split into submodules:
//! - `jobs`: job kinds, wire names and queue routing
//! - `queue`: typed producers
//! - `middleware`: logging and argument hydration run before handlers
//! - `handlers`: welcome email, AI summary, embedding refresh
//! - `worker`: bounded worker pools with cooperative shutdown

mod handlers;
mod jobs;
mod middleware;
mod queue;
mod worker;

pub use handlers::{execute, JobDeps};
pub use jobs::{
    JobKind, AI_EMBEDDINGS_QUEUE, AI_SUMMARY_QUEUE, ARG_EMAIL, ARG_POST_ID, ARG_USER_ID,
    EMAIL_QUEUE,
};
pub use middleware::{run_chain, JobContext, JobUser, LoadedPost, Middleware};
pub use queue::JobQueue;
pub use worker::WorkerPool;
