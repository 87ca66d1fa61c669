mod cache;
mod documents;
mod jobs;
mod pool;
mod types;


use sqlx::{migrate::Migrator, Pool, Sqlite};

pub use cache::*;
pub use documents::*;
pub use jobs::*;
pub use pool::*;
pub use types::{
    DeadLetter, DiscussionItem, Document, DocumentKind, DocumentStamp, JobArgs, JobStatus,
    NackOutcome, QueuedJob,
};

pub type DbPool = Pool<Sqlite>;

pub static MIGRATOR: Migrator = sqlx::migrate!();
