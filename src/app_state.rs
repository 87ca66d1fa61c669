use std::path::Path;
use std::sync::Arc;

use crate::db::{
    connections_for_workers, init_pool_sized, DbPool, SqliteDocumentStore, SqliteKvStore,
    SqliteQueue,
};
use crate::error::AppResult;
use crate::services::rag::{EvidenceCache, RagOrchestrator};
use crate::services::{
    AppConfig, EmbeddingRefreshScheduler, GeminiClient, JobDeps, JobKind, JobQueue,
    ResendMailer, WorkerPool,
};
use crate::traits::DocumentStore;

/// Everything the daemon wires together, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub kv: Arc<SqliteKvStore>,
    pub transport: Arc<SqliteQueue>,
    pub jobs: JobQueue,
    pub rag: Arc<RagOrchestrator>,
    pub job_deps: JobDeps,
}

impl AppState {
    pub async fn init(config: AppConfig) -> AppResult<Self> {
        let max_connections = connections_for_workers(JobKind::ALL.len(), config.queue.concurrency);
        let db = init_pool_sized(Path::new(&config.database_path), max_connections).await?;

        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(db.clone()));
        let kv = Arc::new(SqliteKvStore::new(db.clone()));
        let transport = Arc::new(SqliteQueue::new(db.clone(), config.queue.max_attempts));
        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);
        let mailer = Arc::new(ResendMailer::new(&config.mail)?);
        let cache = EvidenceCache::new(kv.clone(), config.rag.cache_ttl());

        let rag = Arc::new(RagOrchestrator::new(
            store.clone(),
            gemini.clone(),
            gemini.clone(),
            cache.clone(),
            config.rag.clone(),
        ));
        let job_deps = JobDeps {
            store: store.clone(),
            embedder: gemini.clone(),
            generator: gemini,
            mailer,
            cache,
        };

        Ok(Self {
            jobs: JobQueue::new(transport.clone()),
            db,
            config,
            store,
            kv,
            transport,
            rag,
            job_deps,
        })
    }

    /// One pool per job queue.
    pub fn start_workers(&self) -> Vec<WorkerPool> {
        JobKind::ALL
            .iter()
            .map(|kind| {
                WorkerPool::spawn(
                    kind.queue_name(),
                    self.transport.clone(),
                    self.job_deps.clone(),
                    self.config.queue.clone(),
                )
            })
            .collect()
    }

    pub fn scheduler(&self) -> EmbeddingRefreshScheduler {
        EmbeddingRefreshScheduler::new(
            self.store.clone(),
            self.jobs.clone(),
            self.config.scheduler.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_wires_sqlite_adapters() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database_path = dir.path().join("app.sqlite").to_string_lossy().to_string();

        let state = AppState::init(config).await.unwrap();
        let id = state.jobs.enqueue_ai_summary("p1").await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(state.transport.queue_depth("ai_summary_queue").await.unwrap(), 1);

        let pools = state.start_workers();
        let queues: Vec<&str> = pools.iter().map(|p| p.queue()).collect();
        assert_eq!(queues, vec!["email_queue", "ai_summary_queue", "ai_embeddings_queue"]);
        for pool in pools {
            pool.stop().await;
        }
    }
}
