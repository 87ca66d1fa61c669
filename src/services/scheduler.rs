//! Periodic embedding refresh
//!
//! Each tick lists documents and enqueues an embedding job for every one
//! updated within the staleness window, unless one is already queued or
//! running for it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::AppResult;
use crate::services::{JobQueue, SchedulerConfig};
use crate::traits::DocumentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub enqueued: usize,
    pub skipped: usize,
    /// Recent documents that already had a refresh waiting.
    pub pending: usize,
    pub failed: usize,
}

pub struct EmbeddingRefreshScheduler {
    store: Arc<dyn DocumentStore>,
    jobs: JobQueue,
    config: SchedulerConfig,
}

impl EmbeddingRefreshScheduler {
    pub fn new(store: Arc<dyn DocumentStore>, jobs: JobQueue, config: SchedulerConfig) -> Self {
        Self {
            store,
            jobs,
            config,
        }
    }

    /// One scan. A failed enqueue is logged and the scan moves on.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<ScanReport> {
        let window = self.config.staleness();
        let stamps = self.store.list_document_stamps().await?;
        let mut report = ScanReport::default();

        for stamp in stamps {
            if now.signed_duration_since(stamp.updated_at) > window {
                tracing::debug!(document_id = %stamp.id, updated_at = %stamp.updated_at, "Skipping stale document");
                report.skipped += 1;
                continue;
            }

            match self.jobs.embedding_refresh_pending(&stamp.id).await {
                Ok(true) => {
                    report.pending += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(document_id = %stamp.id, error = %err, "Failed to check pending refresh");
                    report.failed += 1;
                    continue;
                }
            }

            match self.jobs.enqueue_embedding_refresh(&stamp.id).await {
                Ok(_) => report.enqueued += 1,
                Err(err) => {
                    tracing::warn!(document_id = %stamp.id, error = %err, "Failed to enqueue embedding refresh");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Runs `run_once` every interval until `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                interval_secs = self.config.interval().as_secs(),
                staleness_hours = self.config.staleness_hours,
                "Embedding refresh scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once(Utc::now()).await {
                            Ok(report) if report.enqueued > 0 || report.failed > 0 => {
                                tracing::info!(
                                    enqueued = report.enqueued,
                                    skipped = report.skipped,
                                    pending = report.pending,
                                    failed = report.failed,
                                    "Embedding refresh scan finished"
                                );
                            }
                            Ok(_) => {}
                            Err(err) => tracing::warn!(error = %err, "Embedding refresh scan failed"),
                        }
                    }
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            tracing::info!("Embedding refresh scheduler stopped");
        })
    }
}
