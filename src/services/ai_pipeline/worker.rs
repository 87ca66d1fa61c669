//! Worker pools
//!
//! One pool per named queue. A pool claims jobs while it holds a free slot,
//! runs each on its own task and settles it with the transport: ack on
//! success, nack on a retryable (dependency) failure, dead-letter otherwise.
//! A settle that finds the lease gone is logged and dropped.

use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use super::handlers::{execute, JobDeps};
use crate::db::{NackOutcome, QueuedJob};
use crate::services::QueueConfig;
use crate::traits::QueueTransport;

pub struct WorkerPool {
    queue: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerPool {
    pub fn spawn(
        queue: &str,
        transport: Arc<dyn QueueTransport>,
        deps: JobDeps,
        config: QueueConfig,
    ) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(run_pool(
            queue.to_string(),
            transport,
            Arc::new(deps),
            config,
            receiver,
        ));
        tracing::info!(queue, "Worker pool started");

        Self {
            queue: queue.to_string(),
            shutdown,
            handle,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stops claiming and waits for in-flight jobs to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            tracing::error!(queue = %self.queue, error = %err, "Worker pool task failed");
        }
    }
}

async fn run_pool(
    queue: String,
    transport: Arc<dyn QueueTransport>,
    deps: Arc<JobDeps>,
    config: QueueConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let slots = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut inflight = JoinSet::new();

    loop {
        if *shutdown.borrow() {
            break;
        }
        while let Some(done) = inflight.try_join_next() {
            if let Err(err) = done {
                tracing::error!(queue = %queue, error = %err, "Job task panicked");
            }
        }

        let permit = tokio::select! {
            permit = slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.changed() => break,
        };

        match transport.claim(&queue, config.lease()).await {
            Ok(Some(job)) => {
                inflight.spawn(run_job(
                    job,
                    transport.clone(),
                    deps.clone(),
                    config.clone(),
                    permit,
                ));
                continue;
            }
            Ok(None) => drop(permit),
            Err(err) => {
                drop(permit);
                tracing::warn!(queue = %queue, error = %err, "Claim failed");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval()) => {}
            _ = shutdown.changed() => break,
        }
    }

    let pending = inflight.len();
    if pending > 0 {
        tracing::info!(queue = %queue, pending, "Waiting for in-flight jobs");
    }
    while let Some(done) = inflight.join_next().await {
        if let Err(err) = done {
            tracing::error!(queue = %queue, error = %err, "Job task panicked");
        }
    }
    tracing::info!(queue = %queue, "Worker pool stopped");
}

async fn run_job(
    job: QueuedJob,
    transport: Arc<dyn QueueTransport>,
    deps: Arc<JobDeps>,
    config: QueueConfig,
    _permit: OwnedSemaphorePermit,
) {
    let result = execute(&job, &deps).await;

    match result {
        Ok(outcome) => {
            tracing::debug!(job_id = %job.id, job_type = %job.job_type, outcome = %outcome, "Job succeeded");
            if let Err(err) = transport.ack(&job).await {
                tracing::error!(job_id = %job.id, error = %err, "Ack failed");
            }
        }
        Err(err) if !err.is_retryable() => {
            tracing::error!(
                job_id = %job.id,
                job_type = %job.job_type,
                kind = err.kind(),
                error = %err,
                "Job rejected, moving to dead letters"
            );
            if let Err(dl_err) = transport.dead_letter(&job, &err.to_string()).await {
                tracing::error!(job_id = %job.id, error = %dl_err, "Dead-letter failed");
            }
        }
        Err(err) => {
            let retry_in = config.retry_delay(job.attempts);
            match transport.nack(&job, &err.to_string(), retry_in).await {
                Ok(NackOutcome::Retrying { available_at }) => tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    retry_at = %available_at,
                    error = %err,
                    "Job failed, will retry"
                ),
                Ok(NackOutcome::DeadLettered) => tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    error = %err,
                    "Job failed, attempts exhausted"
                ),
                Ok(NackOutcome::LeaseLost) => {}
                Err(nack_err) => {
                    tracing::error!(job_id = %job.id, error = %nack_err, "Nack failed")
                }
            }
        }
    }
}
