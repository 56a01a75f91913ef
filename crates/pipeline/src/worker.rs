//! The worker pool: N independent consumers over one shared queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tickerflow_core::config::PipelineConfig;
use tickerflow_queue::{ClaimedJob, JobDisposition, JobQueue};

use crate::process::JobProcessor;

/// Spawns `worker_count` consumer tasks and drains them gracefully on
/// shutdown: the watcher stops feeding, in-flight jobs finish, idle workers
/// exit at their next poll.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    config: PipelineConfig,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        processor: Arc<JobProcessor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            config,
        }
    }

    /// Run until `shutdown` fires, then drain.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.config.worker_count);

        for slot in 0..self.config.worker_count {
            handles.push(self.spawn_worker(slot, stop.clone(), shutdown.clone()));
        }
        info!(workers = self.config.worker_count, "worker pool started");

        shutdown.notified().await;
        stop.store(true, Ordering::SeqCst);
        shutdown.notify_waiters();

        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool drained");
    }

    fn spawn_worker(
        &self,
        slot: usize,
        stop: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
    ) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let processor = self.processor.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            info!(slot, "worker started");
            loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                match queue.claim(config.job_lease).await {
                    Ok(Some(claimed)) => {
                        handle_job(&*queue, &processor, claimed).await;
                    }
                    Ok(None) => {
                        // Cooperative idle: sleep until the next poll or a
                        // shutdown wake-up.
                        tokio::select! {
                            _ = tokio::time::sleep(config.idle_poll) => {}
                            _ = shutdown.notified() => {}
                        }
                    }
                    Err(e) => {
                        warn!(slot, error = %e, "claim failed, backing off");
                        tokio::time::sleep(config.idle_poll).await;
                    }
                }
            }
            info!(slot, "worker stopped");
        })
    }
}

/// One job, end to end. Every error is converted to a job outcome here; the
/// worker loop itself never dies on a bad file.
async fn handle_job(queue: &dyn JobQueue, processor: &JobProcessor, claimed: ClaimedJob) {
    let id = claimed.id;
    match processor.run_job(&claimed).await {
        Ok(_) => {
            if let Err(e) = queue.complete(id).await {
                warn!(id, error = %e, "could not mark job done");
            }
        }
        Err(err) => {
            let retryable = err.retryable();
            match queue.fail(id, &err.to_string(), retryable).await {
                Ok(JobDisposition::Requeued) => {
                    // File stays in the raw area for the retry.
                }
                Ok(JobDisposition::Terminal) => {
                    processor.record_failure(&claimed, &err).await;
                }
                Err(e) => warn!(id, error = %e, "could not record job failure"),
            }
        }
    }
}
