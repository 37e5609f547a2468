//! Background job runner.
//!
//! Request handlers enqueue jobs after their transaction commits and return
//! without waiting. A fixed pool of workers drains a bounded queue, runs each
//! job through the retry policy, and drops it once the budget is spent.
//!
//! ```text
//!  handler ──enqueue──► [ mpsc queue ] ──► worker 1 ─┐
//!                                     ├──► worker 2 ─┼──► JobHandler::handle
//!                                     └──► worker N ─┘        │
//!                                                   retry ◄───┘ transient error
//! ```
//!
//! Delivery is at-least-once: a job that fails after a partial side effect is
//! run again from the top.
//!
//! Shutdown closes the queue to new jobs and lets the workers drain what is
//! already buffered. Jobs still queued when the grace period runs out are
//! counted as abandoned.

use crate::retry::{RetryPolicy, retry_with_predicate};
use async_trait::async_trait;
use metrics::counter;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

/// Job failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Worth another attempt (storage or broker hiccup).
    #[error("transient job failure: {0}")]
    Transient(String),

    /// Will never succeed (the referenced record is gone).
    #[error("permanent job failure: {0}")]
    Permanent(String),

    /// The runner has shut down.
    #[error("job queue closed")]
    QueueClosed,
}

impl JobError {
    /// Whether the runner should try again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Executes one kind of job.
#[async_trait]
pub trait JobHandler<J>: Send + Sync + 'static {
    /// Runs `job` once.
    async fn handle(&self, job: &J) -> Result<(), JobError>;
}

/// Where jobs are scheduled.
#[async_trait]
pub trait JobQueue<J>: Send + Sync {
    /// Schedules `job`, waiting for queue space if necessary.
    async fn enqueue(&self, job: J) -> Result<(), JobError>;
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct JobRunnerConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Queue slots before `enqueue` waits
    pub queue_capacity: usize,
    /// Retry budget per job
    pub retry: RetryPolicy,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cloneable handle for scheduling jobs on a [`JobRunner`].
pub struct JobSender<J> {
    tx: mpsc::Sender<J>,
}

impl<J> Clone for JobSender<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl<J> JobQueue<J> for JobSender<J>
where
    J: Display + Send + 'static,
{
    async fn enqueue(&self, job: J) -> Result<(), JobError> {
        tracing::debug!(job = %job, "Enqueueing job");
        self.tx.send(job).await.map_err(|_| JobError::QueueClosed)
    }
}

/// A running worker pool.
pub struct JobRunner<J> {
    sender: JobSender<J>,
    queue: Arc<Mutex<mpsc::Receiver<J>>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl<J> JobRunner<J>
where
    J: Display + Send + Sync + 'static,
{
    /// Spawns `config.workers` workers running `handler`.
    #[must_use]
    pub fn start<H>(handler: Arc<H>, config: JobRunnerConfig) -> Self
    where
        H: JobHandler<J>,
    {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));
        let policy = Arc::new(config.retry);

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let handler = Arc::clone(&handler);
                let queue = Arc::clone(&rx);
                let policy = Arc::clone(&policy);
                let shutdown = shutdown_rx.clone();
                tokio::spawn(run_worker(worker, handler, queue, policy, shutdown))
            })
            .collect();

        tracing::info!(workers = config.workers.max(1), "Job runner started");

        Self {
            sender: JobSender { tx },
            queue: rx,
            shutdown,
            workers,
        }
    }

    /// Handle for enqueueing.
    #[must_use]
    pub fn sender(&self) -> JobSender<J> {
        self.sender.clone()
    }

    /// Stops taking new jobs and waits up to `timeout` for the queue to drain.
    ///
    /// Buffered jobs still run. On timeout the workers are aborted and every
    /// job left in the queue is dropped and counted as abandoned.
    pub async fn shutdown(self, timeout: Duration) {
        let _ = self.shutdown.send(true);
        let aborts: Vec<_> = self.workers.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(self.workers);
        if tokio::time::timeout(timeout, drain).await.is_ok() {
            tracing::info!("Job runner stopped");
            return;
        }

        for abort in &aborts {
            abort.abort();
        }
        let mut queue = self.queue.lock().await;
        queue.close();
        let mut abandoned = 0_u64;
        while queue.try_recv().is_ok() {
            abandoned += 1;
        }
        counter!("dispatch_jobs_total", "outcome" => "abandoned").increment(abandoned);
        tracing::warn!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            abandoned,
            "Job runner shutdown timed out"
        );
    }
}

async fn run_worker<J, H>(
    worker: usize,
    handler: Arc<H>,
    rx: Arc<Mutex<mpsc::Receiver<J>>>,
    policy: Arc<RetryPolicy>,
    mut shutdown: watch::Receiver<bool>,
) where
    J: Display + Send + Sync + 'static,
    H: JobHandler<J>,
{
    loop {
        let next = {
            let mut rx = rx.lock().await;
            if *shutdown.borrow() {
                rx.close();
                rx.recv().await
            } else {
                tokio::select! {
                    job = rx.recv() => job,
                    _ = shutdown.changed() => {
                        // stop accepting, keep what is buffered
                        rx.close();
                        rx.recv().await
                    }
                }
            }
        };
        let Some(job) = next else {
            tracing::debug!(worker, "Worker exiting");
            return;
        };

        let outcome =
            retry_with_predicate(&policy, || handler.handle(&job), JobError::is_transient).await;

        match outcome {
            Ok(()) => {
                counter!("dispatch_jobs_total", "outcome" => "completed").increment(1);
            }
            Err(err) => {
                tracing::error!(worker, job = %job, error = %err, "Dropping job");
                counter!("dispatch_jobs_total", "outcome" => "dropped").increment(1);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures_before_success: usize,
        calls: AtomicUsize,
        done: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl JobHandler<u32> for Flaky {
        async fn handle(&self, job: &u32) -> Result<(), JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(JobError::Transient("not yet".into()));
            }
            let _ = self.done.send(*job);
            Ok(())
        }
    }

    fn config(max_retries: usize) -> JobRunnerConfig {
        JobRunnerConfig {
            workers: 2,
            queue_capacity: 8,
            retry: RetryPolicy::builder()
                .max_retries(max_retries)
                .initial_delay(Duration::from_millis(1))
                .build(),
        }
    }

    #[tokio::test]
    async fn test_jobs_run_in_background() {
        let (done, mut completed) = mpsc::unbounded_channel();
        let handler = Arc::new(Flaky {
            failures_before_success: 0,
            calls: AtomicUsize::new(0),
            done,
        });
        let runner = JobRunner::start(handler, config(0));

        runner.sender().enqueue(1).await.unwrap();
        runner.sender().enqueue(2).await.unwrap();

        let mut seen = vec![completed.recv().await.unwrap(), completed.recv().await.unwrap()];
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
        runner.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (done, mut completed) = mpsc::unbounded_channel();
        let handler = Arc::new(Flaky {
            failures_before_success: 2,
            calls: AtomicUsize::new(0),
            done,
        });
        let runner = JobRunner::start(Arc::clone(&handler), config(3));

        runner.sender().enqueue(9).await.unwrap();

        assert_eq!(completed.recv().await, Some(9));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        runner.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_job_is_dropped_after_budget() {
        let (done, mut completed) = mpsc::unbounded_channel();
        let handler = Arc::new(Flaky {
            failures_before_success: usize::MAX,
            calls: AtomicUsize::new(0),
            done,
        });
        let runner = JobRunner::start(Arc::clone(&handler), config(2));

        runner.sender().enqueue(5).await.unwrap();
        runner.shutdown(Duration::from_secs(1)).await;

        // shutdown waits for the in-flight job, which gives up after 1 + 2 attempts
        assert!(completed.try_recv().is_err());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    struct Slow {
        delay: Duration,
        done: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl JobHandler<u32> for Slow {
        async fn handle(&self, job: &u32) -> Result<(), JobError> {
            tokio::time::sleep(self.delay).await;
            let _ = self.done.send(*job);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffered_jobs() {
        let (done, mut completed) = mpsc::unbounded_channel();
        let handler = Arc::new(Slow {
            delay: Duration::from_millis(20),
            done,
        });
        let runner = JobRunner::start(
            handler,
            JobRunnerConfig {
                workers: 1,
                ..config(0)
            },
        );
        let sender = runner.sender();
        for job in 1..=5 {
            sender.enqueue(job).await.unwrap();
        }

        runner.shutdown(Duration::from_secs(5)).await;

        let mut seen = Vec::new();
        while let Ok(job) = completed.try_recv() {
            seen.push(job);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(sender.enqueue(6).await, Err(JobError::QueueClosed));
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_the_grace_period() {
        let (done, mut completed) = mpsc::unbounded_channel();
        let handler = Arc::new(Slow {
            delay: Duration::from_secs(60),
            done,
        });
        let runner = JobRunner::start(
            handler,
            JobRunnerConfig {
                workers: 1,
                ..config(0)
            },
        );
        let sender = runner.sender();
        for job in 1..=3 {
            sender.enqueue(job).await.unwrap();
        }

        tokio::time::timeout(
            Duration::from_secs(5),
            runner.shutdown(Duration::from_millis(50)),
        )
        .await
        .expect("shutdown returns after its grace period");

        assert!(completed.try_recv().is_err());
        assert_eq!(sender.enqueue(4).await, Err(JobError::QueueClosed));
    }
}
