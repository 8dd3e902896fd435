//! Job queue and worker pool.
//!
//! Session IDs are submitted into one bounded FIFO buffer and drained by a
//! fixed number of workers, each running the session handler for one job at a
//! time.
//!
//! - `submit` never waits: a full buffer is rejected with `Error::QueueFull`.
//! - `stop` fires the cancellation signal, closes the submission path, and
//!   waits for every worker to finish its current job. Jobs still buffered at
//!   that point are dropped, never started.
//! - The queue does not deduplicate session IDs.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::model::SessionJob;
use crate::traits::SessionHandler;

/// Default number of buffered jobs.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 3;

/// Queue sizing, fixed at construction.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of workers spawned by `start`.
    pub workers: usize,
    /// Maximum number of jobs waiting for a worker.
    ///
    /// A channel cannot be zero-sized, so `JobQueue::new` raises 0 to 1 and
    /// logs a warning; `JobQueue::config` reports the effective value.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<SessionJob>>>;

/// Bounded job queue with a pool of session workers.
pub struct JobQueue {
    config: QueueConfig,
    handler: Arc<dyn SessionHandler>,
    /// `None` once the queue has been stopped.
    sender: Mutex<Option<mpsc::Sender<SessionJob>>>,
    receiver: SharedReceiver,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Create a queue. No workers run until [`JobQueue::start`].
    pub fn new(handler: Arc<dyn SessionHandler>, mut config: QueueConfig) -> Self {
        if config.capacity == 0 {
            tracing::warn!("queue capacity 0 is not supported, using 1");
            config.capacity = 1;
        }
        let (sender, receiver) = mpsc::channel(config.capacity);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            handler,
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Spawn `config.workers` workers on the current tokio runtime.
    ///
    /// Returns immediately. Calling it again adds another set of workers.
    pub fn start(&self) {
        tracing::info!("starting queue with {} workers", self.config.workers);

        let mut joins = match self.workers.lock() {
            Ok(joins) => joins,
            Err(poisoned) => poisoned.into_inner(),
        };
        let first_id = joins.len();
        for worker_id in first_id..first_id + self.config.workers {
            let receiver = Arc::clone(&self.receiver);
            let handler = Arc::clone(&self.handler);
            let shutdown_rx = self.shutdown_tx.subscribe();
            joins.push(tokio::spawn(worker_loop(
                worker_id,
                receiver,
                handler,
                shutdown_rx,
            )));
        }
    }

    /// Enqueue a session without blocking.
    pub fn submit(&self, session_id: &str) -> Result<(), Error> {
        if *self.shutdown_tx.borrow() {
            return Err(Error::Cancelled);
        }

        let sender = self
            .sender
            .lock()
            .map_err(|_| Error::Cancelled)?
            .clone()
            .ok_or(Error::Cancelled)?;

        match sender.try_send(SessionJob::new(session_id)) {
            Ok(()) => {
                tracing::info!(session_id, "enqueued study session");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id, "queue is full, rejecting session");
                Err(Error::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(Error::Cancelled),
        }
    }

    /// Number of jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        match self.sender.lock() {
            Ok(guard) => guard
                .as_ref()
                .map(|s| s.max_capacity() - s.capacity())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Whether `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop accepting work and wait for all workers to exit.
    ///
    /// In-flight jobs run to completion; buffered jobs are dropped.
    pub async fn stop(&self) {
        tracing::info!("stopping queue");
        self.shutdown_tx.send_replace(true);

        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let joins: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut joins) => joins.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for join in joins {
            if let Err(e) = join.await {
                tracing::error!("worker task failed: {e}");
            }
        }

        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut dropped = 0usize;
        while let Ok(job) = receiver.try_recv() {
            tracing::debug!(session_id = %job.session_id, "dropping queued job");
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!("dropped {dropped} queued jobs on shutdown");
        }
        tracing::info!("queue stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: SharedReceiver,
    handler: Arc<dyn SessionHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(worker_id, "worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Waiting for a job races the shutdown signal; shutdown wins ties.
        let job = tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            job = recv_next(&receiver) => job,
        };

        let Some(job) = job else {
            tracing::info!(worker_id, "job channel closed");
            break;
        };

        if *shutdown_rx.borrow() {
            tracing::debug!(worker_id, session_id = %job.session_id, "shutdown requested, not starting job");
            break;
        }

        run_job(worker_id, handler.as_ref(), job).await;
    }

    tracing::info!(worker_id, "worker exiting");
}

async fn recv_next(receiver: &SharedReceiver) -> Option<SessionJob> {
    receiver.lock().await.recv().await
}

async fn run_job(worker_id: usize, handler: &dyn SessionHandler, job: SessionJob) {
    let session_id = job.session_id;
    let waited_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds();
    tracing::info!(worker_id, %session_id, waited_ms, "processing session");

    match AssertUnwindSafe(handler.process(&session_id))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => tracing::info!(worker_id, %session_id, "processed session"),
        Ok(Err(e)) => tracing::error!(worker_id, %session_id, "processing failed: {e}"),
        Err(_) => tracing::error!(worker_id, %session_id, "processing panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;

    /// Records every processed session.
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionHandler for RecordingHandler {
        async fn process(&self, session_id: &str) -> Result<(), Error> {
            self.seen.lock().unwrap().push(session_id.to_string());
            if session_id.starts_with("bad") {
                return Err(Error::NotFound(session_id.to_string()));
            }
            if session_id.starts_with("panic") {
                panic!("handler blew up");
            }
            Ok(())
        }
    }

    /// Blocks each job until a permit is added.
    struct GatedHandler {
        gate: Semaphore,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl GatedHandler {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionHandler for GatedHandler {
        async fn process(&self, _session_id: &str) -> Result<(), Error> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.expect("semaphore open");
            permit.forget();
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn submit_rejects_when_buffer_is_full() {
        let queue = JobQueue::new(
            Arc::new(RecordingHandler::default()),
            QueueConfig {
                workers: 1,
                capacity: 100,
            },
        );

        for i in 0..100 {
            queue.submit(&format!("s{i}")).unwrap();
        }
        assert_eq!(queue.pending(), 100);
        assert!(matches!(queue.submit("s100"), Err(Error::QueueFull)));
    }

    #[tokio::test]
    async fn zero_capacity_is_raised_to_one() {
        let queue = JobQueue::new(
            Arc::new(RecordingHandler::default()),
            QueueConfig {
                workers: 2,
                capacity: 0,
            },
        );

        assert_eq!(queue.config().capacity, 1);
        assert_eq!(queue.config().workers, 2);
        queue.submit("s1").unwrap();
        assert!(matches!(queue.submit("s2"), Err(Error::QueueFull)));
    }

    #[tokio::test]
    async fn workers_drain_jobs_and_survive_failures() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = JobQueue::new(
            handler.clone(),
            QueueConfig {
                workers: 3,
                capacity: 10,
            },
        );
        queue.start();

        for id in ["s1", "bad1", "panic1", "s2", "s3"] {
            queue.submit(id).unwrap();
        }
        wait_until(|| handler.seen.lock().unwrap().len() == 5).await;
        queue.stop().await;

        let seen: HashSet<String> = handler.seen.lock().unwrap().iter().cloned().collect();
        for id in ["s1", "bad1", "panic1", "s2", "s3"] {
            assert!(seen.contains(id), "missing {id}");
        }
    }

    #[tokio::test]
    async fn single_worker_dequeues_in_submission_order() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = JobQueue::new(
            handler.clone(),
            QueueConfig {
                workers: 1,
                capacity: 10,
            },
        );
        for id in ["a", "b", "c", "d"] {
            queue.submit(id).unwrap();
        }
        queue.start();
        wait_until(|| handler.seen.lock().unwrap().len() == 4).await;
        queue.stop().await;

        assert_eq!(*handler.seen.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn submit_after_stop_is_cancelled() {
        let queue = JobQueue::new(Arc::new(RecordingHandler::default()), QueueConfig::default());
        queue.start();
        queue.stop().await;

        assert!(queue.is_stopped());
        assert!(matches!(queue.submit("late"), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_job_and_drops_the_rest() {
        let handler = Arc::new(GatedHandler::new());
        let queue = Arc::new(JobQueue::new(
            handler.clone(),
            QueueConfig {
                workers: 1,
                capacity: 10,
            },
        ));
        queue.start();

        for i in 0..4 {
            queue.submit(&format!("s{i}")).unwrap();
        }
        wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;

        let stopper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.stop().await })
        };
        wait_until(|| queue.is_stopped()).await;

        // Release every job; only the in-flight one may run.
        handler.gate.add_permits(10);
        stopper.await.unwrap();

        assert_eq!(handler.started.load(Ordering::SeqCst), 1);
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_returns() {
        let queue = JobQueue::new(Arc::new(RecordingHandler::default()), QueueConfig::default());
        queue.submit("s1").unwrap();
        queue.stop().await;
        assert_eq!(queue.pending(), 0);
    }
}
