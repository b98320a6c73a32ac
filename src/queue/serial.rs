//! Single-consumer work queue serializing access to the model engine.
//!
//! Many handler tasks submit concurrently; exactly one worker task pops
//! jobs in arrival order and runs each inference to completion on the
//! blocking thread pool before taking the next. Each job carries its own
//! single-use result slot, so callers only ever observe their own outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{InferenceOutput, ModelEngine};
use crate::error::{AppError, Result};
use crate::queue::job::Job;

/// Job plus its result slot, written exactly once by the worker
struct QueuedJob {
    job: Job,
    slot: oneshot::Sender<Result<InferenceOutput>>,
}

/// Configuration for the serialization queue
#[derive(Debug, Clone)]
pub struct SerialQueueConfig {
    /// Maximum number of jobs admitted but not yet completed
    pub max_queue_size: usize,
}

impl Default for SerialQueueConfig {
    fn default() -> Self {
        Self { max_queue_size: 256 }
    }
}

/// FIFO queue with a single consumer driving the model engine
pub struct SerialQueue {
    engine: Arc<ModelEngine>,
    job_tx: mpsc::Sender<QueuedJob>,
    // Taken by start(); present only before the worker runs
    job_rx: Mutex<Option<mpsc::Receiver<QueuedJob>>>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepting: AtomicBool,
    pending_count: AtomicU64,
    // Shared with the worker task, which does the counting
    processed_count: Arc<AtomicU64>,
    config: SerialQueueConfig,
}

impl SerialQueue {
    /// Create a queue with default configuration. Idle until `start`.
    pub fn new(engine: Arc<ModelEngine>) -> Self {
        Self::with_config(engine, SerialQueueConfig::default())
    }

    /// Create a queue with custom configuration. Idle until `start`.
    pub fn with_config(engine: Arc<ModelEngine>, config: SerialQueueConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.max_queue_size);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            engine,
            job_tx,
            job_rx: Mutex::new(Some(job_rx)),
            shutdown_tx,
            worker: Mutex::new(None),
            accepting: AtomicBool::new(false),
            pending_count: AtomicU64::new(0),
            processed_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Spawn the worker task. Exactly one worker serves the queue for the
    /// process lifetime; repeated calls are a logged no-op.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("Queue worker already running");
            return;
        }

        let Some(job_rx) = self.job_rx.lock().await.take() else {
            warn!("Queue worker already consumed its receiver");
            return;
        };

        let engine = self.engine.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let processed = self.processed_count.clone();
        let handle = tokio::spawn(Self::run(engine, job_rx, shutdown_rx, processed));

        self.accepting.store(true, Ordering::Release);
        *worker = Some(handle);
        info!("Queue worker started");
    }

    /// Submit one job and await its outcome.
    ///
    /// Fails fast when the engine is unready, the worker is not running,
    /// or the queue is at capacity. Otherwise suspends the caller until
    /// the worker fulfils the job's slot.
    pub async fn submit(&self, job: Job) -> Result<InferenceOutput> {
        if !self.engine.is_ready() {
            return Err(AppError::NotReady);
        }

        if !self.accepting.load(Ordering::Acquire) {
            return Err(AppError::QueueClosed);
        }

        if self.pending_count.load(Ordering::Relaxed) >= self.config.max_queue_size as u64 {
            return Err(AppError::QueueFull);
        }

        let (slot_tx, slot_rx) = oneshot::channel();
        self.pending_count.fetch_add(1, Ordering::Relaxed);

        let queued = QueuedJob { job, slot: slot_tx };
        if self.job_tx.send(queued).await.is_err() {
            self.pending_count.fetch_sub(1, Ordering::Relaxed);
            return Err(AppError::QueueClosed);
        }

        debug!(pending = self.pending_count.load(Ordering::Relaxed), "Job queued");

        let outcome = match slot_rx.await {
            Ok(outcome) => outcome,
            // Slot dropped without a write: the worker went away
            Err(_) => Err(AppError::QueueClosed),
        };

        self.pending_count.fetch_sub(1, Ordering::Relaxed);
        outcome
    }

    /// Stop the worker. Closes intake, lets the in-flight job finish,
    /// then fails every still-queued job so no caller stays suspended.
    pub async fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Queue worker exited abnormally");
            }
        }
        info!("Queue worker stopped");
    }

    /// Number of jobs admitted but not yet resolved
    pub fn pending_count(&self) -> u64 {
        self.pending_count.load(Ordering::Relaxed)
    }

    /// Number of jobs resolved since startup
    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// Worker loop: strictly sequential, FIFO, survives per-job failures
    async fn run(
        engine: Arc<ModelEngine>,
        mut job_rx: mpsc::Receiver<QueuedJob>,
        mut shutdown_rx: watch::Receiver<bool>,
        processed: Arc<AtomicU64>,
    ) {
        loop {
            let queued = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                next = job_rx.recv() => match next {
                    Some(queued) => queued,
                    None => break,
                },
            };

            Self::execute(&engine, queued).await;
            processed.fetch_add(1, Ordering::Relaxed);
        }

        // Shutdown: everything still queued gets a terminal outcome
        job_rx.close();
        let mut drained = 0usize;
        while let Ok(queued) = job_rx.try_recv() {
            let _ = queued.slot.send(Err(AppError::QueueClosed));
            drained += 1;
        }
        if drained > 0 {
            warn!(drained, "Failed jobs still queued at shutdown");
        }
    }

    /// Run one job on the blocking pool and write its slot exactly once
    async fn execute(engine: &Arc<ModelEngine>, queued: QueuedJob) {
        let QueuedJob { job, slot } = queued;

        let engine = engine.clone();
        let outcome = match tokio::task::spawn_blocking(move || engine.infer(&job)).await {
            Ok(outcome) => outcome,
            // A panic inside infer must not take the worker down with it
            Err(join_error) => {
                error!(error = %join_error, "Inference task panicked");
                Err(AppError::Infer(format!("inference task failed: {}", join_error)))
            }
        };

        if let Err(unclaimed) = slot.send(outcome) {
            // Caller gave up waiting; the result has no observer left
            debug!(success = unclaimed.is_ok(), "Job outcome had no waiter");
        }
    }
}
