//! Single-worker execution queue with caller-runs backpressure.
//!
//! [`CallerRunsExecutor`] owns one worker thread draining a bounded
//! `tokio::sync::mpsc` channel. When the channel is full, the submitting
//! thread runs the job itself instead of blocking or dropping it. Queue
//! growth stays bounded and a saturated worker can never deadlock its
//! callers.
//!
//! The worker drains the channel with `blocking_recv`, so no async runtime
//! is needed. Do not call [`CallerRunsExecutor::shutdown`] from inside an
//! async context; it joins the worker thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};

use crate::telemetry;
use crate::{CubeError, Result};

/// Default number of jobs queued ahead of the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a submitted job was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Handed to the worker thread.
    Queued,
    /// The queue was full; the job already ran on the calling thread.
    RanInline,
}

/// Bounded single-worker executor with caller-runs saturation policy.
pub struct CallerRunsExecutor {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    queue_capacity: usize,
}

impl CallerRunsExecutor {
    /// Start a worker with room for `queue_capacity` pending jobs.
    pub fn new(queue_capacity: usize) -> Result<Self> {
        if queue_capacity == 0 {
            return Err(CubeError::InvalidInput(
                "executor queue capacity must be positive".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let worker = std::thread::Builder::new()
            .name("cubecache-worker".to_string())
            .spawn(move || run_worker(rx))?;

        debug!(queue_capacity, "started caller-runs executor");
        Ok(Self {
            sender: Some(tx),
            worker: Some(worker),
            queue_capacity,
        })
    }

    /// Submit `job`.
    ///
    /// Returns [`Submission::RanInline`] when the queue was saturated and the
    /// job has already run on this thread.
    ///
    /// # Errors
    ///
    /// [`CubeError::ExecutorShutdown`] after [`shutdown`](Self::shutdown).
    pub fn submit<F>(&self, job: F) -> Result<Submission>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return Err(CubeError::ExecutorShutdown);
        };

        match sender.try_send(Box::new(job)) {
            Ok(()) => {
                metrics::counter!(telemetry::EXECUTOR_JOBS_TOTAL, "mode" => "queued").increment(1);
                Ok(Submission::Queued)
            }
            Err(TrySendError::Full(job)) => {
                debug!("executor queue saturated, running job on caller");
                metrics::counter!(telemetry::EXECUTOR_JOBS_TOTAL, "mode" => "inline").increment(1);
                job();
                Ok(Submission::RanInline)
            }
            Err(TrySendError::Closed(_)) => Err(CubeError::ExecutorShutdown),
        }
    }

    /// Jobs that may wait in the queue before callers start running them.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.sender.is_none()
    }

    /// Stop accepting jobs, run everything already queued, and join the
    /// worker. Idempotent.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("executor worker exited with a panic");
            }
            debug!("caller-runs executor stopped");
        }
    }
}

impl Drop for CallerRunsExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CallerRunsExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerRunsExecutor")
            .field("queue_capacity", &self.queue_capacity)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn run_worker(mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        // A failing job must not take the worker down with it.
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("executor job panicked");
        }
    }
}
