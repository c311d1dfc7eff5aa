//! Single-worker task queue for transport work
//!
//! Jobs are sent over an unbounded tokio channel so submitting never blocks;
//! one std thread receives them with `blocking_recv` and runs them strictly in
//! submission order. A running job always finishes; cancelling only skips
//! what is still queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use crate::error::{Result, SyncError};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct TaskQueue {
    tx: Option<UnboundedSender<Job>>,
    cancelled: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    worker: Option<JoinHandle<()>>,
}

/// Result of a job submitted with [`TaskQueue::submit_with_result`].
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Pending<T> {
    /// Block until the job has run. Fails if it was skipped by a cancel.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().map_err(|_| SyncError::QueueCancelled)
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, mut rx) = unbounded_channel::<Job>();
        let (done_tx, done) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        let worker = thread::Builder::new()
            .name("yail-repl-queue".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if flag.load(Ordering::SeqCst) {
                        continue;
                    }
                    job();
                }
                let _ = done_tx.send(());
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(%err, "failed to start task queue worker");
                None
            }
        };

        Self {
            tx: worker.as_ref().map(|_| tx),
            cancelled,
            done,
            worker,
        }
    }

    /// Queue a job without waiting for it.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(SyncError::QueueCancelled)?;
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SyncError::QueueCancelled);
        }
        tx.send(Box::new(job)).map_err(|_| SyncError::QueueCancelled)
    }

    /// Queue a job whose result the caller can wait for.
    pub fn submit_with_result<T, F>(&self, job: F) -> Result<Pending<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move || {
            let _ = tx.send(job());
        })?;
        Ok(Pending { rx })
    }

    /// Queue a job and block until it has run.
    pub fn submit_and_wait<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit_with_result(job)?.wait()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Skip queued jobs and wait for the worker to finish the one it is
    /// running. Returns whether the worker stopped within `timeout`.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.cancelled.store(true, Ordering::SeqCst);
        self.tx = None;

        let Some(worker) = self.worker.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(?timeout, "task queue worker did not stop in time");
                false
            }
        }
    }

    /// Cancel outstanding work and replace the worker with a fresh one.
    pub fn restart(&mut self, timeout: Duration) -> bool {
        let stopped = self.shutdown(timeout);
        *self = TaskQueue::new();
        stopped
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
