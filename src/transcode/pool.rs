//! Bounded-concurrency worker pool.
//!
//! Tasks are queued on an unbounded channel, so submission never blocks and
//! there is no backlog limit. A single dispatcher task pulls them off in
//! FIFO order and waits for one of N semaphore permits before handing the
//! task to a blocking thread, so at most N encodes run at once. Completion
//! order is whatever it is; only dispatch order is guaranteed.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use vidmill_common::{Error, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-capacity pool for blocking encode tasks.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<Task>,
}

impl WorkerPool {
    /// Create a pool allowing `max_concurrent` tasks to run at once.
    /// Must be called from within a tokio runtime.
    pub fn new(max_concurrent: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                tokio::task::spawn_blocking(move || {
                    task();
                    drop(permit);
                });
            }
            tracing::debug!("Worker pool dispatcher stopped");
        });

        Self { tx }
    }

    /// Enqueue a task. Returns immediately; the task runs when a slot frees
    /// up. Fails only if the dispatcher has shut down.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(task))
            .map_err(|_| Error::internal("Worker pool is shut down"))
    }
}
