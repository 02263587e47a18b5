//! Worker pool, completions and in-flight tracking.
//!
//! Every engine owns a [`WorkerPool`] sized by `max_threads`. Batch inserts and
//! training always fan out on its build threads. In [`ManagementMode::Async`]
//! single inserts and searches are queued on a second set of threads and the
//! caller gets a [`Completion`]; in [`ManagementMode::Sync`] they run on the
//! caller's thread and the completion is already resolved.

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use tracing::error;

use crate::config::ManagementMode;
use crate::error::{Error, Result};

/// The result of a possibly queued operation.
#[derive(Debug)]
#[must_use = "a completion does nothing unless waited on"]
pub struct Completion<T> {
    inner: CompletionInner<T>,
}

#[derive(Debug)]
enum CompletionInner<T> {
    Ready(Result<T>),
    Pending(mpsc::Receiver<Result<T>>),
}

impl<T> Completion<T> {
    /// A completion that already holds its result.
    pub const fn ready(result: Result<T>) -> Self {
        Self { inner: CompletionInner::Ready(result) }
    }

    /// Whether the result was available at creation.
    pub const fn is_ready(&self) -> bool {
        matches!(self.inner, CompletionInner::Ready(_))
    }

    /// Block until the operation finishes and return its result.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, or [`Error::Internal`] if the worker running
    /// it panicked.
    pub fn wait(self) -> Result<T> {
        match self.inner {
            CompletionInner::Ready(result) => result,
            CompletionInner::Pending(rx) => rx
                .recv()
                .map_err(|_| Error::internal("worker dropped the operation before completing it"))?,
        }
    }
}

/// Counts operations in progress so that teardown can wait for them.
#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Decrements the in-flight count when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl InFlight {
    /// Create a tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an operation.
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard { tracker: Arc::clone(self) }
    }

    /// Number of operations in progress.
    pub fn active(&self) -> usize {
        *self.count.lock()
    }

    /// Block until no operation is in progress.
    pub fn drain(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.tracker.count.lock();
        *count -= 1;
        if *count == 0 {
            self.tracker.drained.notify_all();
        }
    }
}

/// Bounded worker pools bound to a management mode.
///
/// Parallel construction runs on `build`; async submissions queue on `queue`.
/// Queued calls may block on engine locks, so they never share threads with
/// construction work that runs while such a lock is held.
#[derive(Debug)]
pub struct WorkerPool {
    mode: ManagementMode,
    build: ThreadPool,
    queue: Option<ThreadPool>,
}

fn thread_pool(threads: usize, role: &'static str) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("caiss-{role}-{i}"))
        .panic_handler(move |_| error!(role, "caiss worker panicked"))
        .build()
        .map_err(|e| Error::ResourceExhausted(format!("cannot start {role} pool: {e}")))
}

impl WorkerPool {
    /// Build pools of `threads` workers; the queue pool exists only in async mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceExhausted`] if the threads cannot be spawned.
    pub fn new(mode: ManagementMode, threads: usize) -> Result<Self> {
        let queue = match mode {
            ManagementMode::Sync => None,
            ManagementMode::Async => Some(thread_pool(threads, "queue")?),
        };
        Ok(Self { mode, build: thread_pool(threads, "build")?, queue })
    }

    /// The management mode.
    pub const fn mode(&self) -> ManagementMode {
        self.mode
    }

    /// Number of construction threads.
    pub fn threads(&self) -> usize {
        self.build.current_num_threads()
    }

    /// Run `op` inside the build pool so that parallel iterators use its workers.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.build.install(op)
    }

    /// Run `op` inline in sync mode, or queue it in async mode.
    pub fn submit<T, F>(&self, op: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        match &self.queue {
            None => Completion::ready(op()),
            Some(queue) => {
                let (tx, rx) = mpsc::channel();
                queue.spawn(move || {
                    // The receiver may already be gone; nobody is waiting then
                    let _ = tx.send(op());
                });
                Completion { inner: CompletionInner::Pending(rx) }
            }
        }
    }
}
