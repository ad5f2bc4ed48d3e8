// src/watch/executor.rs

//! The serialization domain for every watcher-tree mutation.
//!
//! One worker thread drains a queue of jobs. Jobs never overlap, so anything
//! that touches node children, known-subdirectory sets or bus subscriptions
//! from inside a job is race-free. Code already running on the worker
//! (detected through a thread-local marker, not a lock) executes nested work
//! inline instead of queueing it behind itself.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::errors::{DirwatchError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Worker stack. Start and stop recurse once per directory level.
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

thread_local! {
    /// Id of the executor whose worker is the current thread, if any.
    static CURRENT_EXECUTOR: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Cheaply cloneable handle to one mutation worker.
///
/// The worker exits once every handle has been dropped and the queue is empty.
#[derive(Clone, Debug)]
pub struct MutationExecutor {
    inner: Arc<ExecutorInner>,
}

#[derive(Debug)]
struct ExecutorInner {
    id: u64,
    tx: mpsc::UnboundedSender<Job>,
}

impl MutationExecutor {
    /// Spawn a new worker thread.
    ///
    /// If the OS refuses the thread, the executor is returned anyway and every
    /// call on it reports [`DirwatchError::ExecutorUnavailable`].
    pub fn spawn(name: &str) -> Self {
        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                CURRENT_EXECUTOR.with(|current| current.set(Some(id)));
                debug!(executor = id, "mutation executor started");

                while let Some(job) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(executor = id, "mutation job panicked; continuing");
                    }
                }

                debug!(executor = id, "mutation executor finished (channel closed)");
            });
        if let Err(err) = worker {
            error!(executor = id, "failed to spawn mutation executor thread: {err}");
        }

        Self {
            inner: Arc::new(ExecutorInner { id, tx }),
        }
    }

    /// True when called from this executor's worker thread.
    pub fn is_current(&self) -> bool {
        CURRENT_EXECUTOR.with(|current| current.get() == Some(self.inner.id))
    }

    /// Queue `job` without waiting for it.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .tx
            .send(Box::new(job))
            .map_err(|_| DirwatchError::ExecutorUnavailable)
    }

    /// Run `job` exclusively and return its result.
    ///
    /// Inline when already on the worker; otherwise the caller blocks until
    /// the worker has run it. Must not be called from inside a handle
    /// callback, which may run while the worker waits on that handle.
    pub fn run<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (reply_tx, reply_rx) = std_mpsc::sync_channel::<R>(1);
        self.submit(move || {
            let _ = reply_tx.send(job());
        })?;
        // A dropped sender means the job panicked or the worker is gone.
        reply_rx.recv().map_err(|_| DirwatchError::ExecutorUnavailable)
    }

    /// Block until every job queued before this call has run.
    ///
    /// No-op when called from the worker itself.
    pub fn drain(&self) -> Result<()> {
        self.run(|| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn nested_run_executes_inline() {
        let exec = MutationExecutor::spawn("test-exec");
        assert!(!exec.is_current());

        let nested = exec.clone();
        let result = exec
            .run(move || {
                assert!(nested.is_current());
                // Would deadlock if this were queued behind the outer job.
                nested.run(|| 21).unwrap() * 2
            })
            .unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn markers_are_per_executor() {
        let a = MutationExecutor::spawn("exec-a");
        let b = MutationExecutor::spawn("exec-b");
        let b2 = b.clone();
        let on_b_from_a = a.run(move || b2.is_current()).unwrap();
        assert!(!on_b_from_a);
    }

    #[test]
    fn jobs_are_mutually_exclusive() {
        let exec = MutationExecutor::spawn("test-exclusive");
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let exec = exec.clone();
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let active = Arc::clone(&active);
                        let overlaps = Arc::clone(&overlaps);
                        exec.run(move || {
                            if active.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_micros(200));
                            active.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drain_waits_for_submitted_jobs() {
        let exec = MutationExecutor::spawn("test-drain");
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = Arc::clone(&done);
            exec.submit(move || {
                thread::sleep(Duration::from_millis(2));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        exec.drain().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn panicking_job_reports_unavailable_but_worker_survives() {
        let exec = MutationExecutor::spawn("test-panic");
        let result: Result<()> = exec.run(|| panic!("boom"));
        assert!(matches!(result, Err(DirwatchError::ExecutorUnavailable)));
        assert_eq!(exec.run(|| 7).unwrap(), 7);
    }
}
