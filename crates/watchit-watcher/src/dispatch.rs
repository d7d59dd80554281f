//! Bounded fire-and-forget execution of trigger handlers.
//!
//! A [`Dispatcher`] runs jobs on the Tokio blocking pool, never blocking
//! the caller. At most `max_in_flight` jobs run at once; a job offered
//! while the dispatcher is saturated is dropped and counted rather than
//! queued, so a fast polling interval cannot grow memory without bound.
//!
//! ```text
//! poller ──spawn(job)──► try_acquire permit ──ok──► spawn_blocking ──► catch_unwind(job)
//!                              │
//!                              └──none──► dropped += 1, warn!
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::SchedulerError;

#[derive(Debug, Default)]
struct DispatchCounters {
    dispatched: AtomicU64,
    dropped: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of a dispatcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Jobs accepted and started.
    pub dispatched: u64,
    /// Jobs rejected because every slot was busy.
    pub dropped: u64,
    /// Accepted jobs that panicked.
    pub panicked: u64,
}

/// Runs jobs concurrently on a runtime's blocking pool with a bound on
/// how many may be in flight.
///
/// Cloning is cheap; clones share the bound and the counters.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use watchit_watcher::Dispatcher;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), watchit_watcher::SchedulerError> {
/// let dispatcher = Dispatcher::current(8)?;
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&ran);
///
/// assert!(dispatcher.spawn(move || flag.store(true, Ordering::SeqCst)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runtime: Handle,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    counters: Arc<DispatchCounters>,
    log: tracing::Dispatch,
}

impl Dispatcher {
    /// Creates a dispatcher running jobs on `runtime`.
    ///
    /// A `max_in_flight` of zero is raised to one. Jobs log through the
    /// caller's current `tracing` dispatcher.
    #[must_use]
    pub fn new(runtime: Handle, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            counters: Arc::default(),
            log: tracing::dispatcher::get_default(tracing::Dispatch::clone),
        }
    }

    /// Creates a dispatcher on the runtime of the calling thread.
    pub fn current(max_in_flight: usize) -> Result<Self, SchedulerError> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::new(runtime, max_in_flight))
    }

    /// Routes the logs of dispatched jobs to `log`.
    #[must_use]
    pub fn with_log_dispatch(mut self, log: tracing::Dispatch) -> Self {
        self.log = log;
        self
    }

    /// Starts `job` without waiting for it.
    ///
    /// Returns `false` if the job was dropped because `max_in_flight` jobs
    /// are already running. A panicking job is caught and logged; it never
    /// unwinds into the caller.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::dispatcher::with_default(&self.log, || {
                tracing::warn!(
                    max_in_flight = self.max_in_flight,
                    "Dispatch capacity exhausted, dropping event"
                );
            });
            return false;
        };
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let counters = Arc::clone(&self.counters);
        let log = self.log.clone();
        drop(self.runtime.spawn_blocking(move || {
            let _permit = permit;
            tracing::dispatcher::with_default(&log, || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(panic = panic_message(payload.as_ref()), "Trigger handler panicked");
                }
            });
        }));
        true
    }

    /// Returns the number of jobs currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.permits.available_permits())
    }

    /// Returns the concurrency bound.
    #[must_use]
    pub const fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_run() {
        let dispatcher = Dispatcher::current(4).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            assert!(dispatcher.spawn(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        wait_until(|| count.load(Ordering::SeqCst) == 3).await;
        assert_eq!(dispatcher.stats().dispatched, 3);
        assert_eq!(dispatcher.stats().dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_saturated_dispatcher_drops() {
        let dispatcher = Dispatcher::current(1).unwrap();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        assert!(dispatcher.spawn(move || {
            let _ = release_rx.recv();
        }));
        assert!(!dispatcher.spawn(|| {}));
        assert_eq!(dispatcher.in_flight(), 1);

        release_tx.send(()).unwrap();
        wait_until(|| dispatcher.in_flight() == 0).await;
        assert!(dispatcher.spawn(|| {}));

        let stats = dispatcher.stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_is_contained() {
        let dispatcher = Dispatcher::current(2).unwrap();
        assert!(dispatcher.spawn(|| panic!("handler failed")));

        wait_until(|| dispatcher.stats().panicked == 1).await;
        wait_until(|| dispatcher.in_flight() == 0).await;
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(matches!(Dispatcher::current(1), Err(SchedulerError::NoRuntime)));
    }

    #[test]
    fn test_zero_bound_raised_to_one() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dispatcher = Dispatcher::new(runtime.handle().clone(), 0);
        assert_eq!(dispatcher.max_in_flight(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
