//! The polling loop.
//!
//! A [`Scheduler`] owns a set of watches and, once started with
//! [`Scheduler::watch`], observes every one of them each cycle and hands
//! any events to a trigger. Observations block, so the loop lives on the
//! Tokio blocking pool and only re-enters the runtime to wait between
//! cycles.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Blocking Thread (spawn_blocking)             │
//! │                                                              │
//! │   ┌──► observe every watch ──► trigger.on_event(Arc<Event>)  │
//! │   │                                   │                      │
//! │   │                           cancelled? ──yes──► exit       │
//! │   │                                   │ no                   │
//! │   └──── sleep(interval) ◄── select ───┴── token.cancelled()  │
//! └──────────────────────────────────────────────────────────────┘
//!                           ▲
//!              Canceller::cancel (any thread, any number of times)
//! ```
//!
//! # Lifecycle
//!
//! 1. **Idle**: build a `Scheduler` and register watches.
//! 2. **Polling**: `watch(trigger)` consumes the scheduler, so one
//!    scheduler runs at most one loop and no watch is shared between loops.
//! 3. **Cancelled**: a cancel request, a dropped [`WatchHandle`], or an event
//!    whose status asks to stop ends the loop. A stop event also skips the
//!    watches after it in the same cycle. Cancellation is cooperative:
//!    it is checked after each cycle's dispatch and wakes the inter-cycle
//!    wait, but never interrupts an in-flight observation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use watchit_core::SchedulerConfig;
use watchit_watches::Watch;

use crate::error::SchedulerError;
use crate::trigger::{Trigger, deliver};

/// Totals of a finished polling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    /// Completed observation cycles.
    pub cycles: u64,
    /// Events handed to the trigger.
    pub events: u64,
}

/// A set of watches polled at a fixed interval.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use watchit_watcher::{Dispatcher, FnTrigger, Scheduler};
/// use watchit_watches::FileModifiedWatch;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let watch = tokio::task::spawn_blocking(|| FileModifiedWatch::new("/etc/hosts")).await??;
/// let trigger = FnTrigger::new(Dispatcher::current(16)?, |event: &watchit_core::Event| {
///     println!("changed: {:?}", event.keys());
/// });
///
/// let handle = Scheduler::new(Duration::from_secs(1))
///     .with_watch(watch)
///     .watch(trigger)?;
///
/// tokio::time::sleep(Duration::from_secs(10)).await;
/// let summary = handle.shutdown().await?;
/// println!("{} cycles", summary.cycles);
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    watches: Vec<Box<dyn Watch>>,
    interval: Duration,
    log: tracing::Dispatch,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("watches", &self.watches)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates an idle scheduler with no watches.
    ///
    /// The loop will log through the caller's current `tracing`
    /// dispatcher unless [`with_log_dispatch`](Self::with_log_dispatch)
    /// overrides it.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            watches: Vec::new(),
            interval,
            log: tracing::dispatcher::get_default(tracing::Dispatch::clone),
        }
    }

    /// Creates an idle scheduler using the configured interval.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(Duration::from_secs(config.interval_secs))
    }

    /// Routes the loop's logs to `log`.
    #[must_use]
    pub fn with_log_dispatch(mut self, log: tracing::Dispatch) -> Self {
        self.log = log;
        self
    }

    /// Adds a watch, builder style.
    #[must_use]
    pub fn with_watch(mut self, watch: impl Watch) -> Self {
        self.add_watch(watch);
        self
    }

    /// Adds a watch.
    pub fn add_watch(&mut self, watch: impl Watch) {
        self.watches.push(Box::new(watch));
    }

    /// Returns the number of registered watches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Returns `true` if no watches are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Returns the polling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts polling, dispatching every event to `trigger`.
    ///
    /// A scheduler with no watches still runs, idles, and never fires.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] if called outside a Tokio
    /// runtime.
    pub fn watch<T: Trigger>(self, trigger: T) -> Result<WatchHandle, SchedulerError> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let token = CancellationToken::new();

        let loop_token = token.clone();
        let loop_runtime = runtime.clone();
        let task = runtime.spawn_blocking(move || self.run(&loop_runtime, &loop_token, &trigger));

        Ok(WatchHandle {
            token,
            task: Some(task),
        })
    }

    fn run(mut self, runtime: &Handle, token: &CancellationToken, trigger: &dyn Trigger) -> PollSummary {
        let log = self.log.clone();
        tracing::dispatcher::with_default(&log, || self.poll(runtime, token, trigger))
    }

    fn poll(&mut self, runtime: &Handle, token: &CancellationToken, trigger: &dyn Trigger) -> PollSummary {
        tracing::info!(
            watches = self.watches.len(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Polling loop started"
        );

        let mut summary = PollSummary::default();
        loop {
            summary.events += self.cycle(token, trigger);
            summary.cycles += 1;

            if token.is_cancelled() || wait(runtime, token, self.interval) {
                break;
            }
        }

        tracing::info!(cycles = summary.cycles, events = summary.events, "Polling loop stopped");
        summary
    }

    /// Observes every watch once and dispatches the results.
    fn cycle(&mut self, token: &CancellationToken, trigger: &dyn Trigger) -> u64 {
        let mut events = 0;
        for watch in &mut self.watches {
            let Some(event) = watch.observe() else {
                continue;
            };
            events += 1;

            let stop = event.should_stop();
            tracing::debug!(
                watch = watch.kind(),
                fields = event.len(),
                code = event.code(),
                stop,
                "Dispatching event"
            );
            deliver(trigger, Arc::new(event));

            if stop {
                tracing::info!(watch = watch.kind(), "Watch requested stop");
                token.cancel();
                break;
            }
        }
        events
    }
}

/// Waits for the interval to elapse or for cancellation, returning `true`
/// if cancelled.
fn wait(runtime: &Handle, token: &CancellationToken, interval: Duration) -> bool {
    runtime.block_on(async {
        tokio::select! {
            () = token.cancelled() => true,
            () = tokio::time::sleep(interval) => false,
        }
    })
}

/// A cloneable, idempotent cancel switch for a polling loop.
///
/// Cancelling never blocks, and may be repeated or issued after the loop
/// has already exited.
#[derive(Debug, Clone)]
pub struct Canceller(CancellationToken);

impl Canceller {
    /// Requests the loop to stop.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Returns `true` if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Handle to a running polling loop.
///
/// Dropping the handle cancels the loop without waiting for it.
#[derive(Debug)]
pub struct WatchHandle {
    token: CancellationToken,
    task: Option<JoinHandle<PollSummary>>,
}

impl WatchHandle {
    /// Returns a cancel switch that can outlive this handle.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller(self.token.clone())
    }

    /// Requests the loop to stop. Idempotent and non-blocking.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the loop has not exited yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for the loop to exit on its own (cancellation or a stop event).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::LoopPanicked`] if the loop did not finish
    /// normally.
    pub async fn join(mut self) -> Result<PollSummary, SchedulerError> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Ok(PollSummary::default()),
        }
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn shutdown(self) -> Result<PollSummary, SchedulerError> {
        self.cancel();
        self.join().await
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
