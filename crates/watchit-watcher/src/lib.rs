//! Polling, dispatch and Watchfile loading for watchit.
//!
//! This crate turns a set of [`Watch`](watchit_watches::Watch)es into a
//! running observe-and-react loop:
//!
//! - [`Scheduler`] polls its watches at a fixed interval on the Tokio
//!   blocking pool and hands every event to a [`Trigger`]
//! - [`Dispatcher`] runs trigger handlers fire-and-forget, with a bound on
//!   how many may run at once
//! - [`FnTrigger`] and [`BroadcastTrigger`] adapt a callback or fan one
//!   event out to many triggers
//! - [`Watchfile`] parses the declarative `WATCH` / `TELL` / `PROPERTY`
//!   format into buildable specs
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────┐  Arc<Event>  ┌──────────────────┐
//! │ Scheduler loop (blocking)  │ ───────────► │ Trigger          │
//! │  observe → dispatch → wait │              │  FnTrigger       │
//! └─────────────┬──────────────┘              │  BroadcastTrigger│
//!               │ CancellationToken           └────────┬─────────┘
//!               ▼                                      │ spawn(job)
//!        WatchHandle / Canceller              ┌────────▼─────────┐
//!                                             │ Dispatcher       │
//!                                             │ (Semaphore-bound │
//!                                             │  blocking jobs)  │
//!                                             └──────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! watchit-cli ──► watchit-watcher ──► watchit-watches ──► watchit-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use watchit_watcher::{Dispatcher, ReportTarget, Scheduler};
//! use watchit_watches::ProcessDeathWatch;
//!
//! # async fn example() -> Result<(), watchit_watcher::SchedulerError> {
//! let trigger = ReportTarget::Stdout.trigger(Dispatcher::current(64)?);
//!
//! let handle = Scheduler::new(Duration::from_secs(1))
//!     .with_watch(ProcessDeathWatch::new(4242).stop_on_death())
//!     .watch(trigger)?;
//!
//! // Returns once the process has exited.
//! let summary = handle.join().await?;
//! assert_eq!(summary.events, 1);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod scheduler;
pub mod trigger;
pub mod watchfile;

pub use dispatch::{DispatchStats, Dispatcher};
pub use error::{SchedulerError, WatchfileError};
pub use scheduler::{Canceller, PollSummary, Scheduler, WatchHandle};
pub use trigger::{BroadcastTrigger, FnTrigger, ReportTarget, Trigger};
pub use watchfile::{DEFAULT_WATCHFILE, TriggerSpec, WatchSpec, Watchfile};
