//! Observable sources for watchit.
//!
//! Every source implements [`Watch`]: a stateful, blocking `observe` that
//! compares the target against the previous observation and returns an
//! [`Event`](watchit_core::Event) only when something worth reporting
//! changed.
//!
//! # Watch Families
//!
//! | Watch                 | Target                        | Reports when                      |
//! |-----------------------|-------------------------------|-----------------------------------|
//! | [`FileModifiedWatch`] | file modification time        | the time changes                  |
//! | [`UrlModifiedWatch`]  | `Last-Modified` response header | the header changes              |
//! | [`ProcessDeathWatch`] | process descriptor directory  | the process is gone (once)        |
//! | [`ProcessStatsWatch`] | per-process stat record       | every readable sample             |
//! | [`HighCpuWatch`]      | stat record + system uptime   | CPU ratio exceeds a threshold     |
//! | [`HighMemWatch`]      | stat record + page size       | resident bytes exceed a threshold |
//! | [`ProcessIoWatch`]    | per-process I/O record        | every readable sample             |
//! | [`HighIoWatch`]       | I/O record deltas             | a byte rate exceeds a threshold   |
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌─────────────────┐
//! │ file / url watches   │     │ ProcFs (root)   │◄── process + io watches
//! └──────────┬───────────┘     └────────┬────────┘
//!            │                          │
//!            │                 ┌────────▼────────┐
//!            │                 │ metrics (pure)  │ cpu ratio, bytes, rates
//!            │                 └────────┬────────┘
//!            ▼                          ▼
//!        Option<Event>  ◄──────  Option<Event>
//! ```
//!
//! Process watches read through a [`ProcFs`] handle, so tests can point
//! them at a fixture directory instead of `/proc`.
//!
//! # Error Handling
//!
//! Construction returns [`WatchError`] when a target cannot be watched at
//! all. Once constructed, a watch never fails: transient problems are
//! logged with `tracing` and reported as "no event".

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod io;
pub mod metrics;
pub mod process;
pub mod procfs;
pub mod url;
pub mod watch;

pub use error::WatchError;
pub use file::FileModifiedWatch;
pub use io::{HighIoWatch, ProcessIoWatch};
pub use process::{HighCpuWatch, HighMemWatch, ProcessDeathWatch, ProcessStatsWatch};
pub use procfs::{IoRecord, ProcFs, StatRecord, SystemConstants};
pub use url::UrlModifiedWatch;
pub use watch::Watch;
