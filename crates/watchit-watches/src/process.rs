//! Watches over a single process: death, raw stats, CPU and memory.
//!
//! ```text
//! ProcessStatsWatch ──► <pid>/stat ──► stats.* event
//!        ▲
//!        ├── HighCpuWatch  (+ uptime, CLK_TCK)  ──► stats.cpu
//!        └── HighMemWatch  (+ page size)        ──► stats.mem
//! ```

use chrono::Utc;
use watchit_core::{Event, EventStatus, Value, keys};

use crate::error::WatchError;
use crate::metrics;
use crate::procfs::{ProcFs, StatRecord, SystemConstants};
use crate::watch::Watch;

/// Converts a kernel counter to an event value.
fn counter(value: u64) -> Value {
    Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Reports when a process no longer exists.
///
/// Existence is the presence of the process's descriptor directory. The
/// watch fires exactly once, with an empty event, the first time the
/// descriptor is gone; every later observation reports nothing.
#[derive(Debug)]
pub struct ProcessDeathWatch {
    pid: u32,
    procfs: ProcFs,
    reported: bool,
    stop_on_death: bool,
}

impl ProcessDeathWatch {
    /// Creates a death watch for `pid` on the default procfs.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self::with_procfs(pid, ProcFs::default())
    }

    /// Creates a death watch for `pid` on the given procfs.
    #[must_use]
    pub const fn with_procfs(pid: u32, procfs: ProcFs) -> Self {
        Self {
            pid,
            procfs,
            reported: false,
            stop_on_death: false,
        }
    }

    /// Marks the death event with the stop flag, so the polling loop that
    /// dispatches it halts afterwards.
    #[must_use]
    pub const fn stop_on_death(mut self) -> Self {
        self.stop_on_death = true;
        self
    }

    /// Returns the watched pid.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }
}

impl Watch for ProcessDeathWatch {
    fn observe(&mut self) -> Option<Event> {
        if self.reported || self.procfs.process_exists(self.pid) {
            return None;
        }
        self.reported = true;
        tracing::info!(pid = self.pid, "Process has exited");

        let status = if self.stop_on_death {
            EventStatus::stop(0)
        } else {
            EventStatus::CONTINUE
        };
        Some(Event::new().with_status(status))
    }

    fn kind(&self) -> &'static str {
        "process-death"
    }
}

/// Samples the raw stat record of a process.
///
/// Every successful observation produces an event with `stats.raw`,
/// `stats.timestamp` and the fixed-index counters. An unreadable record
/// (usually a process that has exited) reports nothing.
#[derive(Debug, Clone)]
pub struct ProcessStatsWatch {
    pid: u32,
    procfs: ProcFs,
}

impl ProcessStatsWatch {
    /// Creates a stats watch for `pid` on the default procfs.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self::with_procfs(pid, ProcFs::default())
    }

    /// Creates a stats watch for `pid` on the given procfs.
    #[must_use]
    pub const fn with_procfs(pid: u32, procfs: ProcFs) -> Self {
        Self { pid, procfs }
    }

    /// Returns the watched pid.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the procfs this watch reads from.
    #[must_use]
    pub const fn procfs(&self) -> &ProcFs {
        &self.procfs
    }

    /// Reads the current stat record.
    pub fn sample(&self) -> Result<StatRecord, WatchError> {
        self.procfs.read_stat(self.pid)
    }

    fn sample_logged(&self) -> Option<StatRecord> {
        self.sample()
            .inspect_err(|error| {
                tracing::debug!(pid = self.pid, error = %error, "Cannot sample process stats");
            })
            .ok()
    }
}

/// Builds the raw stats event for a record.
fn stats_event(record: &StatRecord) -> Event {
    let mut event = Event::new();
    event.insert(keys::STATS_RAW, record.tokens.clone());
    event.insert(keys::STATS_TIMESTAMP, Utc::now());
    event.insert(keys::STATS_PROC_TIME, counter(record.utime));
    event.insert(keys::STATS_KERN_TIME, counter(record.stime));
    event.insert(keys::STATS_PROC_WAIT_TIME, counter(record.cutime));
    event.insert(keys::STATS_KERN_WAIT_TIME, counter(record.cstime));
    event.insert(keys::STATS_PROC_START_TIME, counter(record.start_time));
    event.insert(keys::STATS_PROC_RSS, counter(record.rss));
    event
}

impl Watch for ProcessStatsWatch {
    fn observe(&mut self) -> Option<Event> {
        self.sample_logged().map(|record| stats_event(&record))
    }

    fn kind(&self) -> &'static str {
        "process-stats"
    }
}

/// Reports when a process's lifetime CPU usage exceeds a ratio.
///
/// The ratio is CPU seconds consumed (including waited-for children)
/// divided by seconds since the process started; 1.0 is one full core.
/// Every sample carries `stats.cpu`, but only samples above the threshold
/// are reported.
#[derive(Debug)]
pub struct HighCpuWatch {
    stats: ProcessStatsWatch,
    threshold: f64,
    start_ticks: u64,
    clock_ticks_per_sec: u64,
}

impl HighCpuWatch {
    /// Creates a CPU watch for `pid` on the live system.
    ///
    /// # Errors
    ///
    /// Fails if the clock tick rate cannot be determined or the process
    /// cannot be sampled.
    pub fn new(pid: u32, threshold: f64) -> Result<Self, WatchError> {
        Self::with_system(pid, threshold, ProcFs::default(), SystemConstants::query()?)
    }

    /// Creates a CPU watch reading from `procfs` with explicit constants.
    pub fn with_system(
        pid: u32,
        threshold: f64,
        procfs: ProcFs,
        constants: SystemConstants,
    ) -> Result<Self, WatchError> {
        if constants.clock_ticks_per_sec == 0 {
            return Err(WatchError::sysconf_unavailable("clock ticks per second"));
        }
        let stats = ProcessStatsWatch::with_procfs(pid, procfs);
        let start_ticks = stats.sample()?.start_time;

        Ok(Self {
            stats,
            threshold,
            start_ticks,
            clock_ticks_per_sec: constants.clock_ticks_per_sec,
        })
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Watch for HighCpuWatch {
    fn observe(&mut self) -> Option<Event> {
        let record = self.stats.sample_logged()?;
        let uptime = match self.stats.procfs().uptime_secs() {
            Ok(uptime) => uptime,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot read system uptime");
                return None;
            }
        };

        let Some(ratio) = metrics::cpu_usage_ratio(
            record.total_ticks(),
            self.start_ticks,
            self.clock_ticks_per_sec,
            uptime,
        ) else {
            tracing::debug!(
                pid = self.stats.pid(),
                uptime,
                start_ticks = self.start_ticks,
                "No elapsed time since process start, skipping CPU sample"
            );
            return None;
        };

        let mut event = stats_event(&record);
        event.insert(keys::STATS_CPU, ratio);
        tracing::trace!(pid = self.stats.pid(), ratio, threshold = self.threshold, "CPU sample");

        (ratio > self.threshold).then_some(event)
    }

    fn kind(&self) -> &'static str {
        "process-high-cpu"
    }
}

/// Reports when a process's resident memory exceeds a number of bytes.
///
/// Every sample carries `stats.mem`, but only samples above the threshold
/// are reported.
#[derive(Debug)]
pub struct HighMemWatch {
    stats: ProcessStatsWatch,
    threshold: u64,
    page_size: u64,
}

impl HighMemWatch {
    /// Creates a memory watch for `pid` on the live system.
    ///
    /// # Errors
    ///
    /// Fails if the page size cannot be determined.
    pub fn new(pid: u32, threshold: u64) -> Result<Self, WatchError> {
        Self::with_system(pid, threshold, ProcFs::default(), SystemConstants::query()?)
    }

    /// Creates a memory watch reading from `procfs` with explicit constants.
    pub fn with_system(
        pid: u32,
        threshold: u64,
        procfs: ProcFs,
        constants: SystemConstants,
    ) -> Result<Self, WatchError> {
        if constants.page_size == 0 {
            return Err(WatchError::sysconf_unavailable("page size"));
        }
        Ok(Self {
            stats: ProcessStatsWatch::with_procfs(pid, procfs),
            threshold,
            page_size: constants.page_size,
        })
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl Watch for HighMemWatch {
    fn observe(&mut self) -> Option<Event> {
        let record = self.stats.sample_logged()?;
        let bytes = metrics::memory_bytes(record.rss, self.page_size);

        let mut event = stats_event(&record);
        event.insert(keys::STATS_MEM, counter(bytes));

        (bytes > self.threshold).then_some(event)
    }

    fn kind(&self) -> &'static str {
        "process-high-memory"
    }
}
