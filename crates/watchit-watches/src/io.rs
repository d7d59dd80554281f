//! Watches over a process's I/O counters.

use std::time::Instant;

use watchit_core::{Event, Value, keys};

use crate::error::WatchError;
use crate::metrics;
use crate::procfs::{IoRecord, ProcFs};
use crate::watch::Watch;

const READ_BYTES: &str = "read_bytes";
const WRITE_BYTES: &str = "write_bytes";

/// Samples the raw I/O record of a process.
///
/// Each `key: value` line becomes an `io.<key>` entry: an integer when the
/// value parses as one, the trimmed text otherwise. The original lines are
/// kept under `io.raw`.
#[derive(Debug, Clone)]
pub struct ProcessIoWatch {
    pid: u32,
    procfs: ProcFs,
}

impl ProcessIoWatch {
    /// Creates an I/O watch for `pid` on the default procfs.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self::with_procfs(pid, ProcFs::default())
    }

    /// Creates an I/O watch for `pid` on the given procfs.
    #[must_use]
    pub const fn with_procfs(pid: u32, procfs: ProcFs) -> Self {
        Self { pid, procfs }
    }

    /// Returns the watched pid.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Reads the current I/O record.
    pub fn sample(&self) -> Result<IoRecord, WatchError> {
        self.procfs.read_io(self.pid)
    }

    fn sample_logged(&self) -> Option<IoRecord> {
        self.sample()
            .inspect_err(|error| {
                tracing::debug!(pid = self.pid, error = %error, "Cannot sample process I/O");
            })
            .ok()
    }
}

fn io_event(record: &IoRecord) -> Event {
    let mut event = Event::new();
    for (key, value) in &record.entries {
        let value = value
            .parse::<i64>()
            .map_or_else(|_| Value::from(value.as_str()), Value::Int);
        event.insert(keys::io_key(key), value);
    }
    event.insert(keys::IO_RAW, record.lines.clone());
    event
}

impl Watch for ProcessIoWatch {
    fn observe(&mut self) -> Option<Event> {
        self.sample_logged().map(|record| io_event(&record))
    }

    fn kind(&self) -> &'static str {
        "process-io"
    }
}

#[derive(Debug, Clone, Copy)]
struct IoBaseline {
    read_bytes: u64,
    write_bytes: u64,
    at: Instant,
}

/// Reports when a process's storage read or write rate exceeds a threshold.
///
/// Rates are bytes per second over the whole seconds elapsed since the
/// previous sample. The first sample only establishes the baseline. A
/// sample taken less than a second after the previous one carries no rates
/// and is not reported, but still becomes the new baseline.
#[derive(Debug)]
pub struct HighIoWatch {
    io: ProcessIoWatch,
    threshold: f64,
    baseline: Option<IoBaseline>,
}

impl HighIoWatch {
    /// Creates a high-I/O watch for `pid` on the default procfs.
    #[must_use]
    pub fn new(pid: u32, threshold: f64) -> Self {
        Self::with_procfs(pid, threshold, ProcFs::default())
    }

    /// Creates a high-I/O watch for `pid` on the given procfs.
    #[must_use]
    pub const fn with_procfs(pid: u32, threshold: f64, procfs: ProcFs) -> Self {
        Self {
            io: ProcessIoWatch::with_procfs(pid, procfs),
            threshold,
            baseline: None,
        }
    }

    /// Returns the configured threshold in bytes per second.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Observes the process as if the current time were `now`.
    pub fn observe_at(&mut self, now: Instant) -> Option<Event> {
        let record = self.io.sample_logged()?;
        let current = IoBaseline {
            read_bytes: record.counter(READ_BYTES).unwrap_or_default(),
            write_bytes: record.counter(WRITE_BYTES).unwrap_or_default(),
            at: now,
        };
        let previous = self.baseline.replace(current)?;

        let elapsed = now.saturating_duration_since(previous.at).as_secs();
        let reads = metrics::io_rate(previous.read_bytes, current.read_bytes, elapsed)?;
        let writes = metrics::io_rate(previous.write_bytes, current.write_bytes, elapsed)?;

        let mut event = io_event(&record);
        event.insert(keys::IO_READS_PER_SEC, reads);
        event.insert(keys::IO_WRITES_PER_SEC, writes);
        tracing::trace!(pid = self.io.pid(), reads, writes, elapsed, "I/O sample");

        (reads > self.threshold || writes > self.threshold).then_some(event)
    }
}

impl Watch for HighIoWatch {
    fn observe(&mut self) -> Option<Event> {
        self.observe_at(Instant::now())
    }

    fn kind(&self) -> &'static str {
        "process-high-io"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::{Utf8Path, Utf8PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const PID: u32 = 77;

    fn io_record(read_bytes: u64, write_bytes: u64) -> String {
        format!(
            "rchar: 4096\nwchar: 2048\nsyscr: 12\nsyscw: 4\n\
             read_bytes: {read_bytes}\nwrite_bytes: {write_bytes}\n\
             cancelled_write_bytes: 0\n"
        )
    }

    fn fixture() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = Utf8Path::from_path(dir.path()).expect("Invalid path").to_owned();
        std::fs::create_dir(root.join(PID.to_string())).expect("Failed to create pid dir");
        (dir, root)
    }

    fn write_io(root: &Utf8Path, contents: &str) {
        std::fs::write(root.join(PID.to_string()).join("io"), contents)
            .expect("Failed to write io record");
    }

    #[test]
    fn test_io_entries_are_namespaced() {
        let (_dir, root) = fixture();
        write_io(&root, &io_record(1000, 500));
        let mut watch = ProcessIoWatch::with_procfs(PID, ProcFs::new(root));

        let event = watch.observe().expect("record should be sampled");
        assert_eq!(event.get_int(keys::IO_RCHAR), Some(4096));
        assert_eq!(event.get_int(keys::IO_WCHAR), Some(2048));
        assert_eq!(event.get_int(keys::IO_SYSCR), Some(12));
        assert_eq!(event.get_int(keys::IO_SYSCW), Some(4));
        assert_eq!(event.get_int(keys::IO_READ_BYTES), Some(1000));
        assert_eq!(event.get_int(keys::IO_WRITE_BYTES), Some(500));
        assert_eq!(event.get_int(keys::IO_CANCELLED_WRITE_BYTES), Some(0));
        assert_eq!(
            event
                .get(keys::IO_RAW)
                .and_then(Value::as_tokens)
                .map(<[String]>::len),
            Some(7)
        );
    }

    #[test]
    fn test_non_numeric_entry_kept_as_text() {
        let (_dir, root) = fixture();
        write_io(&root, "rchar:   lots  \n");
        let mut watch = ProcessIoWatch::with_procfs(PID, ProcFs::new(root));

        let event = watch.observe().unwrap();
        assert_eq!(event.get_str(keys::IO_RCHAR), Some("lots"));
    }

    #[test]
    fn test_missing_record_reports_nothing() {
        let (_dir, root) = fixture();
        let mut watch = ProcessIoWatch::with_procfs(PID, ProcFs::new(root));
        assert!(watch.observe().is_none());
    }

    #[test]
    fn test_read_rate() {
        let (_dir, root) = fixture();
        let mut watch = HighIoWatch::with_procfs(PID, 500.0, ProcFs::new(root.clone()));
        let t0 = Instant::now();

        write_io(&root, &io_record(1000, 0));
        assert!(watch.observe_at(t0).is_none(), "first sample is the baseline");

        write_io(&root, &io_record(3000, 0));
        let event = watch
            .observe_at(t0 + Duration::from_secs(2))
            .expect("1000 B/s > 500 B/s should be reported");
        assert_eq!(event.get_float(keys::IO_READS_PER_SEC), Some(1000.0));
        assert_eq!(event.get_float(keys::IO_WRITES_PER_SEC), Some(0.0));
    }

    #[test]
    fn test_rate_below_threshold() {
        let (_dir, root) = fixture();
        let mut watch = HighIoWatch::with_procfs(PID, 1000.0, ProcFs::new(root.clone()));
        let t0 = Instant::now();

        write_io(&root, &io_record(1000, 0));
        watch.observe_at(t0);
        write_io(&root, &io_record(3000, 0));
        assert!(watch.observe_at(t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn test_write_rate_alone_exceeds() {
        let (_dir, root) = fixture();
        let mut watch = HighIoWatch::with_procfs(PID, 10.0, ProcFs::new(root.clone()));
        let t0 = Instant::now();

        write_io(&root, &io_record(0, 0));
        watch.observe_at(t0);
        write_io(&root, &io_record(0, 100));
        let event = watch.observe_at(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(event.get_float(keys::IO_WRITES_PER_SEC), Some(100.0));
    }

    #[test]
    fn test_sub_second_sample_moves_baseline() {
        let (_dir, root) = fixture();
        let mut watch = HighIoWatch::with_procfs(PID, 0.0, ProcFs::new(root.clone()));
        let t0 = Instant::now();

        write_io(&root, &io_record(1000, 0));
        watch.observe_at(t0);

        write_io(&root, &io_record(5000, 0));
        assert!(watch.observe_at(t0 + Duration::from_millis(500)).is_none());

        // Rate is measured against the sub-second sample, not the first one.
        write_io(&root, &io_record(6000, 0));
        let event = watch.observe_at(t0 + Duration::from_millis(1500)).unwrap();
        assert_eq!(event.get_float(keys::IO_READS_PER_SEC), Some(1000.0));
    }
}
