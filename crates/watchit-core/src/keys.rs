//! Event data keys.
//!
//! Keys are namespaced by a dot-separated prefix naming the watch family
//! that produces them. They form a stable contract with trigger handlers.

/// Path of a modified file.
pub const FILE_NAME: &str = "file.name";
/// New modification time of a file.
pub const FILE_MOD_TIME: &str = "file.modifiedtime";

/// New `Last-Modified` time of a URL.
pub const URL_MOD_TIME: &str = "url.modifiedtime";

/// Whitespace-separated tokens of the per-process stat record.
pub const STATS_RAW: &str = "stats.raw";
/// Time the stat record was sampled.
pub const STATS_TIMESTAMP: &str = "stats.timestamp";
/// User-mode CPU time in clock ticks.
pub const STATS_PROC_TIME: &str = "stats.proctime";
/// Kernel-mode CPU time in clock ticks.
pub const STATS_KERN_TIME: &str = "stats.kerntime";
/// User-mode CPU time of waited-for children in clock ticks.
pub const STATS_PROC_WAIT_TIME: &str = "stats.procwaittime";
/// Kernel-mode CPU time of waited-for children in clock ticks.
pub const STATS_KERN_WAIT_TIME: &str = "stats.kernwaittime";
/// Process start time in clock ticks after boot.
pub const STATS_PROC_START_TIME: &str = "stats.procstarttime";
/// Resident set size in pages.
pub const STATS_PROC_RSS: &str = "stats.procrss";
/// Derived CPU usage ratio.
pub const STATS_CPU: &str = "stats.cpu";
/// Derived resident memory in bytes.
pub const STATS_MEM: &str = "stats.mem";

/// Lines of the per-process I/O record.
pub const IO_RAW: &str = "io.raw";
/// Characters read.
pub const IO_RCHAR: &str = "io.rchar";
/// Characters written.
pub const IO_WCHAR: &str = "io.wchar";
/// Read syscalls.
pub const IO_SYSCR: &str = "io.syscr";
/// Write syscalls.
pub const IO_SYSCW: &str = "io.syscw";
/// Bytes fetched from the storage layer.
pub const IO_READ_BYTES: &str = "io.read_bytes";
/// Bytes sent to the storage layer.
pub const IO_WRITE_BYTES: &str = "io.write_bytes";
/// Written bytes later truncated away.
pub const IO_CANCELLED_WRITE_BYTES: &str = "io.cancelled_write_bytes";
/// Derived read rate in bytes per second.
pub const IO_READS_PER_SEC: &str = "io.reads_per_sec";
/// Derived write rate in bytes per second.
pub const IO_WRITES_PER_SEC: &str = "io.writes_per_sec";

/// Prefix applied to every entry of the per-process I/O record.
pub const IO_PREFIX: &str = "io.";

/// Builds the namespaced key for an I/O record entry, e.g. `rchar` -> `io.rchar`.
#[must_use]
pub fn io_key(name: &str) -> String {
    format!("{IO_PREFIX}{name}")
}
