//! Readers for the kernel process filesystem and platform constants.
//!
//! Records consumed, relative to the procfs root:
//!
//! - `<pid>/stat`: whitespace-separated tokens, read by fixed index
//! - `<pid>/io`: `key: value` lines
//! - `uptime`: space-separated, field 0 is seconds since boot
//!
//! The root defaults to `/proc` and can point at a fixture directory, which
//! is how the process watches are tested without live processes.

use camino::{Utf8Path, Utf8PathBuf};
use nix::unistd::{SysconfVar, sysconf};
use watchit_core::ProcFsConfig;

use crate::error::WatchError;

/// Index of user-mode time in the stat record.
const STAT_UTIME: usize = 13;
/// Index of kernel-mode time in the stat record.
const STAT_STIME: usize = 14;
/// Index of children's user-mode time in the stat record.
const STAT_CUTIME: usize = 15;
/// Index of children's kernel-mode time in the stat record.
const STAT_CSTIME: usize = 16;
/// Index of the start time (ticks after boot) in the stat record.
const STAT_STARTTIME: usize = 21;
/// Index of the resident set size (pages) in the stat record.
const STAT_RSS: usize = 23;

/// Handle to a process filesystem mount.
///
/// # Examples
///
/// ```
/// use watchit_watches::ProcFs;
///
/// let procfs = ProcFs::default();
/// assert_eq!(procfs.process_dir(42).as_str(), "/proc/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: Utf8PathBuf,
}

impl ProcFs {
    /// Creates a handle rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a handle from configuration.
    #[must_use]
    pub fn from_config(config: &ProcFsConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Returns the mount point.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the descriptor directory of a process.
    #[must_use]
    pub fn process_dir(&self, pid: u32) -> Utf8PathBuf {
        self.root.join(pid.to_string())
    }

    /// Returns `true` while the process descriptor exists.
    #[must_use]
    pub fn process_exists(&self, pid: u32) -> bool {
        self.process_dir(pid).exists()
    }

    /// Reads and parses the stat record of a process.
    pub fn read_stat(&self, pid: u32) -> Result<StatRecord, WatchError> {
        let path = self.process_dir(pid).join("stat");
        let contents = read(&path)?;
        StatRecord::parse(&contents).map_err(|reason| WatchError::malformed(path, reason))
    }

    /// Reads and parses the I/O counters record of a process.
    pub fn read_io(&self, pid: u32) -> Result<IoRecord, WatchError> {
        let path = self.process_dir(pid).join("io");
        Ok(IoRecord::parse(&read(&path)?))
    }

    /// Reads the system uptime in seconds.
    pub fn uptime_secs(&self) -> Result<f64, WatchError> {
        let path = self.root.join("uptime");
        let contents = read(&path)?;
        parse_uptime(&contents)
            .ok_or_else(|| WatchError::malformed(path, "field 0 is not a number"))
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::from_config(&ProcFsConfig::default())
    }
}

fn read(path: &Utf8Path) -> Result<String, WatchError> {
    std::fs::read_to_string(path).map_err(|source| WatchError::io(path, source))
}

/// A parsed per-process stat record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    /// Every token of the record, in order.
    pub tokens: Vec<String>,
    /// User-mode CPU time in clock ticks.
    pub utime: u64,
    /// Kernel-mode CPU time in clock ticks.
    pub stime: u64,
    /// Children's user-mode CPU time in clock ticks.
    pub cutime: u64,
    /// Children's kernel-mode CPU time in clock ticks.
    pub cstime: u64,
    /// Start time in clock ticks after boot.
    pub start_time: u64,
    /// Resident set size in pages.
    pub rss: u64,
}

impl StatRecord {
    /// Parses a stat record, extracting fields by fixed index.
    ///
    /// The record is split on whitespace with no special handling of the
    /// command name, so a command containing spaces shifts every index.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let tokens: Vec<String> = contents.split_whitespace().map(str::to_owned).collect();
        if tokens.len() <= STAT_RSS {
            return Err(format!(
                "expected at least {} fields, found {}",
                STAT_RSS + 1,
                tokens.len()
            ));
        }

        let field = |index: usize| -> Result<u64, String> {
            tokens[index]
                .parse()
                .map_err(|_| format!("field {index} is not a counter: '{}'", tokens[index]))
        };

        Ok(Self {
            utime: field(STAT_UTIME)?,
            stime: field(STAT_STIME)?,
            cutime: field(STAT_CUTIME)?,
            cstime: field(STAT_CSTIME)?,
            start_time: field(STAT_STARTTIME)?,
            rss: field(STAT_RSS)?,
            tokens,
        })
    }

    /// Total CPU time of the process and its waited-for children, in ticks.
    #[must_use]
    pub const fn total_ticks(&self) -> u64 {
        self.utime
            .saturating_add(self.stime)
            .saturating_add(self.cutime)
            .saturating_add(self.cstime)
    }
}

/// A parsed per-process I/O counters record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoRecord {
    /// The non-empty lines of the record.
    pub lines: Vec<String>,
    /// `(key, value)` pairs with surrounding whitespace trimmed.
    pub entries: Vec<(String, String)>,
}

impl IoRecord {
    /// Parses `key: value` lines. Lines without a colon are kept in
    /// [`lines`](Self::lines) but produce no entry.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut record = Self::default();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            if let Some((key, value)) = line.split_once(':') {
                record
                    .entries
                    .push((key.trim().to_owned(), value.trim().to_owned()));
            }
            record.lines.push(line.to_owned());
        }
        record
    }

    /// Returns the value of an entry parsed as a counter.
    #[must_use]
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
    }
}

/// Parses the contents of the uptime record.
#[must_use]
pub fn parse_uptime(contents: &str) -> Option<f64> {
    contents.trim().split(' ').next()?.parse().ok()
}

/// Platform constants needed by the derived-metric watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConstants {
    /// Clock ticks per second (`CLK_TCK`).
    pub clock_ticks_per_sec: u64,
    /// Page size in bytes.
    pub page_size: u64,
}

impl SystemConstants {
    /// Queries both constants from the platform.
    pub fn query() -> Result<Self, WatchError> {
        Ok(Self {
            clock_ticks_per_sec: clock_ticks_per_sec()
                .ok_or(WatchError::sysconf_unavailable("clock ticks per second"))?,
            page_size: page_size().ok_or(WatchError::sysconf_unavailable("page size"))?,
        })
    }
}

/// Returns the number of clock ticks per second, or `None` if unavailable.
#[must_use]
pub fn clock_ticks_per_sec() -> Option<u64> {
    query_sysconf(SysconfVar::CLK_TCK)
}

/// Returns the page size in bytes, or `None` if unavailable.
#[must_use]
pub fn page_size() -> Option<u64> {
    query_sysconf(SysconfVar::PAGE_SIZE)
}

fn query_sysconf(var: SysconfVar) -> Option<u64> {
    match sysconf(var) {
        Ok(Some(value)) => u64::try_from(value).ok().filter(|v| *v > 0),
        Ok(None) => None,
        Err(errno) => {
            tracing::debug!(?var, error = %errno, "sysconf query failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT_STAT: &str = "1 (systemd) S 0 1 1 0 -1 4194560 48794 1838395 98 1279 \
        100 50 0 0 20 0 1 0 500 171782144 250 18446744073709551615 1 1 0 0 0 0 \
        671173123 4096 1260 0 0 0 17 3 0 0 0 0 0 0 0 0 0 0 0 0 0\n";

    #[test]
    fn test_stat_fixed_indices() {
        let record = StatRecord::parse(INIT_STAT).unwrap();
        assert_eq!(record.utime, 100);
        assert_eq!(record.stime, 50);
        assert_eq!(record.cutime, 0);
        assert_eq!(record.cstime, 0);
        assert_eq!(record.start_time, 500);
        assert_eq!(record.rss, 250);
        assert_eq!(record.total_ticks(), 150);
        assert_eq!(record.tokens[1], "(systemd)");
    }

    #[test]
    fn test_stat_too_short() {
        let err = StatRecord::parse("1 (sh) S 0").unwrap_err();
        assert!(err.contains("found 4"));
    }

    #[test]
    fn test_stat_non_numeric_field() {
        let contents = INIT_STAT.replacen(" 100 50 ", " x 50 ", 1);
        let err = StatRecord::parse(&contents).unwrap_err();
        assert!(err.contains("field 13"));
    }

    #[test]
    fn test_io_record_parse() {
        let record = IoRecord::parse("rchar: 323934931\nwchar:   323929600 \n\nread_bytes: 1000\n");
        assert_eq!(record.lines.len(), 3);
        assert_eq!(record.entries[1], ("wchar".to_owned(), "323929600".to_owned()));
        assert_eq!(record.counter("read_bytes"), Some(1000));
        assert_eq!(record.counter("write_bytes"), None);
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("20.00 35.12\n"), Some(20.0));
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("abc 1"), None);
    }

    #[test]
    fn test_fixture_procfs() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::create_dir(root.join("7")).unwrap();
        std::fs::write(root.join("7/stat"), INIT_STAT).unwrap();
        std::fs::write(root.join("uptime"), "20.0 10.0\n").unwrap();

        let procfs = ProcFs::new(root);
        assert!(procfs.process_exists(7));
        assert!(!procfs.process_exists(8));
        assert_eq!(procfs.read_stat(7).unwrap().rss, 250);
        assert!((procfs.uptime_secs().unwrap() - 20.0).abs() < f64::EPSILON);
        assert!(matches!(procfs.read_io(7), Err(WatchError::Io { .. })));
    }

    #[test]
    fn test_live_system_constants() {
        let constants = SystemConstants::query().unwrap();
        assert!(constants.clock_ticks_per_sec > 0);
        assert!(constants.page_size >= 1024);
    }
}
