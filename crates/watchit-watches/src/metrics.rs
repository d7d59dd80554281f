//! Derived-metric math layered over raw kernel counters.
//!
//! Every function returns `None` rather than a NaN, infinite, or negative
//! result when its inputs cannot produce a meaningful value.

/// Computes the lifetime CPU usage ratio of a process.
///
/// ```text
/// elapsed = uptime - start_ticks / ticks_per_sec
/// ratio   = (total_ticks / ticks_per_sec) / elapsed
/// ```
///
/// Returns `None` if `ticks_per_sec` is zero or the elapsed time is not
/// positive.
///
/// # Examples
///
/// ```
/// use watchit_watches::metrics::cpu_usage_ratio;
///
/// let ratio = cpu_usage_ratio(150, 500, 100, 20.0).unwrap();
/// assert!((ratio - 0.1).abs() < 1e-9);
/// ```
#[must_use]
pub fn cpu_usage_ratio(
    total_ticks: u64,
    start_ticks: u64,
    ticks_per_sec: u64,
    uptime_secs: f64,
) -> Option<f64> {
    if ticks_per_sec == 0 {
        return None;
    }
    let ticks_per_sec = ticks_per_sec as f64;
    let elapsed = uptime_secs - start_ticks as f64 / ticks_per_sec;
    if elapsed.is_nan() || elapsed <= 0.0 {
        return None;
    }
    let ratio = (total_ticks as f64 / ticks_per_sec) / elapsed;
    ratio.is_finite().then_some(ratio)
}

/// Converts a resident set size in pages to bytes, saturating on overflow.
#[must_use]
pub const fn memory_bytes(rss_pages: u64, page_size: u64) -> u64 {
    rss_pages.saturating_mul(page_size)
}

/// Computes a per-second rate between two counter samples.
///
/// A counter that went backwards (e.g. after a wrap) yields a rate of zero.
/// Returns `None` if `elapsed_secs` is zero.
///
/// # Examples
///
/// ```
/// use watchit_watches::metrics::io_rate;
///
/// assert_eq!(io_rate(1000, 3000, 2), Some(1000.0));
/// assert_eq!(io_rate(1000, 3000, 0), None);
/// ```
#[must_use]
pub fn io_rate(previous: u64, current: u64, elapsed_secs: u64) -> Option<f64> {
    if elapsed_secs == 0 {
        return None;
    }
    Some(current.saturating_sub(previous) as f64 / elapsed_secs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_ratio_example() {
        // utime=100 stime=50, 100 ticks/s, uptime 20s, started at tick 500
        let ratio = cpu_usage_ratio(150, 500, 100, 20.0).unwrap();
        assert!((ratio - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_cpu_ratio_zero_elapsed() {
        assert_eq!(cpu_usage_ratio(150, 2000, 100, 20.0), None);
    }

    #[test]
    fn test_cpu_ratio_negative_elapsed() {
        assert_eq!(cpu_usage_ratio(150, 5000, 100, 20.0), None);
    }

    #[test]
    fn test_cpu_ratio_zero_ticks() {
        assert_eq!(cpu_usage_ratio(150, 500, 0, 20.0), None);
    }

    #[test]
    fn test_cpu_ratio_nan_uptime() {
        assert_eq!(cpu_usage_ratio(150, 500, 100, f64::NAN), None);
    }

    #[test]
    fn test_memory_bytes() {
        assert_eq!(memory_bytes(250, 4096), 1_024_000);
        assert_eq!(memory_bytes(u64::MAX, 4096), u64::MAX);
    }

    #[test]
    fn test_io_rate() {
        assert_eq!(io_rate(1000, 3000, 2), Some(1000.0));
        assert_eq!(io_rate(3000, 1000, 2), Some(0.0));
    }
}
