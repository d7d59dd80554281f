//! Error types for the watchit-watcher crate.
//!
//! [`SchedulerError`] covers starting and joining polling loops;
//! [`WatchfileError`] covers reading and parsing Watchfiles.

use camino::Utf8PathBuf;

/// Errors that can occur while running a polling loop.
///
/// # Examples
///
/// ```
/// use watchit_watcher::SchedulerError;
///
/// fn report(err: &SchedulerError) {
///     match err {
///         SchedulerError::NoRuntime => eprintln!("start the loop inside a Tokio runtime"),
///         SchedulerError::LoopPanicked(e) => eprintln!("polling loop died: {e}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// No Tokio runtime is available on the calling thread.
    #[error("no Tokio runtime available to run the polling loop")]
    NoRuntime,

    /// The polling loop task panicked or was aborted.
    #[error("polling loop terminated abnormally: {0}")]
    LoopPanicked(#[from] tokio::task::JoinError),
}

/// Errors that can occur while loading a Watchfile.
///
/// Line numbers are 1-based.
#[derive(Debug, thiserror::Error)]
pub enum WatchfileError {
    /// The Watchfile could not be read.
    #[error("failed to read watchfile {path}: {source}")]
    Read {
        /// Path of the Watchfile.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A directive is malformed.
    #[error("line {line}: {reason}")]
    Syntax {
        /// Line of the directive.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A `WATCH` target is not a valid URL.
    #[error("line {line}: invalid watch url '{url}': {reason}")]
    InvalidUrl {
        /// Line of the directive.
        line: usize,
        /// The offending URL.
        url: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// A `WATCH` target uses a scheme no watch supports.
    #[error("line {line}: unsupported watch scheme '{scheme}'")]
    UnknownScheme {
        /// Line of the directive.
        line: usize,
        /// The unsupported scheme.
        scheme: String,
    },
}

impl WatchfileError {
    /// Creates a new [`WatchfileError::Syntax`] error.
    #[inline]
    pub fn syntax(line: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            reason: reason.into(),
        }
    }

    /// Returns the line the error refers to, if any.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. }
            | Self::InvalidUrl { line, .. }
            | Self::UnknownScheme { line, .. } => Some(*line),
            Self::Read { .. } => None,
        }
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Read { path, .. } => Some(path),
            Self::Syntax { .. } | Self::InvalidUrl { .. } | Self::UnknownScheme { .. } => None,
        }
    }
}
