//! Error types for the watchit-watches crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while constructing or sampling a watch.

use camino::Utf8PathBuf;

/// Errors that can occur while constructing or sampling a watch.
///
/// Constructors return these errors to signal that a watch is unusable.
/// Inside [`Watch::observe`](crate::Watch::observe) the same errors are
/// logged and mapped to "nothing to report".
///
/// # Error Recovery Strategy
///
/// - **I/O errors** ([`WatchError::Io`]): Transient - the target may reappear
/// - **HTTP errors** ([`WatchError::Http`]): Transient - the server may recover
/// - **Missing header** ([`WatchError::MissingHeader`]): Transient
/// - **Invalid timestamp** ([`WatchError::InvalidTimestamp`]): Transient
/// - **Malformed record** ([`WatchError::MalformedRecord`]): Transient
/// - **Sysconf** ([`WatchError::Sysconf`]): Fatal - the platform constant is unavailable
///
/// # Examples
///
/// ```
/// use watchit_watches::WatchError;
///
/// let err = WatchError::sysconf_unavailable("clock ticks per second");
/// assert!(err.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A file or kernel record could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The HEAD request to a URL failed.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The response carried no usable header of the given name.
    #[error("no {header} header in response from {url}")]
    MissingHeader {
        /// The requested URL.
        url: String,
        /// The header that was expected.
        header: &'static str,
    },

    /// A timestamp header could not be parsed.
    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        /// The raw header value.
        value: String,
        /// The underlying parse error.
        #[source]
        source: chrono::ParseError,
    },

    /// A kernel record did not have the expected shape.
    #[error("malformed record {path}: {reason}")]
    MalformedRecord {
        /// The record path.
        path: Utf8PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A platform configuration value could not be determined.
    #[error("cannot determine {name} from sysconf")]
    Sysconf {
        /// Human readable name of the queried value.
        name: &'static str,
    },
}

impl WatchError {
    /// Creates a new [`WatchError::Io`] error.
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`WatchError::MalformedRecord`] error.
    pub fn malformed(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`WatchError::Sysconf`] error.
    #[inline]
    pub const fn sysconf_unavailable(name: &'static str) -> Self {
        Self::Sysconf { name }
    }

    /// Returns `true` if a later attempt may succeed.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Sysconf { .. })
    }

    /// Returns `true` if the error makes the watch permanently unusable.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Io { path, .. } | Self::MalformedRecord { path, .. } => Some(path),
            Self::Http { .. }
            | Self::MissingHeader { .. }
            | Self::InvalidTimestamp { .. }
            | Self::Sysconf { .. } => None,
        }
    }
}
