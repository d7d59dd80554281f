//! Watch for file modification.

use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use watchit_core::{Event, keys};

use crate::error::WatchError;
use crate::watch::Watch;

/// Reports when a file's modification time changes.
///
/// The baseline is the modification time captured at construction. Each
/// distinct change produces exactly one event carrying `file.name` and
/// `file.modifiedtime`, and moves the baseline forward.
///
/// # Examples
///
/// ```no_run
/// use watchit_watches::{FileModifiedWatch, Watch};
///
/// # fn example() -> Result<(), watchit_watches::WatchError> {
/// let mut watch = FileModifiedWatch::new("/etc/hosts")?;
/// if let Some(event) = watch.observe() {
///     println!("modified: {:?}", event.get(watchit_core::keys::FILE_MOD_TIME));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileModifiedWatch {
    path: Utf8PathBuf,
    last_modified: SystemTime,
}

impl FileModifiedWatch {
    /// Creates a watch for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Io`] if the file cannot be stat'ed.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Result<Self, WatchError> {
        let path = path.into();
        let last_modified = modified_time(&path)?;
        tracing::debug!(path = %path, "File watch created");
        Ok(Self {
            path,
            last_modified,
        })
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Watch for FileModifiedWatch {
    fn observe(&mut self) -> Option<Event> {
        let modified = match modified_time(&self.path) {
            Ok(modified) => modified,
            Err(error) => {
                tracing::debug!(error = %error, "Cannot stat watched file");
                return None;
            }
        };

        if modified == self.last_modified {
            return None;
        }
        self.last_modified = modified;

        let mut event = Event::new();
        event.insert(keys::FILE_NAME, self.path.as_str());
        event.insert(keys::FILE_MOD_TIME, DateTime::<Utc>::from(modified));
        Some(event)
    }

    fn kind(&self) -> &'static str {
        "file-modified"
    }
}

fn modified_time(path: &Utf8Path) -> Result<SystemTime, WatchError> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| WatchError::io(path, source))
}
