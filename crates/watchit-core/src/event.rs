//! The event record produced by a successful observation.
//!
//! # Event Flow
//!
//! ```text
//! Watch::observe()
//!        │  builds Event, may add derived fields (stats.cpu, io.*_per_sec)
//!        ▼
//!   Arc<Event>  (read-only from here on)
//!        │
//!        ▼
//! Trigger::on_event() ──► handlers / broadcast fan-out
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Named values carried by an [`Event`].
pub type EventData = FxHashMap<String, Value>;

/// Control signal carried by an event.
///
/// Defaults to "continue, code 0". A watch that wants its polling loop to
/// halt after the event has been dispatched sets [`stop`](Self::stop).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventStatus {
    /// Result code of the observation.
    pub code: i32,
    /// Whether the scheduler should stop polling after dispatching this event.
    pub stop: bool,
}

impl EventStatus {
    /// The default status: continue polling with code 0.
    pub const CONTINUE: Self = Self {
        code: 0,
        stop: false,
    };

    /// A status requesting the scheduler to stop, with the given code.
    #[must_use]
    pub const fn stop(code: i32) -> Self {
        Self { code, stop: true }
    }
}

/// A state change reported by a watch.
///
/// An event is created fresh on every successful observation. While the
/// producing watch holds it by value it may add derived fields with
/// [`insert`](Self::insert); once handed to a trigger it is shared as an
/// `Arc<Event>` and only read.
///
/// # Examples
///
/// ```
/// use watchit_core::{keys, Event};
///
/// let mut event = Event::new();
/// event.insert(keys::FILE_NAME, "/etc/hosts");
///
/// assert_eq!(event.get_str(keys::FILE_NAME), Some("/etc/hosts"));
/// assert!(!event.should_stop());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    data: EventData,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    status: EventStatus,
}

impl Event {
    /// Creates an empty event stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(EventData::default())
    }

    /// Creates an event carrying `data`, stamped with the current time.
    #[must_use]
    pub fn with_data(data: EventData) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
            status: EventStatus::CONTINUE,
        }
    }

    /// Sets the control status of this event.
    #[must_use]
    pub const fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds or replaces a named value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns the named value, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the named value as an integer.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// Returns the named value as a float.
    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    /// Returns the named value as a string slice.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the named value as a timestamp.
    #[must_use]
    pub fn get_time(&self, key: &str) -> Option<&DateTime<Utc>> {
        self.get(key).and_then(Value::as_time)
    }

    /// Returns all data carried by this event.
    #[must_use]
    pub const fn data(&self) -> &EventData {
        &self.data
    }

    /// Returns the keys present in this event, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of named values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the event carries no data (a pure signal).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the creation time of this event.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the control status of this event.
    #[must_use]
    pub const fn status(&self) -> EventStatus {
        self.status
    }

    /// Returns the result code of this event.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.status.code
    }

    /// Returns `true` if the scheduler should stop after dispatching this event.
    #[must_use]
    pub const fn should_stop(&self) -> bool {
        self.status.stop
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Event {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::with_data(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
