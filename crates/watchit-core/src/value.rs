//! Dynamically-typed values carried in event data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single value in an [`Event`](crate::Event)'s data mapping.
///
/// Watches store whatever shape the underlying source naturally produces:
/// kernel counters become [`Value::Int`], derived rates [`Value::Float`],
/// modification times [`Value::Time`], and unparsed records
/// [`Value::Tokens`].
///
/// Serialization is untagged, so the variant is recovered from the JSON
/// shape alone. Timestamps are written as RFC 3339 strings and variants are
/// tried in declaration order, so any string that parses as RFC 3339 reads
/// back as [`Value::Time`], even if it was stored as [`Value::Str`].
///
/// # Examples
///
/// ```
/// use watchit_core::Value;
///
/// let ticks = Value::from(150_i64);
/// assert_eq!(ticks.as_int(), Some(150));
///
/// // Integer-looking strings are readable as integers too.
/// let raw = Value::from("42");
/// assert_eq!(raw.as_int(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTC timestamp.
    Time(DateTime<Utc>),
    /// A free-form string.
    Str(String),
    /// A sequence of raw tokens.
    Tokens(Vec<String>),
}

impl Value {
    /// Returns the value as a string slice if it is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// [`Value::Str`] values are parsed after trimming whitespace.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a timestamp if it is a [`Value::Time`].
    #[must_use]
    pub const fn as_time(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the tokens if the value is a [`Value::Tokens`].
    #[must_use]
    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            Self::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::Tokens(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Str(s) => f.write_str(s),
            Self::Tokens(tokens) => f.write_str(&tokens.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_as_int_parses_strings() {
        assert_eq!(Value::from(" 17 ").as_int(), Some(17));
        assert_eq!(Value::from("seventeen").as_int(), None);
        assert_eq!(Value::Float(1.5).as_int(), None);
    }

    #[test]
    fn test_as_float_widens_ints() {
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Float(0.25).as_float(), Some(0.25));
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let tokens = Value::from(vec!["a".to_owned(), "b".to_owned()]);
        assert!(tokens.as_str().is_none());
        assert!(tokens.as_time().is_none());
        assert_eq!(tokens.as_tokens().map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_display() {
        let t = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(Value::Time(t).to_string(), "2015-10-21T07:28:00+00:00");
        assert_eq!(
            Value::from(vec!["1".to_owned(), "(init)".to_owned()]).to_string(),
            "1 (init)"
        );
    }

    #[test]
    fn test_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Value::Int(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Value::from("x")).unwrap(), r#""x""#);
    }

    #[test]
    fn test_timestamp_like_strings_read_back_as_time() {
        let t = DateTime::parse_from_rfc3339("2015-10-21T07:28:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_string(&Value::Time(t)).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), Value::Time(t));

        let json = serde_json::to_string(&Value::from("2015-10-21T07:28:00Z")).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), Value::Time(t));

        let json = serde_json::to_string(&Value::from("/var/log/app.log")).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            Value::from("/var/log/app.log")
        );
    }
}
