//! Watch for URL modification via the `Last-Modified` header.
//!
//! Requests are blocking. Constructing, observing, or dropping a
//! [`UrlModifiedWatch`] must therefore happen outside of an async context,
//! e.g. inside `tokio::task::spawn_blocking` or on the scheduler's polling
//! thread.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::LAST_MODIFIED;
use watchit_core::{Event, HttpConfig, keys};

use crate::error::WatchError;
use crate::watch::Watch;

const LAST_MODIFIED_HEADER: &str = "Last-Modified";

/// Reports when a URL's `Last-Modified` time changes.
///
/// Construction performs one HEAD request to capture the baseline; a URL
/// that cannot be reached or does not send a parseable `Last-Modified`
/// header cannot be watched.
#[derive(Debug)]
pub struct UrlModifiedWatch {
    url: String,
    client: Client,
    last_modified: DateTime<Utc>,
}

impl UrlModifiedWatch {
    /// Creates a watch for `url` with default HTTP settings.
    pub fn new(url: impl Into<String>) -> Result<Self, WatchError> {
        Self::with_config(url, &HttpConfig::default())
    }

    /// Creates a watch for `url` using the given HTTP settings.
    pub fn with_config(url: impl Into<String>, config: &HttpConfig) -> Result<Self, WatchError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| WatchError::Http {
                url: url.clone(),
                source,
            })?;

        let last_modified = fetch_last_modified(&client, &url)?;
        tracing::debug!(url = %url, %last_modified, "URL watch created");

        Ok(Self {
            url,
            client,
            last_modified,
        })
    }

    /// Returns the watched URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Watch for UrlModifiedWatch {
    fn observe(&mut self) -> Option<Event> {
        let modified = match fetch_last_modified(&self.client, &self.url) {
            Ok(modified) => modified,
            Err(error) => {
                tracing::warn!(error = %error, "Cannot check watched URL");
                return None;
            }
        };

        if modified == self.last_modified {
            return None;
        }
        self.last_modified = modified;

        let mut event = Event::new();
        event.insert(keys::URL_MOD_TIME, modified);
        Some(event)
    }

    fn kind(&self) -> &'static str {
        "url-modified"
    }
}

fn fetch_last_modified(client: &Client, url: &str) -> Result<DateTime<Utc>, WatchError> {
    let response = client.head(url).send().map_err(|source| WatchError::Http {
        url: url.to_owned(),
        source,
    })?;

    let value = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WatchError::MissingHeader {
            url: url.to_owned(),
            header: LAST_MODIFIED_HEADER,
        })?;

    parse_http_date(value)
}

/// Parses an HTTP date such as `Wed, 21 Oct 2015 07:28:00 GMT`.
///
/// # Examples
///
/// ```
/// use watchit_watches::url::parse_http_date;
///
/// let t = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
/// assert_eq!(t.to_rfc3339(), "2015-10-21T07:28:00+00:00");
/// ```
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>, WatchError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| WatchError::InvalidTimestamp {
            value: value.to_owned(),
            source,
        })
}
