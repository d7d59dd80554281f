//! Declarative watch definitions.
//!
//! A Watchfile holds one directive per line. Blank lines and lines
//! starting with `#` are ignored.
//!
//! ```text
//! # watch a local file and a remote document
//! WATCH file:///etc/hosts
//! WATCH https://example.com/feed.xml
//! TELL stdout
//! PROPERTY owner=ops
//! ```
//!
//! | Directive          | Meaning                                              |
//! |--------------------|------------------------------------------------------|
//! | `WATCH <url>`      | `file://` -> file watch, `http(s)://` -> URL watch   |
//! | `TELL <target>`    | report events to `stdout` or `log`                   |
//! | `PROPERTY <k>=<v>` | free-form property                                   |

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Url;
use watchit_core::HttpConfig;
use watchit_watches::{FileModifiedWatch, UrlModifiedWatch, Watch, WatchError};

use crate::dispatch::Dispatcher;
use crate::error::WatchfileError;
use crate::trigger::{ReportTarget, Trigger};

/// Name of the Watchfile looked up when none is given.
pub const DEFAULT_WATCHFILE: &str = "Watchfile";

/// A watch declared by a `WATCH` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSpec {
    /// Modification of a local file.
    File(Utf8PathBuf),
    /// `Last-Modified` changes of an HTTP(S) resource.
    Url(String),
}

impl WatchSpec {
    /// Constructs the watch.
    ///
    /// URL watches issue a blocking request, so call this outside of an
    /// async context.
    pub fn build(&self, http: &HttpConfig) -> Result<Box<dyn Watch>, WatchError> {
        Ok(match self {
            Self::File(path) => Box::new(FileModifiedWatch::new(path.clone())?),
            Self::Url(url) => Box::new(UrlModifiedWatch::with_config(url.as_str(), http)?),
        })
    }

    /// Returns the watch family name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file-modified",
            Self::Url(_) => "url-modified",
        }
    }

    /// Returns the watched target as written.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::File(path) => path.as_str(),
            Self::Url(url) => url,
        }
    }
}

/// A reaction declared by a `TELL` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSpec {
    /// Where events are reported.
    pub target: ReportTarget,
}

impl TriggerSpec {
    /// Constructs the trigger.
    pub fn build(self, dispatcher: Dispatcher) -> impl Trigger {
        self.target.trigger(dispatcher)
    }
}

/// A parsed Watchfile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchfile {
    /// Declared watches, in file order.
    pub watches: Vec<WatchSpec>,
    /// Declared triggers, in file order.
    pub triggers: Vec<TriggerSpec>,
    /// Declared properties. A repeated key keeps the last value.
    pub properties: BTreeMap<String, String>,
}

impl Watchfile {
    /// Reads and parses the Watchfile at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self, WatchfileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| WatchfileError::Read {
            path: path.to_owned(),
            source,
        })?;
        let watchfile = Self::parse(&contents)?;
        tracing::debug!(
            path = %path,
            watches = watchfile.watches.len(),
            triggers = watchfile.triggers.len(),
            "Watchfile loaded"
        );
        Ok(watchfile)
    }

    /// Parses Watchfile contents.
    ///
    /// # Examples
    ///
    /// ```
    /// use watchit_watcher::{Watchfile, WatchSpec};
    ///
    /// let wf = Watchfile::parse("WATCH file:///etc/hosts\nTELL log\n").unwrap();
    /// assert_eq!(wf.watches, vec![WatchSpec::File("/etc/hosts".into())]);
    /// assert_eq!(wf.triggers.len(), 1);
    /// ```
    pub fn parse(contents: &str) -> Result<Self, WatchfileError> {
        let mut watchfile = Self::default();

        for (index, raw) in contents.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let (directive, rest) = text
                .split_once(char::is_whitespace)
                .map_or((text, ""), |(d, r)| (d, r.trim()));

            match directive {
                "WATCH" => watchfile.watches.push(parse_watch(line, rest)?),
                "TELL" => watchfile.triggers.push(parse_tell(line, rest)?),
                "PROPERTY" => {
                    let (key, value) = parse_property(line, rest)?;
                    watchfile.properties.insert(key, value);
                }
                other => {
                    return Err(WatchfileError::syntax(
                        line,
                        format!("unknown directive '{other}'"),
                    ));
                }
            }
        }

        Ok(watchfile)
    }

    /// Returns `true` if no watches are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

fn single_argument<'a>(line: usize, directive: &str, rest: &'a str) -> Result<&'a str, WatchfileError> {
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        (None, _) => Err(WatchfileError::syntax(
            line,
            format!("expected an argument after {directive}"),
        )),
        (Some(_), Some(_)) => Err(WatchfileError::syntax(
            line,
            format!("expected a single argument after {directive}"),
        )),
    }
}

fn parse_watch(line: usize, rest: &str) -> Result<WatchSpec, WatchfileError> {
    let arg = single_argument(line, "WATCH", rest)?;
    let url = Url::parse(arg).map_err(|error| WatchfileError::InvalidUrl {
        line,
        url: arg.to_owned(),
        reason: error.to_string(),
    })?;

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .ok()
                .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
                .ok_or_else(|| WatchfileError::syntax(line, format!("'{arg}' is not a local UTF-8 path")))?;
            Ok(WatchSpec::File(path))
        }
        "http" | "https" => Ok(WatchSpec::Url(arg.to_owned())),
        scheme => Err(WatchfileError::UnknownScheme {
            line,
            scheme: scheme.to_owned(),
        }),
    }
}

fn parse_tell(line: usize, rest: &str) -> Result<TriggerSpec, WatchfileError> {
    let arg = single_argument(line, "TELL", rest)?;
    let target = ReportTarget::from_name(arg).unwrap_or_else(|| {
        tracing::warn!(line, target = arg, "Unknown TELL target, reporting to stdout");
        ReportTarget::Stdout
    });
    Ok(TriggerSpec { target })
}

fn parse_property(line: usize, rest: &str) -> Result<(String, String), WatchfileError> {
    let (key, value) = rest
        .split_once('=')
        .ok_or_else(|| WatchfileError::syntax(line, "expected key=value after PROPERTY"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(WatchfileError::syntax(line, "empty property key"));
    }
    Ok((key.to_owned(), value.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_watchfile() {
        let wf = Watchfile::parse(
            "# services\n\
             \n\
             WATCH file:///var/log/app.log\n\
             WATCH https://example.com/feed.xml\n\
             TELL stdout\n\
             TELL log\n\
             PROPERTY owner = ops team\n",
        )
        .unwrap();

        assert_eq!(
            wf.watches,
            vec![
                WatchSpec::File(Utf8PathBuf::from("/var/log/app.log")),
                WatchSpec::Url("https://example.com/feed.xml".to_owned()),
            ]
        );
        assert_eq!(
            wf.triggers,
            vec![
                TriggerSpec {
                    target: ReportTarget::Stdout
                },
                TriggerSpec {
                    target: ReportTarget::Log
                },
            ]
        );
        assert_eq!(wf.properties.get("owner").map(String::as_str), Some("ops team"));
    }

    #[test]
    fn test_empty_watchfile() {
        let wf = Watchfile::parse("# nothing here\n\n").unwrap();
        assert!(wf.is_empty());
        assert!(wf.triggers.is_empty());
    }

    #[test]
    fn test_unknown_tell_target_falls_back_to_stdout() {
        let wf = Watchfile::parse("TELL pager\n").unwrap();
        assert_eq!(wf.triggers[0].target, ReportTarget::Stdout);
    }

    #[test]
    fn test_unknown_scheme() {
        let err = Watchfile::parse("WATCH file:///a\nWATCH ftp://host/file\n").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"line 2: unsupported watch scheme 'ftp'");
    }

    #[test]
    fn test_invalid_url() {
        let err = Watchfile::parse("WATCH not-a-url\n").unwrap_err();
        assert!(matches!(err, WatchfileError::InvalidUrl { line: 1, .. }));
    }

    #[test]
    fn test_missing_argument() {
        let err = Watchfile::parse("\nWATCH\n").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"line 2: expected an argument after WATCH");
    }

    #[test]
    fn test_extra_argument() {
        let err = Watchfile::parse("TELL stdout log\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_unknown_directive() {
        let err = Watchfile::parse("WATCH file:///a\nNOTIFY me\n").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"line 2: unknown directive 'NOTIFY'");
    }

    #[test]
    fn test_malformed_property() {
        let err = Watchfile::parse("PROPERTY owner\n").unwrap_err();
        assert!(matches!(err, WatchfileError::Syntax { line: 1, .. }));
        let err = Watchfile::parse("PROPERTY =ops\n").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"line 1: empty property key");
    }

    #[test]
    fn test_load_and_build_file_watch() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = Utf8Path::from_path(dir.path()).expect("Invalid path");
        let target = root.join("watched.txt");
        std::fs::write(&target, "v1").unwrap();

        let path = root.join(DEFAULT_WATCHFILE);
        std::fs::write(&path, format!("WATCH file://{target}\nTELL log\n")).unwrap();

        let wf = Watchfile::load(&path).unwrap();
        assert_eq!(wf.watches, vec![WatchSpec::File(target.clone())]);

        let watch = wf.watches[0].build(&HttpConfig::default()).unwrap();
        assert_eq!(watch.kind(), "file-modified");
        assert_eq!(wf.watches[0].target(), target.as_str());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Watchfile::load(Utf8Path::new("/nonexistent/Watchfile")).unwrap_err();
        assert!(matches!(err, WatchfileError::Read { .. }));
        assert!(err.path().is_some());
    }
}
