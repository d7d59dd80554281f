//! Core types, data keys, and configuration for watchit.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`Event`] and [`Value`], the record produced by every observation
//! - [`EventStatus`], the optional continue/stop signal carried by an event
//! - [`keys`], the stable string constants naming event data
//! - [`Config`] and [`ConfigError`] for loading runtime settings
//!
//! # Crate Dependencies
//!
//! ```text
//! watchit-cli ──► watchit-watcher ──► watchit-watches ──► watchit-core
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod keys;
pub mod value;

pub use config::{Config, HttpConfig, ProcFsConfig, SchedulerConfig, ThresholdConfig};
pub use error::ConfigError;
pub use event::{Event, EventData, EventStatus};
pub use value::Value;
