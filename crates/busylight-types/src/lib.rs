//! Shared configuration and error types for busylight.
//!
//! This crate provides the types used by every busylight component:
//!
//! - [`LoadingConfig`] - Minimum display time, poll interval, namespace separator and default text
//! - [`ConfigError`] - Invalid or unreadable configuration
//! - [`WaitError`] - Bounded waits on the keyed registry

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/busylight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;

pub use config::LoadingConfig;
pub use error::{ConfigError, Result, WaitError};
