//! Keyed loading registry for busylight.
//!
//! This crate tracks one boolean flag per named operation:
//!
//! - [`LoadingRegistry`] - Shared key to flag map with aggregates and waits
//! - [`RegistryBuilder`] - Registry construction with an observer or seeded flags
//! - [`Namespace`] - Prefix-scoped view over a registry
//! - [`KeySelector`] - Combined "any of these keys" value with change notification
//! - [`LoadingMap`] - Snapshot of every flag, as published to subscribers
//! - [`LoadingObserver`] - Hook called after every flag update

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/busylight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod map;
mod namespace;
mod observer;
mod registry;
mod selector;

pub use map::LoadingMap;
pub use namespace::Namespace;
pub use observer::LoadingObserver;
pub use registry::{LoadingGuard, LoadingRegistry, RegistryBuilder};
pub use selector::KeySelector;
