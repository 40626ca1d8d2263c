//! Reference-counted busy indicator for busylight.
//!
//! This crate provides the anti-flicker indicator shared by concurrent callers:
//!
//! - [`DisplayTimer`] - Cancelable delayed action backing deferred hides
//! - [`Indicator`] - Reference-counted visible flag with a minimum display time
//! - [`IndicatorGuard`] - RAII pairing of `show` and `hide`
//! - [`OutcomeHandler`] / [`Callbacks`] - Success and error hooks for [`Indicator::with_loading`]

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/busylight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod indicator;
mod timer;
mod wrapper;

pub use indicator::{Indicator, IndicatorGuard, IndicatorSnapshot};
pub use timer::DisplayTimer;
pub use wrapper::{Callbacks, OutcomeHandler};
