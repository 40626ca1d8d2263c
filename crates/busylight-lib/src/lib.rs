//! Loading-state coordination for asynchronous applications.
//!
//! This is a facade crate that re-exports functionality from the busylight
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```
//! use busylight_lib::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = LoadingContext::new(LoadingConfig::default())?;
//!
//!     // One shared indicator: stays up at least one second.
//!     let rows = context
//!         .indicator()
//!         .with_loading_result(Some("Fetching rows"), async { Ok::<_, std::io::Error>(3) })
//!         .await?;
//!     assert_eq!(rows, 3);
//!
//!     // Named flags per region.
//!     let sidebar = context.registry().namespace("sidebar");
//!     sidebar.with_loading("tree", async { Ok::<_, std::io::Error>(()) }).await?;
//!     assert!(!context.registry().is_any_loading());
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/busylight/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

#[cfg(all(feature = "indicator", feature = "registry"))]
mod context;

// Re-export core types
pub use busylight_types::*;

// Re-export the indicator
#[cfg(feature = "indicator")]
pub use busylight_indicator::{
    Callbacks, DisplayTimer, Indicator, IndicatorGuard, IndicatorSnapshot, OutcomeHandler,
};

// Re-export the keyed registry
#[cfg(feature = "registry")]
pub use busylight_registry::{
    KeySelector, LoadingGuard, LoadingMap, LoadingObserver, LoadingRegistry, Namespace,
    RegistryBuilder,
};

#[cfg(all(feature = "indicator", feature = "registry"))]
pub use context::LoadingContext;

/// Prelude module for convenient imports.
///
/// ```
/// use busylight_lib::prelude::*;
/// ```
pub mod prelude {
    pub use busylight_types::{ConfigError, LoadingConfig, WaitError};

    #[cfg(feature = "indicator")]
    pub use busylight_indicator::{Callbacks, Indicator, OutcomeHandler};

    #[cfg(feature = "registry")]
    pub use busylight_registry::{LoadingObserver, LoadingRegistry, Namespace};

    #[cfg(all(feature = "indicator", feature = "registry"))]
    pub use crate::context::LoadingContext;
}
