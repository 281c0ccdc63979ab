//! # dashsync testkit
//!
//! Test utilities for dashsync.
//!
//! This crate provides:
//! - Entity graph fixtures and a seeded in-memory remote
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dashsync_testkit::prelude::*;
//!
//! #[test]
//! fn creates_dashboard() {
//!     let engine = SyncEngine::new(SyncConfig::default(), memory_store());
//!     let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
//!     // ... assertions
//! }
//!
//! proptest! {
//!     #[test]
//!     fn dashboards_round_trip(dashboard in dashboard_strategy()) {
//!         // ... assertions
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
