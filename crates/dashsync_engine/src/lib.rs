//! # dashsync engine
//!
//! Mirrors local dashboard graphs onto a remote service.
//!
//! This crate provides:
//! - [`SyncEngine`]: create and update reconciliation for queries and
//!   dashboards
//! - [`IdentityMap`]: local to remote visualization ids
//! - [`Catalog`]: typed reads of remote entities
//! - Bulk maintenance (archive, tag, schedule, publish, access control)
//!
//! ## Reconciliation
//!
//! The remote assigns new ids on every creation and auto-creates a default
//! visualization for each query. The engine reuses that default for the
//! first local visualization, records every local to remote id pair, and
//! repoints widgets through the pairs before creating them.
//!
//! ## Key Invariants
//!
//! - Inputs are never mutated; every operation returns a mirror graph
//! - Identity-bearing calls abort on failure, with no rollback
//! - Cleanup deletions never abort; failures are logged and counted
//! - Dashboards are updated by slug, queries by id

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod engine;
mod error;
mod identity;
mod maintenance;

pub use catalog::{Catalog, DataSource};
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use identity::IdentityMap;
