//! # dashsync model
//!
//! Entity graph model for mirroring analytic dashboards.
//!
//! This crate provides:
//! - Value objects: [`Query`], [`Visualization`], [`Widget`], [`Dashboard`]
//! - The tagged [`Entity`] variant with structural dispatch
//! - Tag sets with scalar-or-nested input
//! - Map (de)serialization in the remote wire shape
//! - Deterministic ordering via [`SortKey`]
//! - Persisted interchange documents
//!
//! This is a pure model crate with no network I/O.
//!
//! ## Key Invariants
//!
//! - A visualization's `query_id` equals its owning query's id
//! - Queries, visualizations and widgets are ordered identified-first, then
//!   by id ascending
//! - The first visualization of a query is its default visualization
//! - A dashboard holds each referenced query exactly once

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dashboard;
pub mod document;
mod entity;
mod error;
mod fields;
mod kind;
mod parameter;
mod query;
mod tags;
mod visualization;
mod widget;

/// Open key-value map used for entity payloads and options.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use dashboard::Dashboard;
pub use entity::Entity;
pub use error::{ModelError, ModelResult};
pub use kind::{sort_key, EntityKind, SortKey};
pub use parameter::{MappingScope, ParameterLevel, ParameterMapping};
pub use query::{Query, Schedule, DEFAULT_QUERY_NAME};
pub use tags::{TagInput, Tags};
pub use visualization::{Visualization, DEFAULT_VISUALIZATION_NAME};
pub use widget::Widget;
