//! # dashsync remote
//!
//! Remote store capability for the dashsync engine.
//!
//! This crate provides:
//! - The [`RemoteStore`] trait consumed by the sync engine
//! - Pagination of listing responses
//! - [`HttpRemoteStore`] over a pluggable [`HttpClient`]
//! - [`InMemoryRemoteStore`], a simulated service for tests
//! - Record filtering via [`Conditions`]
//!
//! ## Remote Conventions
//!
//! - Paths are relative to `<base_url>/api/`
//! - Creates and updates are both `POST`
//! - Listings are either a flat list or a paged envelope with `count`,
//!   `page_size` and `results`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod filter;
mod http;
mod memory;
mod store;

/// Open key-value map exchanged with the remote service.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use config::RemoteConfig;
pub use error::{RemoteError, RemoteResult};
pub use filter::{Condition, Conditions};
pub use http::{HttpClient, HttpRemoteStore, HttpRequest, HttpResponse, Method};
pub use memory::{slugify, Call, InMemoryRemoteStore};
pub use store::{collect_pages, RemoteStore};
