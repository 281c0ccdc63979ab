//! # dashsync template
//!
//! Parameterized definitions rendered into concrete entity graphs.
//!
//! This crate provides:
//! - [`QueryTemplate`]: SQL with `{{ name }}` placeholders
//! - [`DashboardTemplate`]: a dashboard whose queries are templates
//!
//! Rendering never mutates the template; every render returns a fresh,
//! unidentified graph ready for the sync engine.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dashboard;
mod error;
mod query;

pub use dashboard::DashboardTemplate;
pub use error::{TemplateError, TemplateResult};
pub use query::{params, Params, QueryTemplate};
