//! Error types for the entity model.

use crate::kind::EntityKind;
use std::io;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by malformed input to a model operation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A tag value was neither text, an integer, nor a list of those.
    #[error("wrong type for tag {found}")]
    InvalidTag {
        /// JSON rendering of the rejected value.
        found: String,
    },

    /// A required field was absent or null.
    #[error("{entity} is missing required field `{field}`")]
    MissingField {
        /// Entity being decoded.
        entity: EntityKind,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field was present with the wrong JSON type.
    #[error("{entity} field `{field}` must be {expected}")]
    InvalidField {
        /// Entity being decoded.
        entity: EntityKind,
        /// Name of the offending field.
        field: &'static str,
        /// Human readable description of the expected type.
        expected: &'static str,
    },

    /// A widget references a visualization none of the dashboard's queries own.
    #[error("widget references visualization {visualization_id} which no dashboard query owns")]
    DanglingVisualization {
        /// The unresolved visualization id.
        visualization_id: i64,
    },

    /// A regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A document could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ModelError {
    /// Creates a missing field error.
    pub fn missing_field(entity: EntityKind, field: &'static str) -> Self {
        Self::MissingField { entity, field }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(entity: EntityKind, field: &'static str, expected: &'static str) -> Self {
        Self::InvalidField {
            entity,
            field,
            expected,
        }
    }
}
