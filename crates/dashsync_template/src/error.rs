//! Error types for template operations.

use thiserror::Error;

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while building or rendering a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A placeholder has no value in the supplied parameters.
    #[error("missing template parameter `{name}`")]
    MissingParameter {
        /// Placeholder name.
        name: String,
    },

    /// The placeholder pattern for the parameter names did not compile.
    #[error("invalid parameter names: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl TemplateError {
    /// Creates a missing parameter error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }
}
