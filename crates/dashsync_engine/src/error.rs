//! Error types for the sync engine.

use dashsync_model::{EntityKind, ModelError};
use dashsync_remote::RemoteError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local input or a remote response did not fit the model.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The target dashboard is archived.
    #[error("dashboard `{slug}` is archived")]
    Archived {
        /// Dashboard slug.
        slug: String,
    },

    /// The caller may not edit the target dashboard.
    #[error("no permission to edit dashboard `{slug}`")]
    PermissionDenied {
        /// Dashboard slug.
        slug: String,
    },

    /// A freshly created query came back without any visualization.
    #[error("query {query_id} was created without a default visualization")]
    MissingDefaultVisualization {
        /// Remote query id.
        query_id: i64,
    },

    /// An update was requested for an entity that has no id.
    #[error("cannot update an unidentified {kind}")]
    Unidentified {
        /// Entity category.
        kind: EntityKind,
    },

    /// A widget references a visualization that was not synced.
    #[error("widget references visualization {visualization_id} which was not synced")]
    UnmappedVisualization {
        /// Local visualization id.
        visualization_id: i64,
    },

    /// Some records of a bulk change failed.
    #[error("failed to change {collection} {failed_ids:?}")]
    Aggregate {
        /// Remote collection name.
        collection: String,
        /// Ids whose change failed.
        failed_ids: Vec<i64>,
    },
}

impl SyncError {
    /// Creates an aggregate error for a collection.
    pub fn aggregate(kind: EntityKind, failed_ids: Vec<i64>) -> Self {
        Self::Aggregate {
            collection: kind.collection().to_string(),
            failed_ids,
        }
    }

    /// Returns true if this error reflects the remote dashboard's state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            SyncError::Archived { .. } | SyncError::PermissionDenied { .. }
        )
    }

    /// Returns true if repeating the operation could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::Archived {
            slug: "sales".into(),
        };
        assert_eq!(err.to_string(), "dashboard `sales` is archived");

        let err = SyncError::aggregate(EntityKind::Query, vec![3, 9]);
        assert_eq!(err.to_string(), "failed to change queries [3, 9]");

        let err = SyncError::Unidentified {
            kind: EntityKind::Query,
        };
        assert_eq!(err.to_string(), "cannot update an unidentified query");
    }

    #[test]
    fn retryable_errors() {
        assert!(SyncError::from(RemoteError::status(502, "bad gateway")).is_retryable());
        assert!(!SyncError::from(RemoteError::status(404, "gone")).is_retryable());

        let denied = SyncError::PermissionDenied {
            slug: "ops".into(),
        };
        assert!(denied.is_state_error());
        assert!(!denied.is_retryable());
    }
}
