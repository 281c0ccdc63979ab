//! Local to remote identity mapping.

use crate::error::{SyncError, SyncResult};
use dashsync_model::{Query, Widget};
use std::collections::BTreeMap;

/// Maps local visualization ids to the ids the remote assigned.
///
/// Built while queries are synced, then used to repoint widgets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    visualizations: BTreeMap<i64, i64>,
}

impl IdentityMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one visualization pair.
    pub fn insert(&mut self, local: i64, remote: i64) {
        self.visualizations.insert(local, remote);
    }

    /// Records the position-wise pairs of a local query and its mirror.
    ///
    /// Local visualizations without an id cannot be referenced and are
    /// skipped.
    pub fn record(&mut self, local: &Query, mirror: &Query) {
        for (l, r) in local.visualizations().iter().zip(mirror.visualizations()) {
            if let (Some(l), Some(r)) = (l.id, r.id) {
                self.insert(l, r);
            }
        }
    }

    /// Returns the remote id for a local visualization id.
    pub fn get(&self, local: i64) -> Option<i64> {
        self.visualizations.get(&local).copied()
    }

    /// Returns the number of mapped visualizations.
    pub fn len(&self) -> usize {
        self.visualizations.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.visualizations.is_empty()
    }

    /// Returns a copy of `widget` ready for creation on `dashboard_id`.
    ///
    /// The copy has no id and points at the remote visualization. Text
    /// widgets pass through unchanged apart from the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnmappedVisualization`] if the widget points at
    /// a visualization that is not mapped.
    pub fn remap(&self, widget: &Widget, dashboard_id: i64) -> SyncResult<Widget> {
        let mut copy = widget.clone();
        copy.id = None;
        copy.dashboard_id = Some(dashboard_id);
        if let Some(local) = widget.visualization_id {
            copy.visualization_id = Some(
                self.get(local)
                    .ok_or(SyncError::UnmappedVisualization {
                        visualization_id: local,
                    })?,
            );
        }
        Ok(copy)
    }
}
