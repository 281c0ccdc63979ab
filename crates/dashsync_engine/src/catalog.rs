//! Read-only access to remote entities.

use crate::error::{SyncError, SyncResult};
use dashsync_model::document::write_document;
use dashsync_model::{Dashboard, EntityKind, ModelError, Query};
use dashsync_remote::{Conditions, RemoteStore};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A data source as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataSource {
    /// Remote id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Engine type, e.g. `pg`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the caller may only view it.
    #[serde(default)]
    pub view_only: bool,
}

/// Fetches entities from a remote store as model values.
pub struct Catalog<S: RemoteStore> {
    store: S,
}

impl<S: RemoteStore> Catalog<S> {
    /// Creates a catalog over a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fetches a query with its visualizations.
    pub fn query(&self, id: i64) -> SyncResult<Query> {
        debug!(id, "fetching query");
        let map = self.store.get(&EntityKind::Query.path(Some(id)))?;
        Ok(Query::from_map(&map)?)
    }

    /// Fetches several queries, stopping at the first failure.
    pub fn queries(&self, ids: &[i64]) -> SyncResult<Vec<Query>> {
        ids.iter().map(|id| self.query(*id)).collect()
    }

    /// Fetches a dashboard by slug, reconstructing its queries from the
    /// embedded widget payloads.
    pub fn dashboard(&self, slug: &str) -> SyncResult<Dashboard> {
        debug!(slug, "fetching dashboard");
        let map = self
            .store
            .get(&format!("{}/{slug}", EntityKind::Dashboard.collection()))?;
        Ok(Dashboard::from_map(&map)?)
    }

    /// Fetches several dashboards, stopping at the first failure.
    pub fn dashboards(&self, slugs: &[&str]) -> SyncResult<Vec<Dashboard>> {
        slugs.iter().map(|slug| self.dashboard(slug)).collect()
    }

    /// Lists data sources, optionally leaving out view-only ones.
    pub fn data_sources(&self, include_view_only: bool) -> SyncResult<Vec<DataSource>> {
        self.store
            .get_all("data_sources")?
            .into_iter()
            .map(|map| {
                serde_json::from_value::<DataSource>(Value::Object(map))
                    .map_err(|e| SyncError::Model(ModelError::Json(e)))
            })
            .filter(|source| {
                include_view_only || source.as_ref().map_or(true, |s| !s.view_only)
            })
            .collect()
    }

    /// Returns the ids of listed records matching `conditions`.
    pub fn find_ids(&self, path: &str, conditions: &Conditions) -> SyncResult<Vec<i64>> {
        Ok(conditions.ids(&self.store.get_all(path)?))
    }

    /// Returns the slugs of listed records matching `conditions`.
    pub fn find_slugs(&self, path: &str, conditions: &Conditions) -> SyncResult<Vec<String>> {
        Ok(conditions.slugs(&self.store.get_all(path)?))
    }

    /// Writes a query document into `dir`.
    pub fn export_query(&self, id: i64, dir: &Path) -> SyncResult<PathBuf> {
        Ok(write_document(dir, &self.query(id)?.into())?)
    }

    /// Writes a dashboard document, queries included, into `dir`.
    pub fn export_dashboard(&self, slug: &str, dir: &Path) -> SyncResult<PathBuf> {
        Ok(write_document(dir, &self.dashboard(slug)?.into())?)
    }
}
