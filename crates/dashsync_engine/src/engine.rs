//! The reconciliation engine.

use crate::catalog::Catalog;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::identity::IdentityMap;
use dashsync_model::{Dashboard, EntityKind, JsonMap, ModelError, Query, Visualization, Widget};
use dashsync_remote::RemoteStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Counters over the lifetime of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Queries created remotely.
    pub queries_created: u64,
    /// Queries updated remotely.
    pub queries_updated: u64,
    /// Dashboards created remotely.
    pub dashboards_created: u64,
    /// Dashboards updated remotely.
    pub dashboards_updated: u64,
    /// Visualizations created remotely.
    pub visualizations_created: u64,
    /// Visualizations updated in place.
    pub visualizations_updated: u64,
    /// Visualizations deleted during cleanup.
    pub visualizations_deleted: u64,
    /// Widgets created remotely.
    pub widgets_created: u64,
    /// Widgets deleted during cleanup.
    pub widgets_deleted: u64,
    /// Cleanup deletions that failed and were skipped.
    pub cleanup_failures: u64,
    /// Last error returned by a public operation.
    pub last_error: Option<String>,
}

/// Mirrors local entity graphs onto a remote store.
///
/// Every operation takes an immutable local definition and returns the
/// remote mirror: the same graph carrying the ids the remote assigned.
/// Calls are issued sequentially. Identity-bearing calls abort the
/// operation on failure, with no rollback of what was already created.
/// Cleanup deletions never abort.
///
/// # Example
///
/// ```rust
/// use dashsync_engine::{SyncConfig, SyncEngine};
/// use dashsync_model::{Query, Visualization};
/// use dashsync_remote::InMemoryRemoteStore;
///
/// let engine = SyncEngine::new(SyncConfig::default(), InMemoryRemoteStore::new());
/// let query = Query::new(1, "select 1").with_visualization(Visualization::new("CHART"));
///
/// let mirror = engine.create_query(&query).unwrap();
/// assert!(mirror.id.is_some());
/// assert_eq!(mirror.visualizations()[0].kind, "CHART");
/// ```
pub struct SyncEngine<S: RemoteStore> {
    config: SyncConfig,
    store: S,
    stats: RwLock<SyncStats>,
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Creates an engine over a store.
    pub fn new(config: SyncConfig, store: S) -> Self {
        Self {
            config,
            store,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a read-only view of the remote entities.
    pub fn catalog(&self) -> Catalog<&S> {
        Catalog::new(&self.store)
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Resets all counters.
    pub fn reset_stats(&self) {
        *self.stats.write() = SyncStats::default();
    }

    /// Creates a query and its visualizations.
    ///
    /// The remote's auto-created default visualization takes the place of
    /// the first local one; further local visualizations are created.
    /// Extra visualizations the remote auto-created are deleted.
    ///
    /// # Errors
    ///
    /// Fails if a remote call fails or the created query has no default
    /// visualization.
    pub fn create_query(&self, query: &Query) -> SyncResult<Query> {
        let result = self.create_query_inner(query);
        self.track(result)
    }

    /// Overwrites an existing query and reconciles its visualizations by
    /// position.
    ///
    /// Remote visualizations beyond the local count are kept unless
    /// [`SyncConfig::prune_stale_visualizations`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unidentified`] for a query without id.
    pub fn update_query(&self, query: &Query) -> SyncResult<Query> {
        let result = self.update_query_inner(query);
        self.track(result)
    }

    /// Creates a dashboard together with its queries and widgets.
    ///
    /// # Errors
    ///
    /// Fails if a widget references a visualization no query owns, or if a
    /// remote call fails.
    pub fn create_dashboard(&self, dashboard: &Dashboard) -> SyncResult<Dashboard> {
        let result = self.create_dashboard_inner(dashboard);
        self.track(result)
    }

    /// Overwrites the dashboard addressed by slug.
    ///
    /// Identified queries are updated, unidentified ones created. Every
    /// remote widget is replaced by the local widgets.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Archived`] or [`SyncError::PermissionDenied`]
    /// when the remote dashboard cannot be edited.
    pub fn update_dashboard(&self, dashboard: &Dashboard) -> SyncResult<Dashboard> {
        let result = self.update_dashboard_inner(dashboard);
        self.track(result)
    }

    /// Creates an empty dashboard named after `slug`, reserving the slug.
    ///
    /// Returns the created dashboard; its slug differs from the requested
    /// one if the remote already had it.
    pub fn claim_slug(&self, slug: &str) -> SyncResult<Dashboard> {
        let result = self.claim_slug_inner(slug);
        self.track(result)
    }

    fn track<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(e) = &result {
            self.stats.write().last_error = Some(e.to_string());
        }
        result
    }

    fn create_query_inner(&self, query: &Query) -> SyncResult<Query> {
        debug!(name = %query.name, "creating query");
        let body = query.to_map(&["id", "visualizations"]);
        let response = self.store.create(EntityKind::Query.collection(), &body)?;
        let created = Query::from_map(&response)?;
        let query_id = created
            .id
            .ok_or_else(|| ModelError::missing_field(EntityKind::Query, "id"))?;
        self.stats.write().queries_created += 1;

        let mut remote = created.clone().into_visualizations();
        if remote.is_empty() {
            return Err(SyncError::MissingDefaultVisualization { query_id });
        }
        let default = remote.remove(0);

        if self.config.delete_superseded_visualizations {
            for extra in &remote {
                if self.delete_quietly(&extra.path()) {
                    self.stats.write().visualizations_deleted += 1;
                }
            }
        }

        let visualizations = if query.visualizations().is_empty() {
            vec![default]
        } else {
            self.reconcile_visualizations(query_id, query.visualizations(), &[default])?
        };

        let mut mirror = created;
        mirror.set_visualizations(visualizations);
        info!(
            query_id,
            visualizations = mirror.visualizations().len(),
            "created query"
        );
        Ok(mirror)
    }

    fn update_query_inner(&self, query: &Query) -> SyncResult<Query> {
        let query_id = query.id.ok_or(SyncError::Unidentified {
            kind: EntityKind::Query,
        })?;
        let path = query.path();
        debug!(query_id, "updating query");

        let body = query.to_map(&["id", "visualizations"]);
        let mut response = self.store.update(&path, &body)?;
        if !response.contains_key("visualizations") {
            response = self.store.get(&path)?;
        }
        let updated = Query::from_map(&response)?;
        self.stats.write().queries_updated += 1;

        let existing = updated.clone().into_visualizations();
        let local = query.visualizations();
        let mut visualizations = self.reconcile_visualizations(query_id, local, &existing)?;
        let touched: BTreeSet<i64> = visualizations.iter().filter_map(|v| v.id).collect();

        // An untouched default stays first and is never pruned.
        for (position, stale) in existing.iter().enumerate() {
            if stale.id.is_some_and(|id| touched.contains(&id)) {
                continue;
            }
            if position == 0 {
                visualizations.insert(0, stale.clone());
                continue;
            }
            let pruned = self.config.prune_stale_visualizations && self.delete_quietly(&stale.path());
            if pruned {
                self.stats.write().visualizations_deleted += 1;
            } else {
                visualizations.push(stale.clone());
            }
        }

        let mut mirror = updated;
        mirror.set_visualizations(visualizations);
        info!(
            query_id,
            visualizations = mirror.visualizations().len(),
            "updated query"
        );
        Ok(mirror)
    }

    /// Sends each local visualization to its remote counterpart.
    ///
    /// A local visualization whose id is among `existing` updates that
    /// remote one. The others update the remote one at the same position
    /// if no id match claimed it, and are created otherwise.
    fn reconcile_visualizations(
        &self,
        query_id: i64,
        local: &[Visualization],
        existing: &[Visualization],
    ) -> SyncResult<Vec<Visualization>> {
        let remote_ids: BTreeSet<i64> = existing.iter().filter_map(|v| v.id).collect();
        let mut claimed = BTreeSet::new();
        let by_id: Vec<Option<i64>> = local
            .iter()
            .map(|v| v.id.filter(|id| remote_ids.contains(id) && claimed.insert(*id)))
            .collect();

        let mut reconciled = Vec::with_capacity(local.len());
        for (position, visualization) in local.iter().enumerate() {
            let mut body = visualization.to_map(&["id"]);
            body.insert("query_id".into(), Value::from(query_id));

            let target = by_id[position].or_else(|| {
                existing
                    .get(position)
                    .and_then(|v| v.id)
                    .filter(|id| !claimed.contains(id))
            });
            if let Some(id) = target {
                claimed.insert(id);
            }
            let response = match target {
                Some(remote_id) => {
                    debug!(query_id, position, remote_id, "updating visualization");
                    let response = self
                        .store
                        .update(&EntityKind::Visualization.path(Some(remote_id)), &body)?;
                    self.stats.write().visualizations_updated += 1;
                    response
                }
                None => {
                    debug!(query_id, position, "creating visualization");
                    let response = self
                        .store
                        .create(EntityKind::Visualization.collection(), &body)?;
                    self.stats.write().visualizations_created += 1;
                    response
                }
            };

            let mut mirror = Visualization::from_map(&response)?;
            mirror.query_id = Some(query_id);
            reconciled.push(mirror);
        }
        Ok(reconciled)
    }

    fn claim_slug_inner(&self, slug: &str) -> SyncResult<Dashboard> {
        let mut body = JsonMap::new();
        body.insert("name".into(), Value::String(slug.to_string()));
        let response = self
            .store
            .create(EntityKind::Dashboard.collection(), &body)?;
        let claimed = Dashboard::from_map(&response)?;
        if claimed.slug != slug {
            warn!(requested = %slug, assigned = %claimed.slug, "slug already taken");
        }
        Ok(claimed)
    }

    fn create_dashboard_inner(&self, dashboard: &Dashboard) -> SyncResult<Dashboard> {
        dashboard.validate()?;
        debug!(slug = %dashboard.slug, "creating dashboard");

        let claimed = self.claim_slug_inner(&dashboard.slug)?;
        let dashboard_id = claimed
            .id
            .ok_or_else(|| ModelError::missing_field(EntityKind::Dashboard, "id"))?;
        self.store.update(
            &EntityKind::Dashboard.path(Some(dashboard_id)),
            &self.dashboard_body(dashboard),
        )?;
        self.stats.write().dashboards_created += 1;

        let mut identities = IdentityMap::new();
        let mut queries = Vec::with_capacity(dashboard.queries().len());
        for query in dashboard.queries() {
            let mirror = self.create_query_inner(query)?;
            identities.record(query, &mirror);
            queries.push(mirror);
        }

        let widgets = self.create_widgets(dashboard_id, dashboard.widgets(), &identities)?;

        let mut mirror = self.mirror_of(dashboard, claimed.slug, dashboard_id);
        mirror.set_queries(queries);
        mirror.set_widgets(widgets);
        info!(
            slug = %mirror.slug,
            dashboard_id,
            queries = mirror.queries().len(),
            widgets = mirror.widgets().len(),
            "created dashboard"
        );
        Ok(mirror)
    }

    fn update_dashboard_inner(&self, dashboard: &Dashboard) -> SyncResult<Dashboard> {
        dashboard.validate()?;
        let path = dashboard.slug_path();
        debug!(slug = %dashboard.slug, "updating dashboard");

        let remote = self.store.get(&path)?;
        let flag = |key: &str, absent: bool| remote.get(key).and_then(Value::as_bool).unwrap_or(absent);
        if flag("is_archived", false) {
            return Err(SyncError::Archived {
                slug: dashboard.slug.clone(),
            });
        }
        if !flag("can_edit", true) {
            return Err(SyncError::PermissionDenied {
                slug: dashboard.slug.clone(),
            });
        }
        let dashboard_id = remote
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ModelError::missing_field(EntityKind::Dashboard, "id"))?;
        let stale_widgets: Vec<i64> = remote
            .get("widgets")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|w| w.get("id").and_then(Value::as_i64))
            .collect();

        self.store.update(&path, &self.dashboard_body(dashboard))?;
        self.stats.write().dashboards_updated += 1;

        let mut identities = IdentityMap::new();
        let mut queries = Vec::with_capacity(dashboard.queries().len());
        for query in dashboard.queries() {
            let mirror = match query.id {
                Some(_) => self.update_query_inner(query)?,
                None => self.create_query_inner(query)?,
            };
            identities.record(query, &mirror);
            queries.push(mirror);
        }

        for widget_id in stale_widgets {
            if self.delete_quietly(&EntityKind::Widget.path(Some(widget_id))) {
                self.stats.write().widgets_deleted += 1;
            }
        }

        let widgets = self.create_widgets(dashboard_id, dashboard.widgets(), &identities)?;

        let mut mirror = self.mirror_of(dashboard, dashboard.slug.clone(), dashboard_id);
        mirror.set_queries(queries);
        mirror.set_widgets(widgets);
        info!(
            slug = %mirror.slug,
            dashboard_id,
            queries = mirror.queries().len(),
            widgets = mirror.widgets().len(),
            "updated dashboard"
        );
        Ok(mirror)
    }

    fn create_widgets(
        &self,
        dashboard_id: i64,
        widgets: &[Widget],
        identities: &IdentityMap,
    ) -> SyncResult<Vec<Widget>> {
        let mut created = Vec::with_capacity(widgets.len());
        for widget in widgets {
            let copy = identities.remap(widget, dashboard_id)?;
            let response = self
                .store
                .create(EntityKind::Widget.collection(), &copy.to_map(&["id"]))?;
            let mut mirror = Widget::from_map(&response)?;
            mirror.dashboard_id = Some(dashboard_id);
            self.stats.write().widgets_created += 1;
            created.push(mirror);
        }
        Ok(created)
    }

    fn dashboard_body(&self, dashboard: &Dashboard) -> JsonMap {
        let mut body = JsonMap::new();
        body.insert("name".into(), Value::String(dashboard.name.clone()));
        if self.config.carry_dashboard_tags {
            body.insert("tags".into(), dashboard.tags.to_value());
        }
        body
    }

    fn mirror_of(&self, dashboard: &Dashboard, slug: String, id: i64) -> Dashboard {
        let mut mirror = Dashboard::new(slug)
            .with_name(dashboard.name.clone())
            .with_id(id);
        if self.config.carry_dashboard_tags {
            mirror.tags = dashboard.tags.clone();
        }
        mirror
    }

    /// Deletes a record, logging instead of failing.
    pub(crate) fn delete_quietly(&self, path: &str) -> bool {
        match self.store.delete(path, None) {
            Ok(_) => true,
            Err(e) => {
                warn!(path, error = %e, "cleanup deletion failed");
                self.stats.write().cleanup_failures += 1;
                false
            }
        }
    }
}
