//! Bulk changes to existing remote records.
//!
//! Each operation attempts every id, continues past failures, and reports
//! all failed ids at the end as [`SyncError::Aggregate`].

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use dashsync_model::{EntityKind, JsonMap, ModelError, Schedule, TagInput, Tags};
use dashsync_remote::RemoteStore;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

impl<S: RemoteStore> SyncEngine<S> {
    /// Archives queries.
    pub fn archive_queries(&self, ids: &[i64]) -> SyncResult<()> {
        self.change_each(EntityKind::Query, ids, &body(json!({"is_archived": true})))
    }

    /// Restores archived queries.
    pub fn restore_queries(&self, ids: &[i64]) -> SyncResult<()> {
        self.change_each(EntityKind::Query, ids, &body(json!({"is_archived": false})))
    }

    /// Replaces the tags of queries.
    pub fn tag_queries(&self, ids: &[i64], tags: impl Into<TagInput>) -> SyncResult<()> {
        let mut set = Tags::new();
        set.add(tags);
        self.change_each(EntityKind::Query, ids, &body(json!({"tags": set.to_value()})))
    }

    /// Sets a plain interval schedule on queries.
    pub fn schedule_queries(&self, ids: &[i64], interval_secs: i64) -> SyncResult<()> {
        let schedule = serde_json::to_value(Schedule::every(interval_secs)).map_err(ModelError::from)?;
        self.change_each(EntityKind::Query, ids, &body(json!({"schedule": schedule})))
    }

    /// Rewrites the SQL of queries.
    ///
    /// With `regex` set, `from` is a pattern and `to` may use `$1`-style
    /// groups.
    ///
    /// # Errors
    ///
    /// Fails before any call if the pattern does not compile.
    pub fn replace_query_sql(&self, ids: &[i64], from: &str, to: &str, regex: bool) -> SyncResult<()> {
        if regex {
            Regex::new(from).map_err(ModelError::from)?;
        }

        let catalog = self.catalog();
        let mut failed = Vec::new();
        for &id in ids {
            let result = catalog.query(id).and_then(|mut query| {
                if regex {
                    query.replace_sql_regex(from, to)?;
                } else {
                    query.replace_sql(from, to);
                }
                let change = body(json!({"query": query.sql}));
                Ok(self.store().update(&query.path(), &change)?)
            });
            if let Err(e) = result {
                warn!(id, error = %e, "failed to rewrite query");
                failed.push(id);
            }
        }
        finish(EntityKind::Query, failed)
    }

    /// Publishes dashboards.
    pub fn publish_dashboards(&self, ids: &[i64]) -> SyncResult<()> {
        self.change_each(EntityKind::Dashboard, ids, &body(json!({"is_draft": false})))
    }

    /// Turns dashboards back into drafts.
    pub fn unpublish_dashboards(&self, ids: &[i64]) -> SyncResult<()> {
        self.change_each(EntityKind::Dashboard, ids, &body(json!({"is_draft": true})))
    }

    /// Grants users modify access to records.
    pub fn grant_access(&self, kind: EntityKind, ids: &[i64], user_ids: &[i64]) -> SyncResult<()> {
        self.change_access(kind, ids, user_ids, true)
    }

    /// Revokes users' modify access to records.
    pub fn limit_access(&self, kind: EntityKind, ids: &[i64], user_ids: &[i64]) -> SyncResult<()> {
        self.change_access(kind, ids, user_ids, false)
    }

    fn change_access(&self, kind: EntityKind, ids: &[i64], user_ids: &[i64], grant: bool) -> SyncResult<()> {
        let mut failed = Vec::new();
        for &id in ids {
            let path = format!("{}/acl", kind.path(Some(id)));
            let result = user_ids.iter().try_for_each(|user_id| {
                let change = body(json!({"user_id": user_id, "access_type": "modify"}));
                if grant {
                    self.store().create(&path, &change).map(drop)
                } else {
                    self.store().delete(&path, Some(&change)).map(drop)
                }
            });
            if let Err(e) = result {
                warn!(%path, error = %e, "failed to change access");
                failed.push(id);
            }
        }
        finish(kind, failed)
    }

    fn change_each(&self, kind: EntityKind, ids: &[i64], change: &JsonMap) -> SyncResult<()> {
        let mut failed = Vec::new();
        for &id in ids {
            let path = kind.path(Some(id));
            match self.store().update(&path, change) {
                Ok(_) => debug!(%path, "changed"),
                Err(e) => {
                    warn!(%path, error = %e, "change failed");
                    failed.push(id);
                }
            }
        }
        finish(kind, failed)
    }
}

fn finish(kind: EntityKind, failed: Vec<i64>) -> SyncResult<()> {
    if failed.is_empty() {
        Ok(())
    } else {
        Err(SyncError::aggregate(kind, failed))
    }
}

fn body(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
