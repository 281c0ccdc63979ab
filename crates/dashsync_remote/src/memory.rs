//! In-memory remote service for testing.

use crate::error::{RemoteError, RemoteResult};
use crate::http::Method;
use crate::store::{collect_pages, type_name, RemoteStore};
use crate::JsonMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// A remote call recorded by [`InMemoryRemoteStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method the call maps to (creates and updates are `POST`).
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Body sent, if any.
    pub body: Option<JsonMap>,
}

/// A simulated dashboard service.
///
/// Behaves like the real service where the sync engine can observe it:
/// - creating a query auto-creates a default `TABLE` visualization
///   (optionally followed by extra duplicates)
/// - dashboard slugs are derived from the creation name, with `_n`
///   suffixes on collision, and never change on rename
/// - `dashboards/<slug or id>` embeds every widget together with its
///   visualization and that visualization's query
/// - listings of queries and dashboards are paged envelopes
/// - deleting a query or dashboard archives it
///
/// Every call is recorded, and individual calls can be made to fail.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use dashsync_remote::{InMemoryRemoteStore, RemoteStore};
/// use serde_json::json;
///
/// let store = InMemoryRemoteStore::new();
/// let body = json!({"data_source_id": 1, "query": "select 1"});
/// let created = store.create("queries", body.as_object().unwrap()).unwrap();
/// assert_eq!(created["visualizations"][0]["type"], json!("TABLE"));
/// ```
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    state: RwLock<State>,
    extra_default_visualizations: usize,
    page_size: usize,
}

#[derive(Debug)]
struct State {
    next_id: i64,
    queries: BTreeMap<i64, JsonMap>,
    visualizations: BTreeMap<i64, JsonMap>,
    dashboards: BTreeMap<i64, JsonMap>,
    widgets: BTreeMap<i64, JsonMap>,
    data_sources: Vec<JsonMap>,
    grants: BTreeMap<(String, i64), BTreeSet<i64>>,
    failures: HashSet<(Method, String)>,
    calls: Vec<Call>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                queries: BTreeMap::new(),
                visualizations: BTreeMap::new(),
                dashboards: BTreeMap::new(),
                widgets: BTreeMap::new(),
                data_sources: Vec::new(),
                grants: BTreeMap::new(),
                failures: HashSet::new(),
                calls: Vec::new(),
            }),
            extra_default_visualizations: 0,
            page_size: 25,
        }
    }
}

impl InMemoryRemoteStore {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first id handed out. Ids are shared across collections.
    #[must_use]
    pub fn with_id_base(mut self, base: i64) -> Self {
        self.state.get_mut().next_id = base;
        self
    }

    /// Auto-creates `count` extra visualizations after the default one on
    /// every query creation.
    #[must_use]
    pub fn with_extra_default_visualizations(mut self, count: usize) -> Self {
        self.extra_default_visualizations = count;
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Registers a data source.
    #[must_use]
    pub fn with_data_source(mut self, id: i64, name: &str, view_only: bool) -> Self {
        let source = json!({"id": id, "name": name, "type": "pg", "view_only": view_only});
        if let Value::Object(map) = source {
            self.state.get_mut().data_sources.push(map);
        }
        self
    }

    /// Makes every later call with this method and path fail with status 500.
    pub fn fail_on(&self, method: Method, path: impl Into<String>) {
        let path = path.into();
        self.state
            .write()
            .failures
            .insert((method, path.trim_matches('/').to_string()));
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.state.write().failures.clear();
    }

    /// Sets the archive and permission flags of a dashboard.
    ///
    /// # Errors
    ///
    /// Fails with a 404 transport error for an unknown dashboard.
    pub fn set_dashboard_flags(&self, key: &str, is_archived: bool, can_edit: bool) -> RemoteResult<()> {
        let mut state = self.state.write();
        let id = state.dashboard_id(key)?;
        if let Some(record) = state.dashboards.get_mut(&id) {
            record.insert("is_archived".into(), Value::Bool(is_archived));
            record.insert("can_edit".into(), Value::Bool(can_edit));
        }
        Ok(())
    }

    /// Returns the number of widgets on a dashboard, 0 if it is unknown.
    pub fn widget_count(&self, key: &str) -> usize {
        let state = self.state.read();
        match state.dashboard_id(key) {
            Ok(id) => state.widgets_of(id).count(),
            Err(_) => 0,
        }
    }

    /// Returns the ids of a query's visualizations in ascending order.
    pub fn visualization_ids(&self, query_id: i64) -> Vec<i64> {
        self.state
            .read()
            .visualizations
            .iter()
            .filter(|(_, v)| v.get("query_id").and_then(Value::as_i64) == Some(query_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns the users granted modify access to a record.
    pub fn grants(&self, collection: &str, id: i64) -> Vec<i64> {
        self.state
            .read()
            .grants
            .get(&(collection.to_string(), id))
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.read().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.state.write().calls.clear();
    }

    fn handle(&self, method: Method, path: &str, body: Option<&JsonMap>) -> RemoteResult<Value> {
        let (route, page) = split_path(path);
        let mut state = self.state.write();
        state.calls.push(Call {
            method,
            path: route.clone(),
            body: body.cloned(),
        });
        debug!(method = %method, path = %route, "in-memory call");

        if state.failures.contains(&(method, route.clone())) {
            return Err(RemoteError::status(
                500,
                format!("injected failure on {method} {route}"),
            ));
        }

        let body = body.cloned().unwrap_or_default();
        let segments: Vec<&str> = route.split('/').collect();
        match (method, segments.as_slice()) {
            (Method::Get, ["queries"]) => {
                let records = state.listing(&state.queries);
                Ok(envelope(records, page, self.page_size))
            }
            (Method::Get, ["dashboards"]) => {
                let records = state.listing(&state.dashboards);
                Ok(envelope(records, page, self.page_size))
            }
            (Method::Get, ["data_sources"]) => Ok(Value::Array(
                state.data_sources.iter().cloned().map(Value::Object).collect(),
            )),
            (Method::Get, ["queries", id]) => state.query_view(parse_id(id)?),
            (Method::Get, ["visualizations", id]) => {
                lookup(&state.visualizations, parse_id(id)?).map(Value::Object)
            }
            (Method::Get, ["widgets", id]) => {
                let widget = lookup(&state.widgets, parse_id(id)?)?;
                Ok(state.widget_view(widget))
            }
            (Method::Get, ["dashboards", key]) => {
                let id = state.dashboard_id(key)?;
                state.dashboard_view(id)
            }
            (Method::Post, ["queries"]) => state.create_query(body, self.extra_default_visualizations),
            (Method::Post, ["queries", id]) => {
                let id = parse_id(id)?;
                state.update(Collection::Queries, id, &body, &["id", "visualizations"])?;
                state.query_view(id)
            }
            (Method::Post, ["visualizations"]) => state.create_visualization(body),
            (Method::Post, ["visualizations", id]) => {
                let id = parse_id(id)?;
                state.update(Collection::Visualizations, id, &body, &["id", "query_id"])?;
                lookup(&state.visualizations, id).map(Value::Object)
            }
            (Method::Post, ["dashboards"]) => state.create_dashboard(body),
            (Method::Post, ["dashboards", key]) => {
                let id = state.dashboard_id(key)?;
                state.require_editable(id)?;
                state.update(
                    Collection::Dashboards,
                    id,
                    &body,
                    &["id", "slug", "widgets", "can_edit"],
                )?;
                state.dashboard_view(id)
            }
            (Method::Post, ["widgets"]) => state.create_widget(body),
            (Method::Post, ["widgets", id]) => {
                let id = parse_id(id)?;
                state.update(Collection::Widgets, id, &body, &["id", "dashboard_id", "visualization"])?;
                let widget = lookup(&state.widgets, id)?;
                Ok(state.widget_view(widget))
            }
            (Method::Delete, ["queries", id]) => {
                let id = parse_id(id)?;
                let archive = json_map(json!({"is_archived": true, "schedule": null}));
                state.update(Collection::Queries, id, &archive, &[])?;
                Ok(Value::Null)
            }
            (Method::Delete, ["visualizations", id]) => {
                let id = parse_id(id)?;
                remove(&mut state.visualizations, id)?;
                state
                    .widgets
                    .retain(|_, w| w.get("visualization_id").and_then(Value::as_i64) != Some(id));
                Ok(Value::Null)
            }
            (Method::Delete, ["widgets", id]) => {
                remove(&mut state.widgets, parse_id(id)?)?;
                Ok(Value::Null)
            }
            (Method::Delete, ["dashboards", key]) => {
                let id = state.dashboard_id(key)?;
                let archive = json_map(json!({"is_archived": true}));
                state.update(Collection::Dashboards, id, &archive, &[])?;
                Ok(Value::Null)
            }
            (method, [collection, key, "acl"]) => state.access_control(method, collection, key, &body),
            _ => Err(RemoteError::status(404, format!("no route for {method} {route}"))),
        }
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn get(&self, path: &str) -> RemoteResult<JsonMap> {
        match self.handle(Method::Get, path, None)? {
            Value::Object(map) => Ok(map),
            other => Err(RemoteError::UnexpectedShape(format!(
                "GET {path}: expected an object, got {}",
                type_name(&other)
            ))),
        }
    }

    fn get_all(&self, path: &str) -> RemoteResult<Vec<JsonMap>> {
        let (route, _) = split_path(path);
        let first = self.handle(Method::Get, path, None)?;
        collect_pages(first, |page| {
            self.handle(Method::Get, &format!("{route}?page={page}"), None)
        })
    }

    fn create(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        into_map(self.handle(Method::Post, path, Some(body))?)
    }

    fn update(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        into_map(self.handle(Method::Post, path, Some(body))?)
    }

    fn delete(&self, path: &str, body: Option<&JsonMap>) -> RemoteResult<JsonMap> {
        into_map(self.handle(Method::Delete, path, body)?)
    }
}

#[derive(Debug, Clone, Copy)]
enum Collection {
    Queries,
    Visualizations,
    Dashboards,
    Widgets,
}

impl State {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn records_mut(&mut self, collection: Collection) -> &mut BTreeMap<i64, JsonMap> {
        match collection {
            Collection::Queries => &mut self.queries,
            Collection::Visualizations => &mut self.visualizations,
            Collection::Dashboards => &mut self.dashboards,
            Collection::Widgets => &mut self.widgets,
        }
    }

    fn update(
        &mut self,
        collection: Collection,
        id: i64,
        body: &JsonMap,
        skip: &[&str],
    ) -> RemoteResult<()> {
        let record = self
            .records_mut(collection)
            .get_mut(&id)
            .ok_or_else(|| not_found(id))?;
        merge(record, body, skip);
        Ok(())
    }

    fn listing(&self, records: &BTreeMap<i64, JsonMap>) -> Vec<JsonMap> {
        records
            .values()
            .filter(|r| r.get("is_archived") != Some(&Value::Bool(true)))
            .cloned()
            .collect()
    }

    fn dashboard_id(&self, key: &str) -> RemoteResult<i64> {
        self.dashboards
            .iter()
            .find(|(_, d)| d.get("slug").and_then(Value::as_str) == Some(key))
            .map(|(id, _)| *id)
            .or_else(|| {
                key.parse::<i64>()
                    .ok()
                    .filter(|id| self.dashboards.contains_key(id))
            })
            .ok_or_else(|| RemoteError::status(404, format!("no dashboard `{key}`")))
    }

    fn require_editable(&self, dashboard_id: i64) -> RemoteResult<()> {
        let editable = self
            .dashboards
            .get(&dashboard_id)
            .and_then(|d| d.get("can_edit"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if editable {
            Ok(())
        } else {
            Err(RemoteError::status(
                403,
                format!("dashboard {dashboard_id} is not editable"),
            ))
        }
    }

    fn widgets_of(&self, dashboard_id: i64) -> impl Iterator<Item = &JsonMap> {
        self.widgets
            .values()
            .filter(move |w| w.get("dashboard_id").and_then(Value::as_i64) == Some(dashboard_id))
    }

    fn visualizations_of(&self, query_id: i64) -> Vec<Value> {
        self.visualizations
            .values()
            .filter(|v| v.get("query_id").and_then(Value::as_i64) == Some(query_id))
            .cloned()
            .map(Value::Object)
            .collect()
    }

    fn query_view(&self, id: i64) -> RemoteResult<Value> {
        let mut record = lookup(&self.queries, id)?;
        record.insert(
            "visualizations".into(),
            Value::Array(self.visualizations_of(id)),
        );
        Ok(Value::Object(record))
    }

    fn widget_view(&self, mut widget: JsonMap) -> Value {
        let visualization = widget
            .remove("visualization_id")
            .and_then(|v| v.as_i64())
            .and_then(|id| self.visualizations.get(&id).cloned());
        if let Some(mut visualization) = visualization {
            let query = visualization
                .get("query_id")
                .and_then(Value::as_i64)
                .and_then(|id| self.queries.get(&id).cloned());
            if let Some(query) = query {
                visualization.insert("query".into(), Value::Object(query));
            }
            widget.insert("visualization".into(), Value::Object(visualization));
        }
        Value::Object(widget)
    }

    fn dashboard_view(&self, id: i64) -> RemoteResult<Value> {
        let mut record = lookup(&self.dashboards, id)?;
        let widgets = self
            .widgets_of(id)
            .cloned()
            .map(|w| self.widget_view(w))
            .collect();
        record.insert("widgets".into(), Value::Array(widgets));
        Ok(Value::Object(record))
    }

    fn create_query(&mut self, body: JsonMap, extra_visualizations: usize) -> RemoteResult<Value> {
        require(&body, "query")?;
        require(&body, "data_source_id")?;

        let id = self.allocate();
        let mut record = json_map(json!({
            "name": "New Query",
            "description": null,
            "schedule": null,
            "tags": [],
            "options": {},
            "is_archived": false,
            "is_draft": true,
        }));
        merge(&mut record, &body, &["id", "visualizations"]);
        record.insert("id".into(), Value::from(id));
        self.queries.insert(id, record);

        for n in 0..=extra_visualizations {
            let vid = self.allocate();
            let name = if n == 0 {
                "Table".to_string()
            } else {
                format!("Table {}", n + 1)
            };
            let visualization = json_map(json!({
                "id": vid,
                "query_id": id,
                "type": "TABLE",
                "name": name,
                "description": "",
                "options": {},
            }));
            self.visualizations.insert(vid, visualization);
        }
        self.query_view(id)
    }

    fn create_visualization(&mut self, body: JsonMap) -> RemoteResult<Value> {
        require(&body, "type")?;
        let query_id = body
            .get("query_id")
            .and_then(Value::as_i64)
            .filter(|id| self.queries.contains_key(id))
            .ok_or_else(|| RemoteError::status(400, "visualization needs an existing query_id"))?;

        let id = self.allocate();
        let mut record = json_map(json!({"name": "", "description": "", "options": {}}));
        merge(&mut record, &body, &["id"]);
        record.insert("id".into(), Value::from(id));
        record.insert("query_id".into(), Value::from(query_id));
        self.visualizations.insert(id, record.clone());
        Ok(Value::Object(record))
    }

    fn create_dashboard(&mut self, body: JsonMap) -> RemoteResult<Value> {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::status(400, "dashboard needs a name"))?
            .to_string();
        let slug = self.unique_slug(&slugify(&name));

        let id = self.allocate();
        let mut record = json_map(json!({
            "tags": [],
            "layout": [],
            "is_archived": false,
            "is_draft": true,
            "can_edit": true,
            "dashboard_filters_enabled": false,
        }));
        merge(&mut record, &body, &["id", "slug", "widgets", "can_edit"]);
        record.insert("id".into(), Value::from(id));
        record.insert("slug".into(), Value::String(slug));
        self.dashboards.insert(id, record);
        self.dashboard_view(id)
    }

    fn unique_slug(&self, base: &str) -> String {
        let taken = |slug: &str| {
            self.dashboards
                .values()
                .any(|d| d.get("slug").and_then(Value::as_str) == Some(slug))
        };
        if !taken(base) {
            return base.to_string();
        }
        let slug = (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string());
        warn!(requested = %base, assigned = %slug, "dashboard slug collision");
        slug
    }

    fn create_widget(&mut self, body: JsonMap) -> RemoteResult<Value> {
        let dashboard_id = body
            .get("dashboard_id")
            .and_then(Value::as_i64)
            .filter(|id| self.dashboards.contains_key(id))
            .ok_or_else(|| RemoteError::status(400, "widget needs an existing dashboard_id"))?;
        self.require_editable(dashboard_id)?;
        match body.get("visualization_id") {
            None | Some(Value::Null) => {}
            Some(v) => {
                if !v.as_i64().is_some_and(|id| self.visualizations.contains_key(&id)) {
                    return Err(RemoteError::status(400, format!("no visualization {v}")));
                }
            }
        }

        let id = self.allocate();
        let mut record = json_map(json!({"text": "", "width": 1, "options": {}}));
        merge(&mut record, &body, &["id", "visualization"]);
        record.insert("id".into(), Value::from(id));
        self.widgets.insert(id, record.clone());
        Ok(self.widget_view(record))
    }

    fn access_control(
        &mut self,
        method: Method,
        collection: &str,
        key: &str,
        body: &JsonMap,
    ) -> RemoteResult<Value> {
        let id = match collection {
            "queries" => parse_id(key).and_then(|id| lookup(&self.queries, id).map(|_| id))?,
            "dashboards" => self.dashboard_id(key)?,
            _ => {
                return Err(RemoteError::status(
                    404,
                    format!("no access control for `{collection}`"),
                ))
            }
        };
        let grant_key = (collection.to_string(), id);

        if method == Method::Get {
            let users: Vec<Value> = self
                .grants
                .get(&grant_key)
                .into_iter()
                .flatten()
                .map(|user| json!({"id": user}))
                .collect();
            return Ok(json!({"modify": users}));
        }

        let user_id = body
            .get("user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RemoteError::status(400, "access control needs a user_id"))?;
        match method {
            Method::Post => {
                self.grants.entry(grant_key).or_default().insert(user_id);
                Ok(Value::Object(body.clone()))
            }
            _ => {
                let removed = self
                    .grants
                    .get_mut(&grant_key)
                    .is_some_and(|users| users.remove(&user_id));
                if removed {
                    Ok(Value::Null)
                } else {
                    Err(RemoteError::status(404, format!("user {user_id} has no grant")))
                }
            }
        }
    }
}

fn split_path(path: &str) -> (String, u64) {
    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    let page = query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("page="))
        .find_map(|n| n.parse().ok())
        .unwrap_or(1);
    (route.trim_matches('/').to_string(), page)
}

fn envelope(records: Vec<JsonMap>, page: u64, page_size: usize) -> Value {
    let count = records.len();
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size);
    let results: Vec<Value> = records
        .into_iter()
        .skip(start)
        .take(page_size)
        .map(Value::Object)
        .collect();
    json!({"count": count, "page": page, "page_size": page_size, "results": results})
}

fn parse_id(segment: &str) -> RemoteResult<i64> {
    segment
        .parse()
        .map_err(|_| RemoteError::status(404, format!("`{segment}` is not an id")))
}

fn not_found(id: i64) -> RemoteError {
    RemoteError::status(404, format!("no record {id}"))
}

fn lookup(records: &BTreeMap<i64, JsonMap>, id: i64) -> RemoteResult<JsonMap> {
    records.get(&id).cloned().ok_or_else(|| not_found(id))
}

fn remove(records: &mut BTreeMap<i64, JsonMap>, id: i64) -> RemoteResult<JsonMap> {
    records.remove(&id).ok_or_else(|| not_found(id))
}

fn require(body: &JsonMap, key: &str) -> RemoteResult<()> {
    match body.get(key) {
        None | Some(Value::Null) => Err(RemoteError::status(400, format!("missing `{key}`"))),
        Some(_) => Ok(()),
    }
}

fn merge(record: &mut JsonMap, body: &JsonMap, skip: &[&str]) {
    for (key, value) in body {
        if !skip.contains(&key.as_str()) {
            record.insert(key.clone(), value.clone());
        }
    }
}

fn json_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

fn into_map(value: Value) -> RemoteResult<JsonMap> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonMap::new()),
        other => Err(RemoteError::UnexpectedShape(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

/// Derives a URL slug from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "dashboard".to_string()
    } else {
        slug.to_string()
    }
}
