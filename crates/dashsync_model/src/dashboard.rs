//! Dashboards and derived query lists.

use crate::error::{ModelError, ModelResult};
use crate::fields::{without, Fields};
use crate::kind::{sort_key, EntityKind, SortKey};
use crate::parameter::{ParameterLevel, ParameterMapping};
use crate::query::Query;
use crate::tags::{TagInput, Tags};
use crate::visualization::Visualization;
use crate::widget::Widget;
use crate::JsonMap;
use serde_json::Value;
use std::collections::BTreeSet;

/// A named, slug-addressed collection of widgets.
///
/// `queries` holds every distinct query whose visualizations the widgets
/// display. Queries and widgets are kept in [`SortKey`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Remote id, absent until materialized.
    pub id: Option<i64>,
    /// Stable human-assigned key; the update lookup key.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Tag set.
    pub tags: Tags,
    widgets: Vec<Widget>,
    queries: Vec<Query>,
}

impl Dashboard {
    /// Creates an empty dashboard named after its slug.
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            id: None,
            name: slug.clone(),
            slug,
            tags: Tags::new(),
            widgets: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds tags.
    pub fn with_tags(mut self, tags: impl Into<TagInput>) -> Self {
        self.tags.add(tags);
        self
    }

    /// Sets the remote id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Adds a widget.
    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.add_widget(widget);
        self
    }

    /// Adds a query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.add_query(query);
        self
    }

    /// Adds tags. See [`Tags::add`].
    pub fn add_tags(&mut self, tags: impl Into<TagInput>) -> &mut Self {
        self.tags.add(tags);
        self
    }

    /// Removes tags. See [`Tags::remove`].
    pub fn remove_tags(&mut self, tags: impl Into<TagInput>) -> &mut Self {
        self.tags.remove(tags);
        self
    }

    /// Returns the widgets in order.
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Returns the distinct queries in order.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Adds a widget, keeping order.
    pub fn add_widget(&mut self, widget: Widget) {
        self.widgets.push(widget);
        self.widgets.sort_by_key(Widget::sort_key);
    }

    /// Adds a query, keeping order. An identified query replaces any query
    /// already held under the same id.
    pub fn add_query(&mut self, query: Query) {
        match query.id {
            Some(id) => match self.queries.iter_mut().find(|q| q.id == Some(id)) {
                Some(existing) => *existing = query,
                None => self.queries.push(query),
            },
            None => self.queries.push(query),
        }
        self.queries.sort_by_key(Query::sort_key);
    }

    /// Replaces every widget.
    pub fn set_widgets(&mut self, mut widgets: Vec<Widget>) {
        widgets.sort_by_key(Widget::sort_key);
        self.widgets = widgets;
    }

    /// Replaces every query.
    pub fn set_queries(&mut self, mut queries: Vec<Query>) {
        queries.sort_by_key(Query::sort_key);
        self.queries = queries;
    }

    /// Returns the ordering key.
    pub fn sort_key(&self) -> SortKey {
        sort_key(self.id)
    }

    /// Returns the remote path of this dashboard by id.
    pub fn path(&self) -> String {
        EntityKind::Dashboard.path(self.id)
    }

    /// Returns the remote path of this dashboard by slug.
    pub fn slug_path(&self) -> String {
        format!("{}/{}", EntityKind::Dashboard.collection(), self.slug)
    }

    /// Finds the query owning the given visualization.
    pub fn query_for_visualization(&self, visualization_id: i64) -> Option<&Query> {
        self.queries.iter().find(|q| {
            q.visualizations()
                .iter()
                .any(|v| v.id == Some(visualization_id))
        })
    }

    /// Checks that every widget reference resolves through `queries`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DanglingVisualization`] for the first widget
    /// whose visualization no query owns.
    pub fn validate(&self) -> ModelResult<()> {
        let known: BTreeSet<i64> = self
            .queries
            .iter()
            .flat_map(|q| q.visualizations().iter().filter_map(|v| v.id))
            .collect();
        for widget in &self.widgets {
            if let Some(visualization_id) = widget.visualization_id {
                if !known.contains(&visualization_id) {
                    return Err(ModelError::DanglingVisualization { visualization_id });
                }
            }
        }
        Ok(())
    }

    /// Sets the same interval schedule on every query.
    pub fn set_schedule(&mut self, interval_secs: i64) -> &mut Self {
        for query in &mut self.queries {
            query.set_schedule(interval_secs);
        }
        self
    }

    /// Moves a parameter to dashboard or widget scope.
    ///
    /// Only widgets that already map `name` are touched.
    pub fn change_parameter_level(
        &mut self,
        name: &str,
        level: ParameterLevel,
        title: Option<&str>,
    ) -> ModelResult<&mut Self> {
        let mapping = ParameterMapping::at_level(name, level, title);
        for widget in self.widgets.iter_mut().filter(|w| w.maps_parameter(name)) {
            widget.set_parameter_mapping(&mapping)?;
        }
        Ok(self)
    }

    /// Serializes to a nested map with widgets and queries inlined.
    pub fn to_map(&self, excluding: &[&str]) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("slug".into(), Value::String(self.slug.clone()));
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("tags".into(), self.tags.to_value());
        map.insert(
            "widgets".into(),
            Value::Array(
                self.widgets
                    .iter()
                    .map(|w| Value::Object(w.to_map(&[])))
                    .collect(),
            ),
        );
        map.insert(
            "queries".into(),
            Value::Array(
                self.queries
                    .iter()
                    .map(|q| Value::Object(q.to_map(&[])))
                    .collect(),
            ),
        );
        without(map, excluding)
    }

    /// Deserializes from our own map shape or the remote service's.
    ///
    /// Queries come from an explicit `queries` list and from the payloads
    /// embedded in widgets (`visualization.query`). Embedded queries are
    /// deduplicated by id and each gets exactly the distinct embedded
    /// visualizations that reference it.
    ///
    /// # Errors
    ///
    /// Fails if `slug` is absent or any nested entity fails to decode.
    pub fn from_map(map: &JsonMap) -> ModelResult<Self> {
        let fields = Fields::new(EntityKind::Dashboard, map);
        let slug = fields.req_string("slug")?;
        let widget_maps = fields.objects("widgets")?;

        let widgets = widget_maps
            .iter()
            .map(|w| Widget::from_map(w))
            .collect::<ModelResult<Vec<_>>>()?;

        let mut queries = fields
            .objects("queries")?
            .into_iter()
            .map(Query::from_map)
            .collect::<ModelResult<Vec<_>>>()?;

        for derived in derive_queries(&widget_maps)? {
            let known = derived.id.is_some() && queries.iter().any(|q| q.id == derived.id);
            if !known {
                queries.push(derived);
            }
        }

        let mut dashboard = Self {
            id: fields.opt_i64("id")?,
            name: fields.opt_string("name")?.unwrap_or_else(|| slug.clone()),
            slug,
            tags: fields.tags("tags")?,
            widgets: Vec::new(),
            queries: Vec::new(),
        };
        dashboard.set_widgets(widgets);
        dashboard.set_queries(queries);
        Ok(dashboard)
    }
}

/// Rebuilds queries from widgets that embed `visualization.query`.
fn derive_queries(widget_maps: &[&JsonMap]) -> ModelResult<Vec<Query>> {
    let mut queries: Vec<Query> = Vec::new();
    let mut visualizations: Vec<Visualization> = Vec::new();

    for widget in widget_maps {
        let Some(Value::Object(embedded)) = widget.get("visualization") else {
            continue;
        };
        let Some(Value::Object(query_map)) = embedded.get("query") else {
            continue;
        };

        let mut query = Query::from_map(query_map)?;
        query.set_visualizations(Vec::new());

        let mut vis_map = embedded.clone();
        vis_map.insert("query_id".into(), Value::from(query.id));
        let visualization = Visualization::from_map(&vis_map)?;

        let duplicate = visualization.id.is_some()
            && visualizations
                .iter()
                .any(|v| v.id == visualization.id && v.query_id == visualization.query_id);
        if !duplicate {
            visualizations.push(visualization);
        }
        if !queries.iter().any(|q| q.id == query.id) {
            queries.push(query);
        }
    }

    for query in &mut queries {
        let query_id = query.id;
        for visualization in visualizations.iter().filter(|v| v.query_id == query_id) {
            query.add_visualization(visualization.clone());
        }
    }
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::MappingScope;
    use serde_json::json;

    fn remote_dashboard() -> JsonMap {
        let query = |id: i64| json!({"id": id, "data_source_id": 1, "query": format!("select {id}")});
        json!({
            "id": 1,
            "slug": "sales",
            "name": "Sales",
            "tags": ["finance"],
            "is_archived": false,
            "widgets": [
                {"id": 13, "dashboard_id": 1, "text": "", "width": 1, "options": {},
                 "visualization": {"id": 102, "type": "CHART", "name": "c", "options": {}, "query": query(20)}},
                {"id": 11, "dashboard_id": 1, "text": "", "width": 1, "options": {},
                 "visualization": {"id": 101, "type": "TABLE", "name": "t", "options": {}, "query": query(20)}},
                {"id": 12, "dashboard_id": 1, "text": "## Notes", "width": 2, "options": {}},
                {"id": 14, "dashboard_id": 1, "text": "", "width": 1, "options": {},
                 "visualization": {"id": 100, "type": "TABLE", "name": "t", "options": {}, "query": query(10)}},
                {"id": 15, "dashboard_id": 1, "text": "", "width": 1, "options": {},
                 "visualization": {"id": 100, "type": "TABLE", "name": "t", "options": {}, "query": query(10)}}
            ]
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn reconstructs_queries_from_widgets() {
        let dashboard = Dashboard::from_map(&remote_dashboard()).unwrap();

        let widget_ids: Vec<_> = dashboard.widgets().iter().map(|w| w.id).collect();
        assert_eq!(widget_ids, vec![Some(11), Some(12), Some(13), Some(14), Some(15)]);

        let query_ids: Vec<_> = dashboard.queries().iter().map(|q| q.id).collect();
        assert_eq!(query_ids, vec![Some(10), Some(20)]);

        let q10 = &dashboard.queries()[0];
        let vis: Vec<_> = q10.visualizations().iter().map(|v| v.id).collect();
        assert_eq!(vis, vec![Some(100)]);

        let q20 = &dashboard.queries()[1];
        let vis: Vec<_> = q20.visualizations().iter().map(|v| v.id).collect();
        assert_eq!(vis, vec![Some(101), Some(102)]);
        assert!(q20.visualizations().iter().all(|v| v.query_id == Some(20)));

        assert!(dashboard.validate().is_ok());
    }

    #[test]
    fn name_defaults_to_slug() {
        let map = json!({"slug": "ops"}).as_object().cloned().unwrap();
        let dashboard = Dashboard::from_map(&map).unwrap();
        assert_eq!(dashboard.name, "ops");
        assert!(dashboard.queries().is_empty());
    }

    #[test]
    fn map_roundtrip() {
        let dashboard = Dashboard::from_map(&remote_dashboard()).unwrap();
        let again = Dashboard::from_map(&dashboard.to_map(&[])).unwrap();
        assert_eq!(again, dashboard);
    }

    #[test]
    fn dangling_reference_fails_validation() {
        let dashboard = Dashboard::new("x").with_widget(Widget::for_visualization(5));
        assert!(matches!(
            dashboard.validate(),
            Err(ModelError::DanglingVisualization {
                visualization_id: 5
            })
        ));
    }

    #[test]
    fn add_query_deduplicates_by_id() {
        let mut dashboard = Dashboard::new("x");
        dashboard.add_query(Query::new(1, "select 1").with_id(3));
        dashboard.add_query(Query::new(1, "select 2").with_id(3));
        dashboard.add_query(Query::new(1, "select 3"));
        dashboard.add_query(Query::new(1, "select 4").with_id(1));
        let ids: Vec<_> = dashboard.queries().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![Some(1), Some(3), None]);
        assert_eq!(dashboard.queries()[1].sql, "select 2");
    }

    #[test]
    fn schedule_applies_to_every_query() {
        let mut dashboard = Dashboard::from_map(&remote_dashboard()).unwrap();
        dashboard.set_schedule(600);
        assert!(dashboard
            .queries()
            .iter()
            .all(|q| q.schedule.as_ref().and_then(|s| s.interval) == Some(600)));
    }

    #[test]
    fn parameter_level_only_touches_mapping_widgets() {
        let mut options = JsonMap::new();
        options.insert(
            "parameterMappings".into(),
            json!({"region": {"name": "region", "type": "widget-level", "mapTo": "region", "title": ""}}),
        );
        let mut dashboard = Dashboard::new("x")
            .with_widget(Widget::for_visualization(1).with_id(1).with_options(options))
            .with_widget(Widget::text_block("hello").with_id(2));

        dashboard
            .change_parameter_level("region", ParameterLevel::Dashboard, Some("Region"))
            .unwrap();

        let mapping = dashboard.widgets()[0]
            .parameter_mapping("region")
            .unwrap()
            .unwrap();
        assert_eq!(mapping.scope, MappingScope::DashboardLevel);
        assert_eq!(mapping.title, "Region");
        assert!(!dashboard.widgets()[1].maps_parameter("region"));
    }
}
