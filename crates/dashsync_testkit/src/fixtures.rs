//! Entity graph fixtures.
//!
//! Local definitions carry the ids of the service they were exported
//! from, as a loaded document would. Those ids never exist on a fresh
//! [`InMemoryRemoteStore`].

use dashsync_model::{Dashboard, JsonMap, Query, Visualization, Widget};
use dashsync_remote::InMemoryRemoteStore;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Data source used by every fixture query.
pub const DATA_SOURCE_ID: i64 = 1;

/// Converts a JSON object literal into a map.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn json_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// An empty remote with one editable and one view-only data source.
///
/// Ids start at 1000 so they never collide with fixture ids.
pub fn memory_store() -> InMemoryRemoteStore {
    InMemoryRemoteStore::new()
        .with_id_base(1000)
        .with_data_source(DATA_SOURCE_ID, "warehouse", false)
        .with_data_source(2, "finance", true)
}

/// Creates a temporary directory for documents.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// A parameterized revenue query with a table and a chart.
///
/// Local ids: query 10, visualizations 100 and 101.
pub fn revenue_query() -> Query {
    Query::new(
        DATA_SOURCE_ID,
        "select day, sum(amount) from orders where region = '{{ region }}' group by day",
    )
    .with_id(10)
    .with_name("Revenue")
    .with_tags(["finance", "daily"])
    .with_options(json_map(json!({
        "parameters": [
            {"name": "region", "title": "Region", "type": "text", "value": "emea"},
            {"name": "since", "title": "Since", "type": "date", "value": "d_now"}
        ]
    })))
    .with_visualization(Visualization::new("TABLE").with_id(100).with_name("Table"))
    .with_visualization(
        Visualization::new("CHART")
            .with_id(101)
            .with_name("Revenue by day")
            .with_options(json_map(json!({"globalSeriesType": "line"}))),
    )
}

/// A signups query with a single counter.
///
/// Local ids: query 11, visualization 110.
pub fn signups_query() -> Query {
    Query::new(
        DATA_SOURCE_ID,
        "select count(*) from users where region = '{{ region }}'",
    )
    .with_id(11)
    .with_name("Signups")
    .with_visualization(
        Visualization::new("COUNTER")
            .with_id(110)
            .with_name("Signups")
            .with_options(json_map(json!({"counterColName": "count"}))),
    )
}

/// A dashboard over [`revenue_query`] and [`signups_query`].
///
/// Widgets: the revenue chart, the signups counter and a text block.
/// The chart widget maps the `region` parameter.
pub fn sales_dashboard() -> Dashboard {
    let chart = Widget::for_visualization(101)
        .with_id(1)
        .with_width(2)
        .with_options(json_map(json!({
            "position": {"col": 0, "row": 0, "sizeX": 6, "sizeY": 8},
            "parameterMappings": {
                "region": {"name": "region", "type": "widget-level", "mapTo": "region", "title": ""}
            }
        })));
    let counter = Widget::for_visualization(110)
        .with_id(2)
        .with_options(json_map(json!({"position": {"col": 0, "row": 8}})));
    let notes = Widget::text_block("Figures exclude refunds").with_id(3);

    Dashboard::new("sales")
        .with_name("Sales")
        .with_tags("report")
        .with_id(7)
        .with_query(revenue_query())
        .with_query(signups_query())
        .with_widget(chart)
        .with_widget(counter)
        .with_widget(notes)
}

/// A dashboard as the remote service returns it: widgets embed their
/// visualization and its query, and no query list is given.
pub fn remote_dashboard_map() -> JsonMap {
    let query = json!({"id": 40, "data_source_id": 1, "query": "select 1", "name": "One"});
    json_map(json!({
        "id": 9,
        "slug": "ops",
        "name": "Operations",
        "tags": ["ops"],
        "is_archived": false,
        "can_edit": true,
        "widgets": [
            {
                "id": 3,
                "dashboard_id": 9,
                "width": 1,
                "options": {},
                "visualization": {"id": 401, "type": "CHART", "name": "Trend", "options": {}, "query": query.clone()}
            },
            {
                "id": 2,
                "dashboard_id": 9,
                "width": 1,
                "options": {},
                "visualization": {"id": 400, "type": "TABLE", "name": "Table", "options": {}, "query": query.clone()}
            },
            {
                "id": 4,
                "dashboard_id": 9,
                "width": 1,
                "options": {},
                "visualization": {"id": 400, "type": "TABLE", "name": "Table", "options": {}, "query": query.clone()}
            },
            {"id": 1, "dashboard_id": 9, "width": 2, "text": "Status", "options": {}}
        ]
    }))
}
