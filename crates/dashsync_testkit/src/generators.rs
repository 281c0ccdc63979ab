//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity graphs that maintain the
//! model invariants: children sorted, visualizations stamped with their
//! query id, and widget references resolvable through dashboard queries.

use dashsync_model::{Dashboard, JsonMap, Query, Schedule, Tags, Visualization, Widget};
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;

/// Strategy for generating valid tags.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,11}").expect("Invalid regex")
}

/// Strategy for generating tag sets.
pub fn tags_strategy() -> impl Strategy<Value = Tags> {
    prop::collection::vec(tag_strategy(), 0..5).prop_map(|tags| tags.into_iter().collect())
}

/// Strategy for generating display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,15}").expect("Invalid regex")
}

/// Strategy for generating dashboard slugs.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating opaque option maps with scalar values.
pub fn options_strategy() -> impl Strategy<Value = JsonMap> {
    let scalar = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::String),
    ];
    prop::collection::btree_map("[a-z][a-zA-Z]{0,7}", scalar, 0..4)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for generating optional schedules.
pub fn schedule_strategy() -> impl Strategy<Value = Option<Schedule>> {
    prop::option::of(
        (
            prop::option::of(60i64..604_800),
            prop::option::of(prop::sample::select(vec!["Monday", "Friday"])),
            prop::option::of("[0-2][0-9]:[0-5][0-9]"),
        )
            .prop_map(|(interval, day, time)| Schedule {
                interval,
                day_of_week: day.map(str::to_string),
                time,
                until: None,
            }),
    )
}

/// Strategy for generating a visualization with the given id.
pub fn visualization_strategy(id: Option<i64>) -> impl Strategy<Value = Visualization> {
    (
        prop::sample::select(vec!["TABLE", "CHART", "COUNTER", "PIVOT"]),
        name_strategy(),
        options_strategy(),
    )
        .prop_map(move |(kind, name, options)| {
            let visualization = Visualization::new(kind)
                .with_name(name)
                .with_options(options);
            match id {
                Some(id) => visualization.with_id(id),
                None => visualization,
            }
        })
}

/// Strategy for generating a query with the given id and visualization ids.
pub fn query_with_ids_strategy(
    id: Option<i64>,
    visualization_ids: Vec<Option<i64>>,
) -> impl Strategy<Value = Query> {
    let visualizations: Vec<_> = visualization_ids
        .into_iter()
        .map(visualization_strategy)
        .collect();
    (
        1i64..5,
        "select [a-z_]{1,10} from [a-z_]{1,10}",
        name_strategy(),
        tags_strategy(),
        options_strategy(),
        schedule_strategy(),
        visualizations,
    )
        .prop_map(
            move |(data_source_id, sql, name, tags, options, schedule, visualizations)| {
                let mut query = Query::new(data_source_id, sql)
                    .with_name(name)
                    .with_tags(&tags)
                    .with_options(options);
                query.schedule = schedule;
                if let Some(id) = id {
                    query.set_id(Some(id));
                }
                for visualization in visualizations {
                    query.add_visualization(visualization);
                }
                query
            },
        )
}

/// Strategy for generating standalone queries, identified or not.
pub fn query_strategy() -> impl Strategy<Value = Query> {
    (
        prop::option::of(1i64..10_000),
        prop::collection::btree_set(1i64..10_000, 0..4),
        0usize..2,
    )
        .prop_flat_map(|(id, ids, unidentified)| {
            let mut visualization_ids: Vec<Option<i64>> = ids.into_iter().map(Some).collect();
            visualization_ids.extend(std::iter::repeat(None).take(unidentified));
            query_with_ids_strategy(id, visualization_ids)
        })
}

/// Strategy for generating a widget showing the given visualization, or a
/// text block when `None`.
pub fn widget_strategy(visualization_id: Option<i64>) -> impl Strategy<Value = Widget> {
    (
        prop::option::of(1i64..10_000),
        1i64..5,
        options_strategy(),
        "[A-Za-z][A-Za-z ]{0,20}",
    )
        .prop_map(move |(id, width, options, text)| {
            let widget = match visualization_id {
                Some(vid) => Widget::for_visualization(vid),
                None => Widget::text_block(text),
            }
            .with_width(width)
            .with_options(options);
            match id {
                Some(id) => widget.with_id(id),
                None => widget,
            }
        })
}

/// Strategy for generating valid dashboards.
///
/// Queries and visualizations get distinct ids. Every widget shows one of
/// the dashboard's visualizations or is a text block, so
/// [`Dashboard::validate`] holds.
pub fn dashboard_strategy() -> impl Strategy<Value = Dashboard> {
    (1usize..4, prop::collection::vec(0usize..4, 1..4))
        .prop_flat_map(|(query_count, per_query)| {
            let mut next = 1i64;
            let mut queries = Vec::new();
            let mut visualization_ids = BTreeSet::new();
            for q in 0..query_count {
                let query_id = 1_000 + q as i64;
                let count = per_query.get(q).copied().unwrap_or(1);
                let ids: Vec<Option<i64>> = (0..count)
                    .map(|_| {
                        next += 1;
                        visualization_ids.insert(next);
                        Some(next)
                    })
                    .collect();
                queries.push(query_with_ids_strategy(Some(query_id), ids));
            }

            let mut targets: Vec<Option<i64>> = visualization_ids.into_iter().map(Some).collect();
            targets.push(None);
            let widgets = prop::collection::vec(
                prop::sample::select(targets).prop_flat_map(widget_strategy),
                0..6,
            );

            (
                slug_strategy(),
                prop::option::of(name_strategy()),
                tags_strategy(),
                prop::option::of(1i64..10_000),
                queries,
                widgets,
            )
        })
        .prop_map(|(slug, name, tags, id, queries, widgets)| {
            let mut dashboard = Dashboard::new(slug).with_tags(&tags);
            if let Some(name) = name {
                dashboard.name = name;
            }
            dashboard.id = id;
            dashboard.set_queries(queries);
            dashboard.set_widgets(widgets);
            dashboard
        })
}

/// Strategy for generating dynamic tag input that must be rejected.
pub fn invalid_tag_value_strategy() -> impl Strategy<Value = Value> {
    let bad = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1.0e6f64..1.0e6)
            .prop_filter("must not be integral", |f| f.fract() != 0.0)
            .prop_map(|f| serde_json::json!(f)),
        Just(serde_json::json!({"tag": "x"})),
    ];
    (bad, prop::collection::vec(tag_strategy(), 0..3)).prop_map(|(bad, good)| {
        let mut items: Vec<Value> = good.into_iter().map(Value::String).collect();
        items.push(bad);
        Value::Array(items)
    })
}
