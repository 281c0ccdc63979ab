//! Integration tests for the sync engine over the in-memory remote.

use dashsync_engine::{SyncConfig, SyncEngine, SyncError};
use dashsync_model::document::read_dashboard;
use dashsync_model::{EntityKind, ModelError, Query, Visualization, Widget};
use dashsync_remote::{Conditions, InMemoryRemoteStore, Method, RemoteError};
use dashsync_template::{params, DashboardTemplate};
use dashsync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn engine() -> SyncEngine<InMemoryRemoteStore> {
    SyncEngine::new(SyncConfig::default(), memory_store())
}

fn visualization_ids(query: &Query) -> Vec<i64> {
    query.visualizations().iter().filter_map(|v| v.id).collect()
}

#[test]
fn query_without_visualizations_gets_remote_default() {
    let engine = engine();
    let mirror = engine
        .create_query(&Query::new(DATA_SOURCE_ID, "select 1").with_name("Ping"))
        .unwrap();

    let query_id = mirror.id.unwrap();
    assert_eq!(mirror.name, "Ping");
    assert_eq!(mirror.visualizations().len(), 1);
    assert_eq!(mirror.visualizations()[0].kind, "TABLE");
    assert_eq!(
        engine.store().visualization_ids(query_id),
        visualization_ids(&mirror)
    );
}

#[test]
fn query_visualizations_reuse_default_and_drop_extras() {
    let store = memory_store().with_extra_default_visualizations(2);
    let engine = SyncEngine::new(SyncConfig::default(), store);

    let mirror = engine.create_query(&revenue_query()).unwrap();
    let query_id = mirror.id.unwrap();

    let kinds: Vec<_> = mirror.visualizations().iter().map(|v| v.kind.as_str()).collect();
    assert_eq!(kinds, vec!["TABLE", "CHART"]);
    assert_eq!(mirror.visualizations()[1].name, "Revenue by day");
    assert!(mirror
        .visualizations()
        .iter()
        .all(|v| v.query_id == Some(query_id)));
    assert_eq!(
        engine.store().visualization_ids(query_id),
        visualization_ids(&mirror)
    );

    let stats = engine.stats();
    assert_eq!(stats.queries_created, 1);
    assert_eq!(stats.visualizations_updated, 1);
    assert_eq!(stats.visualizations_created, 1);
    assert_eq!(stats.visualizations_deleted, 2);
}

#[test]
fn query_update_reconciles_by_position() {
    let engine = engine();
    let mirror = engine.create_query(&revenue_query()).unwrap();
    let query_id = mirror.id.unwrap();
    let before = visualization_ids(&mirror);

    let mut local = mirror.clone();
    local.name = "Revenue (net)".into();
    local.set_visualizations(vec![Visualization::new("PIVOT").with_name("Pivot")]);

    let updated = engine.update_query(&local).unwrap();
    assert_eq!(updated.name, "Revenue (net)");
    assert_eq!(visualization_ids(&updated), before);
    assert_eq!(updated.visualizations()[0].kind, "PIVOT");
    assert_eq!(updated.visualizations()[1].kind, "CHART");
    assert_eq!(engine.store().visualization_ids(query_id), before);
}

#[test]
fn query_update_can_prune_stale_visualizations() {
    let config = SyncConfig::new().with_prune_stale_visualizations(true);
    let engine = SyncEngine::new(config, memory_store());
    let mirror = engine.create_query(&revenue_query()).unwrap();
    let query_id = mirror.id.unwrap();

    let mut local = mirror.clone();
    local.set_visualizations(Vec::new());

    let updated = engine.update_query(&local).unwrap();
    assert_eq!(visualization_ids(&updated), vec![visualization_ids(&mirror)[0]]);
    assert_eq!(engine.store().visualization_ids(query_id).len(), 1);
}

#[test]
fn dashboard_creation_remaps_widgets() {
    let engine = engine();
    let local = sales_dashboard();
    let mirror = engine.create_dashboard(&local).unwrap();

    assert_eq!(mirror.slug, "sales");
    assert_eq!(mirror.name, "Sales");
    assert!(mirror.tags.contains("report"));
    assert_ne!(mirror.id, local.id);
    assert!(mirror.validate().is_ok());

    assert_eq!(mirror.queries().len(), 2);
    assert!(mirror.queries().iter().all(|q| q.id.is_some()));
    assert!(mirror.queries().iter().all(|q| q.id != Some(10) && q.id != Some(11)));

    assert_eq!(mirror.widgets().len(), 3);
    let dashboard_id = mirror.id.unwrap();
    assert!(mirror
        .widgets()
        .iter()
        .all(|w| w.dashboard_id == Some(dashboard_id)));

    let chart = mirror
        .widgets()
        .iter()
        .find(|w| w.width == 2)
        .unwrap();
    let owner = mirror
        .query_for_visualization(chart.visualization_id.unwrap())
        .unwrap();
    assert_eq!(owner.name, "Revenue");
    assert_eq!(
        chart.options["parameterMappings"]["region"]["type"],
        json!("widget-level")
    );
    assert!(mirror.widgets().iter().any(Widget::is_text));
    assert_eq!(engine.store().widget_count("sales"), 3);
}

#[test]
fn dashboard_slug_collision_gets_suffix() {
    let engine = engine();
    let first = engine.create_dashboard(&sales_dashboard()).unwrap();
    let second = engine.create_dashboard(&sales_dashboard()).unwrap();

    assert_eq!(first.slug, "sales");
    assert_eq!(second.slug, "sales_1");
    assert_ne!(first.id, second.id);
}

#[test]
fn dangling_widget_is_rejected_before_any_call() {
    let engine = engine();
    let local = sales_dashboard().with_widget(Widget::for_visualization(999));

    let err = engine.create_dashboard(&local).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Model(ModelError::DanglingVisualization {
            visualization_id: 999
        })
    ));
    assert!(engine.store().calls().is_empty());
    assert!(engine.stats().last_error.is_some());
}

#[test]
fn dangling_widget_leaves_remote_dashboard_intact() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    engine.store().clear_calls();

    let local = mirror.with_widget(Widget::for_visualization(999_999).with_id(1));
    let err = engine.update_dashboard(&local).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Model(ModelError::DanglingVisualization {
            visualization_id: 999_999
        })
    ));
    assert!(engine.store().calls().is_empty());
    assert_eq!(engine.store().widget_count("sales"), 3);
}

#[test]
fn fetched_dashboard_updates_without_overwriting_defaults() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    let revenue = mirror
        .queries()
        .iter()
        .find(|q| q.name == "Revenue")
        .unwrap();
    let revenue_id = revenue.id.unwrap();
    let before: Vec<_> = revenue
        .visualizations()
        .iter()
        .map(|v| (v.id, v.kind.clone()))
        .collect();

    let fetched = engine.catalog().dashboard("sales").unwrap();
    let fetched_revenue = fetched
        .queries()
        .iter()
        .find(|q| q.id == Some(revenue_id))
        .unwrap();
    assert_eq!(fetched_revenue.visualizations().len(), 1);
    assert_eq!(fetched_revenue.visualizations()[0].kind, "CHART");

    let updated = engine.update_dashboard(&fetched).unwrap();

    let remote: Vec<_> = engine
        .catalog()
        .query(revenue_id)
        .unwrap()
        .visualizations()
        .iter()
        .map(|v| (v.id, v.kind.clone()))
        .collect();
    assert_eq!(remote, before);

    let mirrored = updated
        .queries()
        .iter()
        .find(|q| q.id == Some(revenue_id))
        .unwrap();
    let mirrored: Vec<_> = mirrored
        .visualizations()
        .iter()
        .map(|v| (v.id, v.kind.clone()))
        .collect();
    assert_eq!(mirrored, before);
    assert!(updated.validate().is_ok());
    assert_eq!(engine.store().widget_count("sales"), 3);
}

#[test]
fn dashboard_update_replaces_widgets() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    let old_widgets: Vec<_> = mirror.widgets().iter().filter_map(|w| w.id).collect();

    let mut local = mirror.clone();
    local.name = "Sales overview".into();
    let updated = engine.update_dashboard(&local).unwrap();

    assert_eq!(updated.id, mirror.id);
    assert_eq!(updated.name, "Sales overview");
    assert_eq!(updated.widgets().len(), mirror.widgets().len());
    assert!(updated
        .widgets()
        .iter()
        .all(|w| !old_widgets.contains(&w.id.unwrap())));
    assert_eq!(engine.store().widget_count("sales"), 3);

    let query_ids: Vec<_> = updated.queries().iter().map(|q| q.id).collect();
    let mirror_ids: Vec<_> = mirror.queries().iter().map(|q| q.id).collect();
    assert_eq!(query_ids, mirror_ids);

    let stats = engine.stats();
    assert_eq!(stats.dashboards_updated, 1);
    assert_eq!(stats.widgets_deleted, 3);
    assert_eq!(stats.queries_updated, 2);
}

#[test]
fn archived_dashboard_is_not_updated() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    engine.store().set_dashboard_flags("sales", true, true).unwrap();

    let err = engine.update_dashboard(&mirror).unwrap_err();
    assert!(matches!(err, SyncError::Archived { ref slug } if slug == "sales"));
    assert!(err.is_state_error());
    assert_eq!(engine.store().widget_count("sales"), 3);
}

#[test]
fn read_only_dashboard_is_not_updated() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    engine.store().set_dashboard_flags("sales", false, false).unwrap();

    let err = engine.update_dashboard(&mirror).unwrap_err();
    assert!(matches!(err, SyncError::PermissionDenied { .. }));
}

#[test]
fn missing_dashboard_is_a_transport_error() {
    let engine = engine();
    let err = engine.update_dashboard(&sales_dashboard()).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Remote(RemoteError::Transport {
            status: Some(404),
            ..
        })
    ));
}

#[test]
fn rendered_template_creates_dashboard() {
    let engine = engine();
    let template = DashboardTemplate::new(&sales_dashboard(), ["region"]).unwrap();
    let rendered = template
        .render(
            &params([("region", "apac")]),
            Some("sales-apac"),
            Some("Sales APAC"),
            Some("apac".into()),
        )
        .unwrap();

    let mirror = engine.create_dashboard(&rendered).unwrap();
    assert_eq!(mirror.slug, "sales-apac");
    assert!(mirror.tags.contains("apac"));
    assert_eq!(mirror.widgets().len(), 3);

    for query in mirror.queries() {
        let remote = engine.catalog().query(query.id.unwrap()).unwrap();
        assert!(remote.sql.contains("'apac'"));
        assert!(remote.tags.contains("apac"));
    }
}

#[test]
fn rendered_template_updates_existing_dashboard() {
    let engine = engine();
    let existing = engine.create_dashboard(&sales_dashboard()).unwrap();
    let existing_ids: Vec<_> = existing.queries().iter().filter_map(|q| q.id).collect();

    let template = DashboardTemplate::new(&sales_dashboard(), ["region"]).unwrap();
    let rendered = template
        .render(&params([("region", "latam")]), None, None, None)
        .unwrap();
    assert!(rendered.queries().iter().all(|q| q.id.is_none()));

    let updated = engine.update_dashboard(&rendered).unwrap();
    assert_eq!(updated.id, existing.id);
    assert_eq!(updated.queries().len(), 2);
    assert!(updated
        .queries()
        .iter()
        .all(|q| q.id.is_some_and(|id| !existing_ids.contains(&id))));
    assert!(updated.validate().is_ok());
    assert_eq!(engine.store().widget_count("sales"), 3);
}

#[test]
fn catalog_fetches_and_exports_dashboards() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();

    let fetched = engine.catalog().dashboard("sales").unwrap();
    assert_eq!(fetched.id, mirror.id);
    assert_eq!(fetched.widgets().len(), 3);
    assert_eq!(fetched.queries().len(), 2);
    assert!(fetched.validate().is_ok());

    let dir = temp_dir();
    let path = engine.catalog().export_dashboard("sales", dir.path()).unwrap();
    assert!(path.ends_with("sales.json"));
    assert_eq!(read_dashboard(dir.path(), "sales").unwrap(), fetched);
}

#[test]
fn catalog_filters_listings() {
    let engine = engine();
    let revenue = engine.create_query(&revenue_query()).unwrap();
    engine.create_query(&signups_query()).unwrap();

    let conditions = Conditions::new().matches("name", "^Rev").unwrap();
    let ids = engine.catalog().find_ids("queries", &conditions).unwrap();
    assert_eq!(ids, vec![revenue.id.unwrap()]);

    let sources = engine.catalog().data_sources(false).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "warehouse");
}

#[test]
fn bulk_changes_report_failed_ids() {
    let engine = engine();
    let revenue = engine.create_query(&revenue_query()).unwrap().id.unwrap();
    let signups = engine.create_query(&signups_query()).unwrap().id.unwrap();
    engine
        .store()
        .fail_on(Method::Post, format!("queries/{signups}"));

    let err = engine.tag_queries(&[revenue, signups], ["kpi", "weekly"]).unwrap_err();
    match err {
        SyncError::Aggregate { failed_ids, .. } => assert_eq!(failed_ids, vec![signups]),
        other => panic!("unexpected error: {other}"),
    }

    let tagged = engine.catalog().query(revenue).unwrap();
    let tags: Vec<_> = tagged.tags.iter().cloned().collect();
    assert_eq!(tags, vec!["kpi", "weekly"]);
}

#[test]
fn archived_queries_leave_listings() {
    let engine = engine();
    let revenue = engine.create_query(&revenue_query()).unwrap().id.unwrap();
    let signups = engine.create_query(&signups_query()).unwrap().id.unwrap();

    engine.archive_queries(&[revenue]).unwrap();
    let ids = engine.catalog().find_ids("queries", &Conditions::new()).unwrap();
    assert_eq!(ids, vec![signups]);

    engine.restore_queries(&[revenue]).unwrap();
    let ids = engine.catalog().find_ids("queries", &Conditions::new()).unwrap();
    assert_eq!(ids, vec![revenue, signups]);
}

#[test]
fn access_grants_round_trip() {
    let engine = engine();
    let mirror = engine.create_dashboard(&sales_dashboard()).unwrap();
    let id = mirror.id.unwrap();

    engine.grant_access(EntityKind::Dashboard, &[id], &[5, 6]).unwrap();
    assert_eq!(engine.store().grants("dashboards", id), vec![5, 6]);

    engine.limit_access(EntityKind::Dashboard, &[id], &[5]).unwrap();
    assert_eq!(engine.store().grants("dashboards", id), vec![6]);

    let err = engine
        .limit_access(EntityKind::Dashboard, &[id], &[5])
        .unwrap_err();
    assert!(matches!(err, SyncError::Aggregate { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn created_dashboards_stay_consistent(dashboard in dashboard_strategy()) {
        let engine = SyncEngine::new(
            SyncConfig::default(),
            InMemoryRemoteStore::new().with_id_base(100_000),
        );
        let mirror = engine.create_dashboard(&dashboard).unwrap();

        prop_assert!(mirror.validate().is_ok());
        prop_assert_eq!(mirror.queries().len(), dashboard.queries().len());
        prop_assert_eq!(mirror.widgets().len(), dashboard.widgets().len());
        for (local, remote) in dashboard.queries().iter().zip(mirror.queries()) {
            let expected = local.visualizations().len().max(1);
            prop_assert_eq!(remote.visualizations().len(), expected);
            prop_assert_eq!(
                engine.store().visualization_ids(remote.id.unwrap()).len(),
                expected
            );
        }
    }
}
