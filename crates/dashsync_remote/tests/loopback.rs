//! Runs the HTTP store against the in-memory service through a loopback
//! client.

use dashsync_remote::{
    Conditions, HttpClient, HttpRemoteStore, HttpRequest, HttpResponse, InMemoryRemoteStore,
    JsonMap, Method, RemoteConfig, RemoteError, RemoteStore,
};
use serde_json::{json, Value};

const BASE: &str = "https://redash.test";

struct Loopback {
    service: InMemoryRemoteStore,
}

impl HttpClient for Loopback {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let path = request
            .url
            .strip_prefix(&format!("{BASE}/api/"))
            .ok_or_else(|| format!("unknown host in {}", request.url))?;
        let body: Option<JsonMap> = request
            .body
            .as_deref()
            .map(serde_json::from_slice)
            .transpose()
            .map_err(|e| e.to_string())?;

        let result = match request.method {
            Method::Get => self.service.get(path),
            Method::Post => self.service.create(path, &body.unwrap_or_default()),
            Method::Delete => self.service.delete(path, body.as_ref()),
        };
        Ok(match result {
            Ok(map) if map.is_empty() => HttpResponse::new(200, ""),
            Ok(map) => HttpResponse::json(200, &Value::Object(map)),
            Err(e) => HttpResponse::new(e.status_code().unwrap_or(500), e.to_string()),
        })
    }
}

fn store() -> HttpRemoteStore<Loopback> {
    let service = InMemoryRemoteStore::new().with_page_size(2);
    HttpRemoteStore::new(RemoteConfig::new(BASE, "key"), Loopback { service }).unwrap()
}

fn body(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[test]
fn listings_are_followed_across_pages() {
    let store = store();
    for n in 0..5 {
        store
            .create("queries", &body(json!({"query": format!("select {n}"), "data_source_id": 1, "name": format!("q{n}")})))
            .unwrap();
    }

    let records = store.get_all("queries").unwrap();
    assert_eq!(records.len(), 5);

    let odd = Conditions::new().matches("name", "^q[13]$").unwrap();
    let names: Vec<_> = odd
        .filter(&records)
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, vec!["q1", "q3"]);
}

#[test]
fn dashboard_lifecycle() {
    let store = store();
    let created = store
        .create("dashboards", &body(json!({"name": "Weekly KPIs"})))
        .unwrap();
    assert_eq!(created["slug"], json!("weekly-kpis"));

    store
        .update("dashboards/weekly-kpis", &body(json!({"tags": ["kpi"]})))
        .unwrap();
    let fetched = store.get("dashboards/weekly-kpis").unwrap();
    assert_eq!(fetched["tags"], json!(["kpi"]));
    assert_eq!(fetched["widgets"], json!([]));

    assert!(store.delete("dashboards/weekly-kpis", None).unwrap().is_empty());
    let listed = store.get_all("dashboards").unwrap();
    assert!(listed.is_empty());
}

#[test]
fn service_errors_keep_their_status() {
    let store = store();
    let err = store.get("queries/404").unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert!(!err.is_retryable());

    store.client().service.fail_on(Method::Get, "dashboards");
    let err = store.get_all("dashboards").unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Transport {
            status: Some(500),
            ..
        }
    ));
    assert!(err.is_retryable());
}
