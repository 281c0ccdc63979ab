//! HTTP remote store.
//!
//! The actual HTTP client is abstracted via a trait so the store can run
//! over any library (reqwest, ureq, hyper) or a test double.

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::store::{collect_pages, type_name, RemoteStore};
use crate::JsonMap;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// HTTP method used by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// POST (create and update).
    Post,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Request timeout.
    pub timeout: Duration,
}

/// A response returned by the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual transport. The client owns
/// connection reuse; the store issues one request at a time.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// Returns `Err` only when no response was received.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// A [`RemoteStore`] speaking JSON over HTTP.
///
/// Creates and updates are both `POST`, following the remote service's
/// convention.
pub struct HttpRemoteStore<C: HttpClient> {
    config: RemoteConfig,
    client: C,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates a store for the configured service.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: RemoteConfig, client: C) -> RemoteResult<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn request(&self, method: Method, path: &str, body: Option<&JsonMap>) -> RemoteResult<Value> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| RemoteError::Decode(format!("failed to encode request: {e}")))?;

        let request = HttpRequest {
            method,
            url: self.config.api_url(path),
            headers: vec![
                ("Authorization".into(), self.config.authorization()),
                ("Content-Type".into(), "application/json".into()),
            ],
            body,
            timeout: self.config.timeout,
        };
        debug!(method = %method, url = %request.url, "remote request");

        let response = self
            .client
            .execute(&request)
            .map_err(RemoteError::unreachable)?;

        if !response.is_success() {
            let message = String::from_utf8_lossy(&response.body);
            return Err(RemoteError::status(
                response.status,
                format!("{method} {} failed: {}", request.url, truncate(&message, 200)),
            ));
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| RemoteError::Decode(format!("{method} {}: {e}", request.url)))
    }
}

impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    fn get(&self, path: &str) -> RemoteResult<JsonMap> {
        match self.request(Method::Get, path, None)? {
            Value::Object(map) => Ok(map),
            other => Err(RemoteError::UnexpectedShape(format!(
                "GET {path}: expected an object, got {}",
                type_name(&other)
            ))),
        }
    }

    fn get_all(&self, path: &str) -> RemoteResult<Vec<JsonMap>> {
        let first = self.request(Method::Get, path, None)?;
        let separator = if path.contains('?') { '&' } else { '?' };
        collect_pages(first, |page| {
            self.request(Method::Get, &format!("{path}{separator}page={page}"), None)
        })
    }

    fn create(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        object_or_empty(path, self.request(Method::Post, path, Some(body))?)
    }

    fn update(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        object_or_empty(path, self.request(Method::Post, path, Some(body))?)
    }

    fn delete(&self, path: &str, body: Option<&JsonMap>) -> RemoteResult<JsonMap> {
        object_or_empty(path, self.request(Method::Delete, path, body)?)
    }
}

fn object_or_empty(path: &str, value: Value) -> RemoteResult<JsonMap> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonMap::new()),
        other => Err(RemoteError::UnexpectedShape(format!(
            "{path}: expected an object, got {}",
            type_name(&other)
        ))),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestClient {
        responses: RwLock<HashMap<String, HttpResponse>>,
        requests: RwLock<Vec<HttpRequest>>,
    }

    impl TestClient {
        fn respond(&self, url: &str, response: HttpResponse) {
            self.responses.write().insert(url.to_string(), response);
        }
    }

    impl HttpClient for TestClient {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.requests.write().push(request.clone());
            self.responses
                .read()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| "connection refused".into())
        }
    }

    fn store() -> HttpRemoteStore<TestClient> {
        HttpRemoteStore::new(
            RemoteConfig::new("https://redash.test", "abc"),
            TestClient::default(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_unusable_config() {
        let result = HttpRemoteStore::new(RemoteConfig::new("https://redash.test", ""), TestClient::default());
        assert!(matches!(result, Err(RemoteError::Config(_))));
    }

    #[test]
    fn get_sends_auth_header() {
        let store = store();
        store.client().respond(
            "https://redash.test/api/queries/1",
            HttpResponse::json(200, &json!({"id": 1})),
        );

        let record = store.get("queries/1").unwrap();
        assert_eq!(record["id"], json!(1));

        let requests = store.client().requests.read();
        assert_eq!(requests[0].method, Method::Get);
        assert!(requests[0]
            .headers
            .contains(&("Authorization".to_string(), "Key abc".to_string())));
    }

    #[test]
    fn non_success_is_transport_error() {
        let store = store();
        store.client().respond(
            "https://redash.test/api/dashboards/x",
            HttpResponse::new(404, "not found"),
        );
        let err = store.get("dashboards/x").unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn unreachable_is_transport_error_without_status() {
        let err = store().get("queries/9").unwrap_err();
        assert!(matches!(err, RemoteError::Transport { status: None, .. }));
    }

    #[test]
    fn undecodable_body() {
        let store = store();
        store.client().respond(
            "https://redash.test/api/queries/1",
            HttpResponse::new(200, "<html>"),
        );
        assert!(matches!(
            store.get("queries/1"),
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn get_all_follows_pages() {
        let store = store();
        store.client().respond(
            "https://redash.test/api/queries",
            HttpResponse::json(
                200,
                &json!({"count": 3, "page_size": 2, "page": 1, "results": [{"id": 1}, {"id": 2}]}),
            ),
        );
        store.client().respond(
            "https://redash.test/api/queries?page=2",
            HttpResponse::json(
                200,
                &json!({"count": 3, "page_size": 2, "page": 2, "results": [{"id": 3}]}),
            ),
        );

        let records = store.get_all("queries").unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn post_body_and_empty_delete() {
        let store = store();
        store.client().respond(
            "https://redash.test/api/widgets",
            HttpResponse::json(200, &json!({"id": 5, "width": 1})),
        );
        store.client().respond(
            "https://redash.test/api/widgets/5",
            HttpResponse::new(200, ""),
        );

        let mut body = JsonMap::new();
        body.insert("width".into(), json!(1));
        assert_eq!(store.create("widgets", &body).unwrap()["id"], json!(5));
        assert!(store.delete("widgets/5", None).unwrap().is_empty());

        let requests = store.client().requests.read();
        assert_eq!(requests[0].method, Method::Post);
        let sent: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, json!({"width": 1}));
        assert_eq!(requests[1].method, Method::Delete);
        assert!(requests[1].body.is_none());
    }
}
