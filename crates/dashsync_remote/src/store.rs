//! The remote store capability consumed by the sync engine.

use crate::error::{RemoteError, RemoteResult};
use crate::JsonMap;
use serde_json::Value;
use std::sync::Arc;

/// A remote service addressed by path strings.
///
/// Paths are relative to the service's API root, e.g. `queries/12` or
/// `dashboards/sales`. Every call is a blocking round trip.
///
/// # Implementors
///
/// - [`crate::HttpRemoteStore`] - over a pluggable HTTP client
/// - [`crate::InMemoryRemoteStore`] - simulated service for testing
pub trait RemoteStore: Send + Sync {
    /// Fetches one record.
    ///
    /// # Errors
    ///
    /// Fails with a transport error on a non-success status, or if the
    /// response is not an object.
    fn get(&self, path: &str) -> RemoteResult<JsonMap>;

    /// Fetches every record of a collection, following pagination.
    ///
    /// # Errors
    ///
    /// Fails with [`RemoteError::UnexpectedShape`] if the response is
    /// neither a flat list nor a paged envelope.
    fn get_all(&self, path: &str) -> RemoteResult<Vec<JsonMap>>;

    /// Creates a record, returning the remote representation.
    fn create(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap>;

    /// Updates a record, returning the remote representation.
    fn update(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap>;

    /// Deletes a record, optionally sending a body.
    fn delete(&self, path: &str, body: Option<&JsonMap>) -> RemoteResult<JsonMap>;
}

impl<S: RemoteStore + ?Sized> RemoteStore for &S {
    fn get(&self, path: &str) -> RemoteResult<JsonMap> {
        (**self).get(path)
    }

    fn get_all(&self, path: &str) -> RemoteResult<Vec<JsonMap>> {
        (**self).get_all(path)
    }

    fn create(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        (**self).create(path, body)
    }

    fn update(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        (**self).update(path, body)
    }

    fn delete(&self, path: &str, body: Option<&JsonMap>) -> RemoteResult<JsonMap> {
        (**self).delete(path, body)
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    fn get(&self, path: &str) -> RemoteResult<JsonMap> {
        (**self).get(path)
    }

    fn get_all(&self, path: &str) -> RemoteResult<Vec<JsonMap>> {
        (**self).get_all(path)
    }

    fn create(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        (**self).create(path, body)
    }

    fn update(&self, path: &str, body: &JsonMap) -> RemoteResult<JsonMap> {
        (**self).update(path, body)
    }

    fn delete(&self, path: &str, body: Option<&JsonMap>) -> RemoteResult<JsonMap> {
        (**self).delete(path, body)
    }
}

/// Flattens a listing response into records.
///
/// A flat list is returned as is. A paged envelope (`count`, `page_size`,
/// `results`) is followed through `ceil(count / page_size)` pages, calling
/// `fetch_page` for pages 2 and up.
///
/// # Errors
///
/// Returns [`RemoteError::UnexpectedShape`] for any other shape, including
/// non-object list items.
pub fn collect_pages(
    first: Value,
    mut fetch_page: impl FnMut(u64) -> RemoteResult<Value>,
) -> RemoteResult<Vec<JsonMap>> {
    match first {
        Value::Array(items) => into_records(items),
        Value::Object(envelope) => {
            let count = envelope_u64(&envelope, "count")?;
            let page_size = envelope_u64(&envelope, "page_size")?;
            if page_size == 0 {
                return Err(RemoteError::UnexpectedShape(
                    "paged envelope with page_size 0".into(),
                ));
            }
            let pages = count.div_ceil(page_size);

            let mut records = into_records(envelope_results(Value::Object(envelope))?)?;
            for page in 2..=pages {
                records.extend(into_records(envelope_results(fetch_page(page)?)?)?);
            }
            Ok(records)
        }
        other => Err(RemoteError::UnexpectedShape(format!(
            "expected a list or a paged envelope, got {}",
            type_name(&other)
        ))),
    }
}

fn envelope_u64(envelope: &JsonMap, key: &str) -> RemoteResult<u64> {
    envelope
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| RemoteError::UnexpectedShape(format!("paged envelope without `{key}`")))
}

fn envelope_results(page: Value) -> RemoteResult<Vec<Value>> {
    match page {
        Value::Object(mut envelope) => match envelope.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(RemoteError::UnexpectedShape(
                "paged envelope without `results` list".into(),
            )),
        },
        other => Err(RemoteError::UnexpectedShape(format!(
            "expected a page object, got {}",
            type_name(&other)
        ))),
    }
}

fn into_records(items: Vec<Value>) -> RemoteResult<Vec<JsonMap>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(RemoteError::UnexpectedShape(format!(
                "expected an object record, got {}",
                type_name(&other)
            ))),
        })
        .collect()
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
