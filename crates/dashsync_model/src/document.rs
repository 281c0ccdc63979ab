//! Persisted interchange documents.
//!
//! One pretty-printed JSON document per entity, named `<id>.json`, or
//! `<slug>.json` for dashboards. A document holds the full
//! [`Entity::to_map`] representation; dashboards may also hold the remote
//! service's embedded shape, from which queries are reconstructed on load.

use crate::dashboard::Dashboard;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::kind::EntityKind;
use crate::query::Query;
use crate::JsonMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the file name an entity is stored under.
///
/// # Errors
///
/// Fails for non-dashboard entities without an id.
pub fn document_name(entity: &Entity) -> ModelResult<String> {
    let key = match entity {
        Entity::Dashboard(d) => d.slug.clone(),
        other => other
            .id()
            .ok_or_else(|| ModelError::missing_field(other.kind(), "id"))?
            .to_string(),
    };
    Ok(format!("{key}.json"))
}

/// Renders an entity as a pretty JSON document.
///
/// Keys come out sorted because `serde_json` is built without its
/// `preserve_order` feature.
pub fn to_document(entity: &Entity) -> ModelResult<String> {
    Ok(serde_json::to_string_pretty(&Value::Object(entity.to_map(&[])))?)
}

/// Parses a document of the given kind.
pub fn from_document(kind: EntityKind, text: &str) -> ModelResult<Entity> {
    let map = parse_object(kind, text)?;
    Entity::from_map(kind, &map)
}

/// Writes an entity into `dir`, returning the document path.
pub fn write_document(dir: &Path, entity: &Entity) -> ModelResult<PathBuf> {
    let path = dir.join(document_name(entity)?);
    fs::write(&path, to_document(entity)?)?;
    Ok(path)
}

/// Loads the document named `key` from `dir`.
///
/// The key fills the `id` (or `slug` for dashboards) when the document
/// itself does not carry one.
pub fn read_document(dir: &Path, kind: EntityKind, key: &str) -> ModelResult<Entity> {
    Entity::from_map(kind, &load_map(dir, kind, key)?)
}

/// Loads a query document by id.
pub fn read_query(dir: &Path, id: i64) -> ModelResult<Query> {
    Query::from_map(&load_map(dir, EntityKind::Query, &id.to_string())?)
}

/// Loads a dashboard document by slug.
pub fn read_dashboard(dir: &Path, slug: &str) -> ModelResult<Dashboard> {
    Dashboard::from_map(&load_map(dir, EntityKind::Dashboard, slug)?)
}

fn load_map(dir: &Path, kind: EntityKind, key: &str) -> ModelResult<JsonMap> {
    let text = fs::read_to_string(dir.join(format!("{key}.json")))?;
    let mut map = parse_object(kind, &text)?;
    match kind {
        EntityKind::Dashboard => {
            map.entry("slug")
                .or_insert_with(|| Value::String(key.to_string()));
        }
        _ => {
            if let Ok(id) = key.parse::<i64>() {
                let slot = map.entry("id").or_insert(Value::Null);
                if slot.is_null() {
                    *slot = Value::from(id);
                }
            }
        }
    }
    Ok(map)
}

fn parse_object(kind: EntityKind, text: &str) -> ModelResult<JsonMap> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ModelError::invalid_field(kind, "document", "a JSON object")),
    }
}
