//! Visualizations.

use crate::error::ModelResult;
use crate::fields::{without, Fields};
use crate::kind::{sort_key, EntityKind, SortKey};
use crate::JsonMap;
use serde_json::Value;

/// Name given to visualizations declared without one.
pub const DEFAULT_VISUALIZATION_NAME: &str = "New Visualization";

/// A named chart or table configuration attached to exactly one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    /// Remote id, absent until materialized.
    pub id: Option<i64>,
    /// Id of the owning query.
    pub query_id: Option<i64>,
    /// Chart kind tag (for example `TABLE` or `CHART`).
    pub kind: String,
    /// Opaque rendering options.
    pub options: JsonMap,
    /// Display name.
    pub name: String,
}

impl Visualization {
    /// Creates an unidentified visualization of the given chart kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            query_id: None,
            kind: kind.into(),
            options: JsonMap::new(),
            name: DEFAULT_VISUALIZATION_NAME.to_string(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the rendering options.
    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Sets the remote id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns the ordering key.
    pub fn sort_key(&self) -> SortKey {
        sort_key(self.id)
    }

    /// Returns the remote path of this visualization.
    pub fn path(&self) -> String {
        EntityKind::Visualization.path(self.id)
    }

    /// Returns true if both visualizations render the same way.
    pub fn matches(&self, other: &Visualization) -> bool {
        self.kind == other.kind && self.options == other.options
    }

    /// Serializes to the remote wire shape.
    pub fn to_map(&self, excluding: &[&str]) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("query_id".into(), Value::from(self.query_id));
        map.insert("type".into(), Value::String(self.kind.clone()));
        map.insert("options".into(), Value::Object(self.options.clone()));
        map.insert("name".into(), Value::String(self.name.clone()));
        without(map, excluding)
    }

    /// Deserializes from the remote wire shape.
    ///
    /// # Errors
    ///
    /// Fails if `type` is absent or a declared field has the wrong type.
    pub fn from_map(map: &JsonMap) -> ModelResult<Self> {
        let fields = Fields::new(EntityKind::Visualization, map);
        Ok(Self {
            id: fields.opt_i64("id")?,
            query_id: fields.opt_i64("query_id")?,
            kind: fields.req_string("type")?,
            options: fields.map("options")?,
            name: fields
                .opt_string("name")?
                .unwrap_or_else(|| DEFAULT_VISUALIZATION_NAME.to_string()),
        })
    }
}
