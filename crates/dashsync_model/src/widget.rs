//! Dashboard widgets.

use crate::error::{ModelError, ModelResult};
use crate::fields::{without, Fields};
use crate::kind::{sort_key, EntityKind, SortKey};
use crate::parameter::ParameterMapping;
use crate::JsonMap;
use serde_json::Value;

const PARAMETER_MAPPINGS: &str = "parameterMappings";

/// A dashboard cell holding static text or a reference to a visualization.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    /// Remote id, absent until materialized.
    pub id: Option<i64>,
    /// Id of the owning dashboard.
    pub dashboard_id: Option<i64>,
    /// Displayed visualization; absent for text blocks.
    pub visualization_id: Option<i64>,
    /// Inline text content. Never `Some("")`.
    pub text: Option<String>,
    /// Opaque layout options; may hold `parameterMappings`.
    pub options: JsonMap,
    /// Column span, at least 1.
    pub width: i64,
}

impl Widget {
    /// A widget displaying the given visualization.
    pub fn for_visualization(visualization_id: i64) -> Self {
        Self {
            id: None,
            dashboard_id: None,
            visualization_id: Some(visualization_id),
            text: None,
            options: JsonMap::new(),
            width: 1,
        }
    }

    /// A static text block.
    pub fn text_block(text: impl Into<String>) -> Self {
        Self {
            id: None,
            dashboard_id: None,
            visualization_id: None,
            text: normalize_text(Some(text.into())),
            options: JsonMap::new(),
            width: 1,
        }
    }

    /// Sets the layout options.
    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Sets the width. Non-positive values normalize to 1.
    pub fn with_width(mut self, width: i64) -> Self {
        self.width = normalize_width(width);
        self
    }

    /// Sets the remote id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns true if the widget shows text rather than a visualization.
    pub fn is_text(&self) -> bool {
        self.visualization_id.is_none()
    }

    /// Returns the ordering key.
    pub fn sort_key(&self) -> SortKey {
        sort_key(self.id)
    }

    /// Returns the remote path of this widget.
    pub fn path(&self) -> String {
        EntityKind::Widget.path(self.id)
    }

    /// Returns true if the widget maps the named parameter.
    pub fn maps_parameter(&self, name: &str) -> bool {
        self.options
            .get(PARAMETER_MAPPINGS)
            .and_then(Value::as_object)
            .is_some_and(|m| m.contains_key(name))
    }

    /// Reads the mapping for `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the stored entry is malformed.
    pub fn parameter_mapping(&self, name: &str) -> ModelResult<Option<ParameterMapping>> {
        self.options
            .get(PARAMETER_MAPPINGS)
            .and_then(|m| m.get(name))
            .map(|entry| serde_json::from_value(entry.clone()).map_err(ModelError::from))
            .transpose()
    }

    /// Writes a mapping under its parameter name.
    pub fn set_parameter_mapping(&mut self, mapping: &ParameterMapping) -> ModelResult<()> {
        let entry = serde_json::to_value(mapping)?;
        let mappings = self
            .options
            .entry(PARAMETER_MAPPINGS)
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !mappings.is_object() {
            *mappings = Value::Object(JsonMap::new());
        }
        if let Value::Object(m) = mappings {
            m.insert(mapping.name.clone(), entry);
        }
        Ok(())
    }

    /// Serializes to the remote wire shape.
    pub fn to_map(&self, excluding: &[&str]) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("dashboard_id".into(), Value::from(self.dashboard_id));
        map.insert("visualization_id".into(), Value::from(self.visualization_id));
        map.insert("text".into(), Value::from(self.text.clone()));
        map.insert("options".into(), Value::Object(self.options.clone()));
        map.insert("width".into(), Value::from(self.width));
        without(map, excluding)
    }

    /// Deserializes from the remote wire shape.
    ///
    /// An embedded `visualization` object supplies `visualization_id`.
    ///
    /// # Errors
    ///
    /// Fails if a declared field has the wrong type.
    pub fn from_map(map: &JsonMap) -> ModelResult<Self> {
        let fields = Fields::new(EntityKind::Widget, map);
        let visualization_id = match fields.object("visualization")? {
            Some(embedded) => Fields::new(EntityKind::Visualization, embedded).opt_i64("id")?,
            None => fields.opt_i64("visualization_id")?,
        };
        Ok(Self {
            id: fields.opt_i64("id")?,
            dashboard_id: fields.opt_i64("dashboard_id")?,
            visualization_id,
            text: normalize_text(fields.opt_string("text")?),
            options: fields.map("options")?,
            width: normalize_width(fields.opt_i64("width")?.unwrap_or(1)),
        })
    }
}

fn normalize_text(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}

fn normalize_width(width: i64) -> i64 {
    if width <= 0 {
        1
    } else {
        width
    }
}
