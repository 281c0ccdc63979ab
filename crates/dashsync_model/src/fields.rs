//! Typed field access over JSON maps.

use crate::error::{ModelError, ModelResult};
use crate::kind::EntityKind;
use crate::tags::Tags;
use crate::JsonMap;
use serde_json::Value;

/// Reads declared fields of one entity out of a JSON map.
///
/// Unknown keys are never looked at; `null` reads the same as an absent key.
pub(crate) struct Fields<'a> {
    entity: EntityKind,
    map: &'a JsonMap,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(entity: EntityKind, map: &'a JsonMap) -> Self {
        Self { entity, map }
    }

    pub(crate) fn value(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub(crate) fn opt_i64(&self, name: &'static str) -> ModelResult<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| ModelError::invalid_field(self.entity, name, "an integer")),
        }
    }

    pub(crate) fn req_i64(&self, name: &'static str) -> ModelResult<i64> {
        self.opt_i64(name)?
            .ok_or_else(|| ModelError::missing_field(self.entity, name))
    }

    pub(crate) fn opt_string(&self, name: &'static str) -> ModelResult<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ModelError::invalid_field(self.entity, name, "a string")),
        }
    }

    pub(crate) fn req_string(&self, name: &'static str) -> ModelResult<String> {
        self.opt_string(name)?
            .ok_or_else(|| ModelError::missing_field(self.entity, name))
    }

    pub(crate) fn object(&self, name: &'static str) -> ModelResult<Option<&'a JsonMap>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ModelError::invalid_field(self.entity, name, "an object")),
        }
    }

    /// Reads an open map, defaulting to empty.
    pub(crate) fn map(&self, name: &'static str) -> ModelResult<JsonMap> {
        Ok(self.object(name)?.cloned().unwrap_or_default())
    }

    /// Reads a list of objects, defaulting to empty.
    pub(crate) fn objects(&self, name: &'static str) -> ModelResult<Vec<&'a JsonMap>> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| {
                        ModelError::invalid_field(self.entity, name, "a list of objects")
                    })
                })
                .collect(),
            Some(_) => Err(ModelError::invalid_field(
                self.entity,
                name,
                "a list of objects",
            )),
        }
    }

    pub(crate) fn tags(&self, name: &'static str) -> ModelResult<Tags> {
        self.value(name)
            .map(Tags::from_value)
            .unwrap_or_else(|| Ok(Tags::new()))
    }
}

/// Removes `excluding` keys from a freshly built map.
pub(crate) fn without(mut map: JsonMap, excluding: &[&str]) -> JsonMap {
    for key in excluding {
        map.remove(*key);
    }
    map
}
