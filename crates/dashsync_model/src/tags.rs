//! Tag sets with scalar-or-nested input.

use crate::error::{ModelError, ModelResult};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// Input accepted by tag operations.
///
/// A tag is either text, an integer (stored as its decimal text), or an
/// arbitrarily nested list of those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInput {
    /// A single text tag.
    Text(String),
    /// A single integer tag.
    Integer(i64),
    /// A collection of tag inputs.
    List(Vec<TagInput>),
}

impl TagInput {
    /// Converts a dynamic JSON value into tag input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTag`] for null, booleans, floats and
    /// objects, at any nesting depth.
    pub fn from_value(value: &Value) -> ModelResult<Self> {
        match value {
            Value::String(s) => Ok(TagInput::Text(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(TagInput::Integer)
                .ok_or_else(|| ModelError::InvalidTag {
                    found: value.to_string(),
                }),
            Value::Array(items) => items
                .iter()
                .map(TagInput::from_value)
                .collect::<ModelResult<Vec<_>>>()
                .map(TagInput::List),
            _ => Err(ModelError::InvalidTag {
                found: value.to_string(),
            }),
        }
    }

    fn visit(&self, f: &mut impl FnMut(String)) {
        match self {
            TagInput::Text(s) => f(s.clone()),
            TagInput::Integer(i) => f(i.to_string()),
            TagInput::List(items) => items.iter().for_each(|item| item.visit(f)),
        }
    }
}

impl From<&str> for TagInput {
    fn from(value: &str) -> Self {
        TagInput::Text(value.to_string())
    }
}

impl From<String> for TagInput {
    fn from(value: String) -> Self {
        TagInput::Text(value)
    }
}

impl From<&String> for TagInput {
    fn from(value: &String) -> Self {
        TagInput::Text(value.clone())
    }
}

impl From<i64> for TagInput {
    fn from(value: i64) -> Self {
        TagInput::Integer(value)
    }
}

impl From<i32> for TagInput {
    fn from(value: i32) -> Self {
        TagInput::Integer(i64::from(value))
    }
}

impl<T: Into<TagInput>> From<Vec<T>> for TagInput {
    fn from(values: Vec<T>) -> Self {
        TagInput::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TagInput>, const N: usize> From<[T; N]> for TagInput {
    fn from(values: [T; N]) -> Self {
        TagInput::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeSet<String>> for TagInput {
    fn from(values: BTreeSet<String>) -> Self {
        TagInput::List(values.into_iter().map(TagInput::Text).collect())
    }
}

impl From<HashSet<String>> for TagInput {
    fn from(values: HashSet<String>) -> Self {
        TagInput::List(values.into_iter().map(TagInput::Text).collect())
    }
}

impl From<&Tags> for TagInput {
    fn from(tags: &Tags) -> Self {
        TagInput::List(tags.iter().map(TagInput::from).collect())
    }
}

/// A set of tags.
///
/// Tags can only change through [`Tags::add`] and [`Tags::remove`], both of
/// which have set semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every tag in `input`. Already present tags are left alone.
    pub fn add(&mut self, input: impl Into<TagInput>) -> &mut Self {
        input.into().visit(&mut |tag| {
            self.0.insert(tag);
        });
        self
    }

    /// Removes every tag in `input`. Absent tags are ignored.
    pub fn remove(&mut self, input: impl Into<TagInput>) -> &mut Self {
        input.into().visit(&mut |tag| {
            self.0.remove(&tag);
        });
        self
    }

    /// Returns true if `tag` is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Iterates tags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the tags as a sorted JSON list.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }

    /// Parses tags from a JSON value. Null yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTag`] if the value is not valid tag input.
    pub fn from_value(value: &Value) -> ModelResult<Self> {
        let mut tags = Tags::new();
        if !value.is_null() {
            tags.add(TagInput::from_value(value)?);
        }
        Ok(tags)
    }
}

impl<T: Into<TagInput>> FromIterator<T> for Tags {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for item in iter {
            tags.add(item);
        }
        tags
    }
}
