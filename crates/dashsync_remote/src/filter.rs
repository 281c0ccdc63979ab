//! Filtering of listed records.
//!
//! Used to look up ids (or slugs) of records matching a set of field
//! conditions, all of which must hold.

use crate::error::RemoteResult;
use crate::JsonMap;
use regex::Regex;
use serde_json::Value;

/// A predicate over one top-level field.
#[derive(Debug, Clone)]
pub enum Condition {
    /// The field equals the value exactly.
    Equals(Value),
    /// The field is a string matching the pattern anywhere.
    ///
    /// A missing field is matched as the empty string.
    Matches(Regex),
}

impl Condition {
    fn holds(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Equals(expected) => field == Some(expected),
            Condition::Matches(pattern) => match field {
                None | Some(Value::Null) => pattern.is_match(""),
                Some(Value::String(text)) => pattern.is_match(text),
                Some(_) => false,
            },
        }
    }
}

/// A conjunction of field conditions.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    predicates: Vec<(String, Condition)>,
}

impl Conditions {
    /// Creates an empty set, which every record satisfies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to equal `value`.
    #[must_use]
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates
            .push((field.into(), Condition::Equals(value.into())));
        self
    }

    /// Requires `field` to match `pattern`.
    ///
    /// # Errors
    ///
    /// Fails if the pattern does not compile.
    pub fn matches(mut self, field: impl Into<String>, pattern: &str) -> RemoteResult<Self> {
        self.predicates
            .push((field.into(), Condition::Matches(Regex::new(pattern)?)));
        Ok(self)
    }

    /// Returns the number of conditions.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns true if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns true if the record satisfies every condition.
    pub fn test(&self, record: &JsonMap) -> bool {
        self.predicates
            .iter()
            .all(|(field, condition)| condition.holds(record.get(field)))
    }

    /// Returns the records satisfying every condition.
    pub fn filter<'a>(&'a self, records: &'a [JsonMap]) -> impl Iterator<Item = &'a JsonMap> + 'a {
        records.iter().filter(move |r| self.test(r))
    }

    /// Returns the `id` of every matching record that has one.
    pub fn ids(&self, records: &[JsonMap]) -> Vec<i64> {
        self.filter(records)
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect()
    }

    /// Returns the `slug` of every matching record that has one.
    pub fn slugs(&self, records: &[JsonMap]) -> Vec<String> {
        self.filter(records)
            .filter_map(|r| r.get("slug").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}
