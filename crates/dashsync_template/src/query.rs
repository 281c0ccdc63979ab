//! Query templates.

use crate::error::{TemplateError, TemplateResult};
use dashsync_model::{Query, TagInput};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Parameter values keyed by placeholder name.
pub type Params = BTreeMap<String, String>;

/// Builds [`Params`] from name/value pairs.
///
/// ```rust
/// let p = dashsync_template::params([("customer", "acme"), ("year", "2024")]);
/// assert_eq!(p["year"], "2024");
/// ```
pub fn params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Params
where
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

/// A query whose SQL has named placeholders.
///
/// Placeholders are written `{{ name }}`, with optional inner spaces. Only
/// names passed at construction become placeholders; any other `{{ ... }}`
/// is kept as literal text for the remote service to fill in.
///
/// # Example
///
/// ```rust
/// use dashsync_model::Query;
/// use dashsync_template::{params, QueryTemplate};
///
/// let query = Query::new(1, "select * from orders where customer = '{{ customer }}'");
/// let template = QueryTemplate::new(&query, ["customer"]).unwrap();
///
/// let rendered = template.render(&params([("customer", "acme")]), None).unwrap();
/// assert_eq!(rendered.sql, "select * from orders where customer = 'acme'");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    prototype: Query,
    segments: Vec<Segment>,
}

impl QueryTemplate {
    /// Captures `query` as a template over `param_names`.
    ///
    /// Entries of `options.parameters` named in `param_names` are dropped
    /// from the template's copy, since their values now come from the
    /// renderer.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidPattern`] if the names cannot be
    /// compiled into a placeholder pattern.
    pub fn new(
        query: &Query,
        param_names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> TemplateResult<Self> {
        let names: BTreeSet<String> = param_names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        let segments = parse(&query.sql, &names)?;

        let mut prototype = query.clone();
        prototype.set_id(None);
        prototype.sql.clear();
        if let Some(Value::Array(parameters)) = prototype.options.get_mut("parameters") {
            parameters.retain(|p| {
                !p.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| names.contains(n))
            });
        }

        Ok(Self {
            prototype,
            segments,
        })
    }

    /// Returns the distinct placeholder names, in order of appearance.
    pub fn parameters(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Returns the captured name of the query.
    pub fn name(&self) -> &str {
        &self.prototype.name
    }

    /// Renders a new unidentified query.
    ///
    /// The result carries the substituted SQL, the captured visualizations
    /// and options, and the captured tags plus `custom_tags`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingParameter`] for the first placeholder
    /// without a value.
    pub fn render(&self, params: &Params, custom_tags: Option<TagInput>) -> TemplateResult<Query> {
        let mut sql = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Placeholder(name) => sql.push_str(
                    params
                        .get(name)
                        .ok_or_else(|| TemplateError::missing(name.as_str()))?,
                ),
            }
        }

        let mut query = self.prototype.clone();
        query.sql = sql;
        if let Some(tags) = custom_tags {
            query.add_tags(tags);
        }
        debug!(name = %query.name, "rendered query template");
        Ok(query)
    }
}

fn parse(sql: &str, names: &BTreeSet<String>) -> TemplateResult<Vec<Segment>> {
    if names.is_empty() {
        return Ok(vec![Segment::Text(sql.to_string())]);
    }

    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let placeholder = Regex::new(&format!(r"\{{\{{\s*({alternation})\s*\}}\}}"))?;

    let mut segments = Vec::new();
    let mut last = 0;
    for caps in placeholder.captures_iter(sql) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(sql[last..whole.start()].to_string()));
        }
        segments.push(Segment::Placeholder(name.as_str().to_string()));
        last = whole.end();
    }
    if last < sql.len() {
        segments.push(Segment::Text(sql[last..].to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashsync_model::{JsonMap, Visualization};
    use serde_json::json;

    fn options(value: serde_json::Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn substitutes_and_drops_parameters() {
        let query = Query::new(1, "select * from t where id = {{x}}").with_options(options(
            json!({"parameters": [{"name": "x"}, {"name": "kept"}]}),
        ));
        let template = QueryTemplate::new(&query, ["x"]).unwrap();

        let rendered = template.render(&params([("x", "5")]), None).unwrap();
        assert_eq!(rendered.sql, "select * from t where id = 5");
        assert_eq!(rendered.options["parameters"], json!([{"name": "kept"}]));
        assert_eq!(query.options["parameters"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn inner_spaces_and_repeats() {
        let query = Query::new(1, "{{ a }} + {{a}} + {{  b  }}");
        let template = QueryTemplate::new(&query, ["a", "b"]).unwrap();
        assert_eq!(template.parameters(), vec!["a", "b"]);

        let rendered = template.render(&params([("a", 1), ("b", 2)]), None).unwrap();
        assert_eq!(rendered.sql, "1 + 1 + 2");
    }

    #[test]
    fn unknown_placeholders_stay_literal() {
        let query = Query::new(1, "where a = {{a}} and b = {{ b }}");
        let template = QueryTemplate::new(&query, ["a"]).unwrap();
        let rendered = template.render(&params([("a", "x")]), None).unwrap();
        assert_eq!(rendered.sql, "where a = x and b = {{ b }}");
    }

    #[test]
    fn missing_parameter() {
        let query = Query::new(1, "select {{x}}");
        let template = QueryTemplate::new(&query, ["x"]).unwrap();
        let err = template.render(&Params::new(), None).unwrap_err();
        assert!(matches!(err, TemplateError::MissingParameter { name } if name == "x"));
    }

    #[test]
    fn names_with_metacharacters() {
        let query = Query::new(1, "select {{ a.b }}, {{ axb }}");
        let template = QueryTemplate::new(&query, ["a.b"]).unwrap();
        let rendered = template.render(&params([("a.b", "1")]), None).unwrap();
        assert_eq!(rendered.sql, "select 1, {{ axb }}");
    }

    #[test]
    fn render_is_fresh_and_tagged() {
        let query = Query::new(3, "select {{x}}")
            .with_id(40)
            .with_name("Revenue")
            .with_tags("finance")
            .with_visualization(Visualization::new("CHART").with_id(9));
        let template = QueryTemplate::new(&query, ["x"]).unwrap();

        let rendered = template
            .render(&params([("x", 1)]), Some("acme".into()))
            .unwrap();
        assert_eq!(rendered.id, None);
        assert_eq!(rendered.name, "Revenue");
        assert_eq!(rendered.data_source_id, 3);
        assert!(rendered.tags.contains("finance"));
        assert!(rendered.tags.contains("acme"));
        assert_eq!(rendered.visualizations()[0].id, Some(9));
        assert_eq!(rendered.visualizations()[0].query_id, None);
        assert!(!template.prototype.tags.contains("acme"));
    }
}
