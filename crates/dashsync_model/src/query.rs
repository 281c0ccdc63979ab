//! Queries and their refresh schedules.

use crate::error::{ModelError, ModelResult};
use crate::fields::{without, Fields};
use crate::kind::{sort_key, EntityKind, SortKey};
use crate::tags::{TagInput, Tags};
use crate::visualization::Visualization;
use crate::JsonMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name given to queries declared without one.
pub const DEFAULT_QUERY_NAME: &str = "New Query";

/// When the remote service refreshes a query. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Refresh interval in seconds.
    #[serde(default)]
    pub interval: Option<i64>,
    /// Day of week for weekly schedules.
    #[serde(default)]
    pub day_of_week: Option<String>,
    /// Time of day (`HH:MM`) for daily and weekly schedules.
    #[serde(default)]
    pub time: Option<String>,
    /// Last date the schedule is active.
    #[serde(default)]
    pub until: Option<String>,
}

impl Schedule {
    /// A plain interval schedule.
    pub fn every(interval_secs: i64) -> Self {
        Self {
            interval: Some(interval_secs),
            ..Self::default()
        }
    }
}

/// A data-source command plus the visualizations that display its results.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Remote id, absent until materialized.
    pub id: Option<i64>,
    /// Data source the SQL runs against.
    pub data_source_id: i64,
    /// Query text. Serialized under the `query` key.
    pub sql: String,
    /// Display name.
    pub name: String,
    /// Optional refresh schedule.
    pub schedule: Option<Schedule>,
    /// Tag set.
    pub tags: Tags,
    /// Opaque options; holds the `parameters` list.
    pub options: JsonMap,
    visualizations: Vec<Visualization>,
}

impl Query {
    /// Creates an unidentified query with no visualizations.
    pub fn new(data_source_id: i64, sql: impl Into<String>) -> Self {
        Self {
            id: None,
            data_source_id,
            sql: sql.into(),
            name: DEFAULT_QUERY_NAME.to_string(),
            schedule: None,
            tags: Tags::new(),
            options: JsonMap::new(),
            visualizations: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the options map.
    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    /// Adds tags.
    pub fn with_tags(mut self, tags: impl Into<TagInput>) -> Self {
        self.tags.add(tags);
        self
    }

    /// Attaches a visualization.
    pub fn with_visualization(mut self, visualization: Visualization) -> Self {
        self.add_visualization(visualization);
        self
    }

    /// Sets the remote id, re-stamping every owned visualization.
    pub fn with_id(mut self, id: i64) -> Self {
        self.set_id(Some(id));
        self
    }

    /// Sets or clears the remote id, re-stamping every owned visualization.
    pub fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
        for vis in &mut self.visualizations {
            vis.query_id = id;
        }
    }

    /// Adds tags. See [`Tags::add`].
    pub fn add_tags(&mut self, tags: impl Into<TagInput>) -> &mut Self {
        self.tags.add(tags);
        self
    }

    /// Removes tags. See [`Tags::remove`].
    pub fn remove_tags(&mut self, tags: impl Into<TagInput>) -> &mut Self {
        self.tags.remove(tags);
        self
    }

    /// Returns the owned visualizations; the first one is the default.
    pub fn visualizations(&self) -> &[Visualization] {
        &self.visualizations
    }

    /// Returns the default visualization, if any is declared.
    pub fn default_visualization(&self) -> Option<&Visualization> {
        self.visualizations.first()
    }

    /// Attaches a visualization, stamping it with this query's id.
    pub fn add_visualization(&mut self, mut visualization: Visualization) -> &Visualization {
        visualization.query_id = self.id;
        let id = visualization.id;
        self.visualizations.push(visualization);
        self.visualizations.sort_by_key(Visualization::sort_key);
        let idx = self
            .visualizations
            .iter()
            .rposition(|v| v.id == id)
            .unwrap_or(self.visualizations.len() - 1);
        &self.visualizations[idx]
    }

    /// Replaces every visualization, keeping the given order.
    pub fn set_visualizations(&mut self, visualizations: Vec<Visualization>) {
        self.visualizations = visualizations;
        let id = self.id;
        for vis in &mut self.visualizations {
            vis.query_id = id;
        }
    }

    /// Consumes the query, returning its visualizations.
    pub fn into_visualizations(self) -> Vec<Visualization> {
        self.visualizations
    }

    /// Returns the ordering key.
    pub fn sort_key(&self) -> SortKey {
        sort_key(self.id)
    }

    /// Returns the remote path of this query.
    pub fn path(&self) -> String {
        EntityKind::Query.path(self.id)
    }

    /// Returns true if both queries run the same SQL on the same source.
    pub fn matches(&self, other: &Query) -> bool {
        self.data_source_id == other.data_source_id && self.sql == other.sql
    }

    /// Sets a plain interval schedule.
    pub fn set_schedule(&mut self, interval_secs: i64) -> &mut Self {
        self.schedule = Some(Schedule::every(interval_secs));
        self
    }

    /// Replaces every occurrence of `from` in the SQL text.
    pub fn replace_sql(&mut self, from: &str, to: &str) -> &mut Self {
        self.sql = self.sql.replace(from, to);
        self
    }

    /// Replaces every match of `pattern` in the SQL text.
    ///
    /// `.` matches newlines; `replacement` may use `$1`-style groups.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidPattern`] if `pattern` does not compile.
    pub fn replace_sql_regex(&mut self, pattern: &str, replacement: &str) -> ModelResult<&mut Self> {
        let re = Regex::new(&format!("(?s){pattern}"))?;
        self.sql = re.replace_all(&self.sql, replacement).into_owned();
        Ok(self)
    }

    /// Returns the names listed in `options.parameters`.
    pub fn parameter_names(&self) -> Vec<String> {
        self.options
            .get("parameters")
            .and_then(Value::as_array)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|p| p.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serializes to the remote wire shape, visualizations inlined.
    pub fn to_map(&self, excluding: &[&str]) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("data_source_id".into(), Value::from(self.data_source_id));
        map.insert("query".into(), Value::String(self.sql.clone()));
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert(
            "schedule".into(),
            self.schedule
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(Value::Null),
        );
        map.insert("tags".into(), self.tags.to_value());
        map.insert("options".into(), Value::Object(self.options.clone()));
        map.insert(
            "visualizations".into(),
            Value::Array(
                self.visualizations
                    .iter()
                    .map(|v| Value::Object(v.to_map(&[])))
                    .collect(),
            ),
        );
        without(map, excluding)
    }

    /// Deserializes from the remote wire shape.
    ///
    /// Visualizations are re-attached to this query and sorted.
    ///
    /// # Errors
    ///
    /// Fails if `data_source_id` or `query` is absent, or a declared field
    /// has the wrong type.
    pub fn from_map(map: &JsonMap) -> ModelResult<Self> {
        let fields = Fields::new(EntityKind::Query, map);
        let schedule = match fields.value("schedule") {
            None => None,
            Some(v) => Some(serde_json::from_value::<Schedule>(v.clone()).map_err(|_| {
                ModelError::invalid_field(EntityKind::Query, "schedule", "a schedule object")
            })?),
        };

        let mut query = Self {
            id: fields.opt_i64("id")?,
            data_source_id: fields.req_i64("data_source_id")?,
            sql: fields.req_string("query")?,
            name: fields
                .opt_string("name")?
                .unwrap_or_else(|| DEFAULT_QUERY_NAME.to_string()),
            schedule,
            tags: fields.tags("tags")?,
            options: fields.map("options")?,
            visualizations: Vec::new(),
        };

        let mut visualizations = fields
            .objects("visualizations")?
            .into_iter()
            .map(Visualization::from_map)
            .collect::<ModelResult<Vec<_>>>()?;
        visualizations.sort_by_key(Visualization::sort_key);
        query.set_visualizations(visualizations);
        Ok(query)
    }
}
