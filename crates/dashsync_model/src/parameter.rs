//! Structured widget parameter mappings.
//!
//! Widget options are opaque except for their `parameterMappings` entries,
//! which the model rewrites when a parameter changes scope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where a widget parameter takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingScope {
    /// Shared by every widget of the dashboard.
    #[serde(rename = "dashboard-level")]
    DashboardLevel,
    /// Set per widget.
    #[serde(rename = "widget-level")]
    WidgetLevel,
    /// Fixed value stored in the mapping.
    #[serde(rename = "static-value")]
    StaticValue,
    /// Falls back to the query's own default.
    #[serde(rename = "unmapped")]
    Unmapped,
}

/// Target scope for [`crate::Dashboard::change_parameter_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLevel {
    /// Dashboard-wide parameter.
    Dashboard,
    /// Per-widget parameter.
    Widget,
}

impl ParameterLevel {
    /// The mapping scope this level produces.
    pub fn scope(&self) -> MappingScope {
        match self {
            ParameterLevel::Dashboard => MappingScope::DashboardLevel,
            ParameterLevel::Widget => MappingScope::WidgetLevel,
        }
    }
}

impl fmt::Display for ParameterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLevel::Dashboard => f.write_str("dashboard"),
            ParameterLevel::Widget => f.write_str("widget"),
        }
    }
}

/// One entry of a widget's `parameterMappings` option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMapping {
    /// Query parameter name.
    pub name: String,
    /// Value source.
    #[serde(rename = "type")]
    pub scope: MappingScope,
    /// Name of the dashboard parameter this maps to.
    #[serde(rename = "mapTo")]
    pub map_to: String,
    /// Display title.
    pub title: String,
    /// Value for static mappings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ParameterMapping {
    /// A mapping of `name` onto itself at the given level.
    pub fn at_level(name: &str, level: ParameterLevel, title: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            scope: level.scope(),
            map_to: name.to_string(),
            title: title.unwrap_or(name).to_string(),
            value: None,
        }
    }
}
