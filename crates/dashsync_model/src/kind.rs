//! Entity categories and ordering keys.

use std::fmt;

/// The immutable category of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// A data-source command plus its visualizations.
    Query,
    /// A chart or table configuration attached to one query.
    Visualization,
    /// A dashboard cell showing text or a visualization.
    Widget,
    /// A slug-addressed collection of widgets.
    Dashboard,
}

impl EntityKind {
    /// Returns the remote collection name used in paths.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Query => "queries",
            EntityKind::Visualization => "visualizations",
            EntityKind::Widget => "widgets",
            EntityKind::Dashboard => "dashboards",
        }
    }

    /// Parses a remote collection name.
    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            "queries" => Some(EntityKind::Query),
            "visualizations" => Some(EntityKind::Visualization),
            "widgets" => Some(EntityKind::Widget),
            "dashboards" => Some(EntityKind::Dashboard),
            _ => None,
        }
    }

    /// Builds the remote path for an entity of this kind.
    ///
    /// Unidentified entities address the collection itself.
    pub fn path(&self, id: Option<i64>) -> String {
        match id {
            Some(id) => format!("{}/{}", self.collection(), id),
            None => self.collection().to_string(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Query => "query",
            EntityKind::Visualization => "visualization",
            EntityKind::Widget => "widget",
            EntityKind::Dashboard => "dashboard",
        };
        f.write_str(name)
    }
}

/// Ordering key: identified entities first, then by id ascending.
pub type SortKey = (bool, Option<i64>);

/// Computes the [`SortKey`] for an optional id.
#[inline]
pub fn sort_key(id: Option<i64>) -> SortKey {
    (id.is_none(), id)
}
