//! The tagged entity variant.

use crate::dashboard::Dashboard;
use crate::error::ModelResult;
use crate::kind::{EntityKind, SortKey};
use crate::query::Query;
use crate::visualization::Visualization;
use crate::widget::Widget;
use crate::JsonMap;

/// Any entity of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A query.
    Query(Query),
    /// A visualization.
    Visualization(Visualization),
    /// A widget.
    Widget(Widget),
    /// A dashboard.
    Dashboard(Dashboard),
}

impl Entity {
    /// Returns the entity category.
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Query(_) => EntityKind::Query,
            Entity::Visualization(_) => EntityKind::Visualization,
            Entity::Widget(_) => EntityKind::Widget,
            Entity::Dashboard(_) => EntityKind::Dashboard,
        }
    }

    /// Returns the remote id, if materialized.
    pub fn id(&self) -> Option<i64> {
        match self {
            Entity::Query(q) => q.id,
            Entity::Visualization(v) => v.id,
            Entity::Widget(w) => w.id,
            Entity::Dashboard(d) => d.id,
        }
    }

    /// Returns the ordering key.
    pub fn sort_key(&self) -> SortKey {
        crate::kind::sort_key(self.id())
    }

    /// Returns the remote path.
    pub fn path(&self) -> String {
        self.kind().path(self.id())
    }

    /// Serializes the wrapped entity.
    pub fn to_map(&self, excluding: &[&str]) -> JsonMap {
        match self {
            Entity::Query(q) => q.to_map(excluding),
            Entity::Visualization(v) => v.to_map(excluding),
            Entity::Widget(w) => w.to_map(excluding),
            Entity::Dashboard(d) => d.to_map(excluding),
        }
    }

    /// Deserializes an entity of the given kind.
    ///
    /// # Errors
    ///
    /// Propagates the decoding error of the concrete kind.
    pub fn from_map(kind: EntityKind, map: &JsonMap) -> ModelResult<Self> {
        Ok(match kind {
            EntityKind::Query => Entity::Query(Query::from_map(map)?),
            EntityKind::Visualization => Entity::Visualization(Visualization::from_map(map)?),
            EntityKind::Widget => Entity::Widget(Widget::from_map(map)?),
            EntityKind::Dashboard => Entity::Dashboard(Dashboard::from_map(map)?),
        })
    }
}

impl From<Query> for Entity {
    fn from(query: Query) -> Self {
        Entity::Query(query)
    }
}

impl From<Visualization> for Entity {
    fn from(visualization: Visualization) -> Self {
        Entity::Visualization(visualization)
    }
}

impl From<Widget> for Entity {
    fn from(widget: Widget) -> Self {
        Entity::Widget(widget)
    }
}

impl From<Dashboard> for Entity {
    fn from(dashboard: Dashboard) -> Self {
        Entity::Dashboard(dashboard)
    }
}
