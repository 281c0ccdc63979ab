//! Dashboard templates.

use crate::error::TemplateResult;
use crate::query::{Params, QueryTemplate};
use dashsync_model::{Dashboard, TagInput, Tags, Widget};
use tracing::info;

/// A dashboard whose queries are templates.
///
/// Widgets are captured unchanged: rendered queries keep their
/// visualization ids, so widget references stay resolvable until the sync
/// engine remaps them.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardTemplate {
    slug: String,
    name: String,
    tags: Tags,
    widgets: Vec<Widget>,
    queries: Vec<QueryTemplate>,
}

impl DashboardTemplate {
    /// Captures `dashboard` with one [`QueryTemplate`] per query.
    pub fn new(
        dashboard: &Dashboard,
        param_names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> TemplateResult<Self> {
        let names: Vec<String> = param_names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect();
        let queries = dashboard
            .queries()
            .iter()
            .map(|q| QueryTemplate::new(q, &names))
            .collect::<TemplateResult<Vec<_>>>()?;

        Ok(Self {
            slug: dashboard.slug.clone(),
            name: dashboard.name.clone(),
            tags: dashboard.tags.clone(),
            widgets: dashboard.widgets().to_vec(),
            queries,
        })
    }

    /// Returns the captured slug.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Returns the query templates.
    pub fn queries(&self) -> &[QueryTemplate] {
        &self.queries
    }

    /// Returns the distinct placeholder names across all queries.
    pub fn parameters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.queries.iter().flat_map(QueryTemplate::parameters) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Renders a new unidentified dashboard.
    ///
    /// `slug` and `name` default to the captured ones. `custom_tags` are
    /// added to the dashboard and to every rendered query.
    ///
    /// # Errors
    ///
    /// Fails if any query template lacks a parameter.
    pub fn render(
        &self,
        params: &Params,
        slug: Option<&str>,
        name: Option<&str>,
        custom_tags: Option<TagInput>,
    ) -> TemplateResult<Dashboard> {
        let queries = self
            .queries
            .iter()
            .map(|q| q.render(params, custom_tags.clone()))
            .collect::<TemplateResult<Vec<_>>>()?;

        let mut dashboard = Dashboard::new(slug.unwrap_or(&self.slug))
            .with_name(name.unwrap_or(&self.name))
            .with_tags(&self.tags);
        if let Some(tags) = custom_tags {
            dashboard.add_tags(tags);
        }
        dashboard.set_widgets(self.widgets.clone());
        dashboard.set_queries(queries);

        info!(
            slug = %dashboard.slug,
            queries = dashboard.queries().len(),
            "rendered dashboard template"
        );
        Ok(dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::params;
    use crate::TemplateError;
    use dashsync_model::{Query, Visualization};

    fn dashboard() -> Dashboard {
        Dashboard::new("sales")
            .with_name("Sales")
            .with_tags("report")
            .with_query(
                Query::new(1, "select * from orders where region = '{{region}}'")
                    .with_id(10)
                    .with_visualization(Visualization::new("TABLE").with_id(100)),
            )
            .with_query(
                Query::new(1, "select count(*) from users where region = '{{ region }}' and y = {{year}}")
                    .with_id(11)
                    .with_visualization(Visualization::new("CHART").with_id(110)),
            )
            .with_widget(Widget::for_visualization(100).with_id(1))
            .with_widget(Widget::for_visualization(110).with_id(2))
            .with_widget(Widget::text_block("notes").with_id(3))
    }

    #[test]
    fn render_with_overrides() {
        let template = DashboardTemplate::new(&dashboard(), ["region", "year"]).unwrap();
        assert_eq!(template.parameters(), vec!["region", "year"]);

        let rendered = template
            .render(
                &params([("region", "emea"), ("year", "2024")]),
                Some("sales-emea"),
                Some("Sales EMEA"),
                Some("emea".into()),
            )
            .unwrap();

        assert_eq!(rendered.id, None);
        assert_eq!(rendered.slug, "sales-emea");
        assert_eq!(rendered.name, "Sales EMEA");
        assert!(rendered.tags.contains("report"));
        assert!(rendered.tags.contains("emea"));
        assert_eq!(rendered.widgets().len(), 3);
        assert_eq!(rendered.queries().len(), 2);
        assert!(rendered.queries().iter().all(|q| q.id.is_none()));
        assert!(rendered.queries().iter().all(|q| q.tags.contains("emea")));
        assert_eq!(
            rendered.queries()[1].sql,
            "select count(*) from users where region = 'emea' and y = 2024"
        );
        rendered.validate().unwrap();
    }

    #[test]
    fn defaults_to_captured_identity() {
        let template = DashboardTemplate::new(&dashboard(), ["region", "year"]).unwrap();
        let rendered = template
            .render(&params([("region", "apac"), ("year", "2023")]), None, None, None)
            .unwrap();
        assert_eq!(rendered.slug, "sales");
        assert_eq!(rendered.name, "Sales");
        assert!(!rendered.tags.contains("apac"));
    }

    #[test]
    fn missing_parameter_in_any_query() {
        let template = DashboardTemplate::new(&dashboard(), ["region", "year"]).unwrap();
        let err = template
            .render(&params([("region", "emea")]), None, None, None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingParameter { .. }));
    }
}
