#![cfg(feature = "web")]
use crate::loader::Table;
use crate::stats::{FeatureSummary, NO_MATCHING_COLUMNS, Summary};
use handlebars::{Handlebars, html_escape};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt::Write;
use thiserror::Error;

/// CSS classes applied to every rendered data table
pub const TABLE_CLASSES: &str = "table table-bordered";

pub const INDEX_TEMPLATE: &str = "index";
pub const UPLOAD_TEMPLATE: &str = "upload";
pub const DASHBOARD_TEMPLATE: &str = "dashboard";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("template failed to compile: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("template failed to render: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Page templates compiled once at start-up
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, ViewError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(INDEX_TEMPLATE, include_str!("./static/index.html"))?;
        registry.register_template_string(UPLOAD_TEMPLATE, include_str!("./static/upload.html"))?;
        registry.register_template_string(
            DASHBOARD_TEMPLATE,
            include_str!("./static/dashboard.html"),
        )?;
        Ok(Templates { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, ViewError> {
        Ok(self.registry.render(name, data)?)
    }
}

/// Context of the upload page
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadView {
    pub error: Option<String>,

    /// Public URL of the stored upload
    pub file_path: Option<String>,

    /// Column names of the preview, in order
    pub preview_columns: Vec<String>,

    /// Preview rows as column -> value mappings
    pub preview_data: Vec<Map<String, JsonValue>>,
}

impl UploadView {
    pub fn error(message: impl Into<String>) -> Self {
        UploadView {
            error: Some(message.into()),
            ..UploadView::default()
        }
    }
}

/// Context of the dashboard page
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub error: Option<String>,

    /// First rows of the full table as markup
    pub df: Option<String>,

    pub summary_stats_dict: Map<String, JsonValue>,
    pub summary_stats_html: Option<String>,

    pub bar_graph: Option<String>,
    pub pie_graph: Option<String>,
    pub hist_graph: Option<String>,
    pub scatter_graph: Option<String>,
}

impl DashboardView {
    pub fn error(message: impl Into<String>) -> Self {
        DashboardView {
            error: Some(message.into()),
            ..DashboardView::default()
        }
    }
}

/// Render a table as HTML with a leading row-index column
pub fn table_html(table: &Table) -> String {
    let mut html = String::new();
    let _ = writeln!(html, r#"<table border="1" class="dataframe {}">"#, TABLE_CLASSES);
    html.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for name in table.column_names() {
        let _ = writeln!(html, "      <th>{}</th>", html_escape(name));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    for row in 0..table.height() {
        let _ = writeln!(html, "    <tr>\n      <th>{}</th>", row);
        for column in table.columns() {
            let _ = writeln!(
                html,
                "      <td>{}</td>",
                html_escape(&column.values()[row].to_string())
            );
        }
        html.push_str("    </tr>\n");
    }

    html.push_str("  </tbody>\n</table>");
    html
}

/// Render summary statistics as an HTML table, one row per feature.
///
/// When no allow-listed column matched, a paragraph saying so is returned
/// instead of an empty table.
pub fn summary_html(summary: &Summary) -> String {
    let rows = match summary {
        Summary::NoMatchingColumns => return format!("<p>{}</p>", NO_MATCHING_COLUMNS),
        Summary::Features(rows) => rows,
    };

    let mut html = String::new();
    let _ = writeln!(html, r#"<table border="1" class="dataframe {}">"#, TABLE_CLASSES);
    html.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for stat in ["count", "mean", "std", "min", "25%", "50%", "75%", "max"] {
        let _ = writeln!(html, "      <th>{}</th>", stat);
    }
    html.push_str("    </tr>\n    <tr>\n      <th>Feature</th>\n");
    html.push_str(&"      <th></th>\n".repeat(8));
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    for row in rows {
        let _ = writeln!(html, "    <tr>\n      <th>{}</th>", html_escape(&row.feature));
        for cell in summary_cells(row) {
            let _ = writeln!(html, "      <td>{}</td>", cell);
        }
        html.push_str("    </tr>\n");
    }

    html.push_str("  </tbody>\n</table>");
    html
}

fn summary_cells(row: &FeatureSummary) -> Vec<String> {
    let fmt = |v: Option<f64>| match v {
        Some(v) => format!("{:.6}", v),
        None => "NaN".to_string(),
    };
    vec![
        format!("{:.6}", row.count as f64),
        fmt(row.mean),
        fmt(row.std),
        fmt(row.min),
        fmt(row.q25),
        fmt(row.q50),
        fmt(row.q75),
        fmt(row.max),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Column;

    #[test]
    fn table_cells_are_escaped() {
        let table = Table::from_columns(vec![Column::from_raw("<b>", &["a&b"])]).unwrap();
        let html = table_html(&table);
        assert!(html.contains("<th>&lt;b&gt;</th>"));
        assert!(html.contains("<td>a&amp;b</td>"));
        assert!(html.contains(TABLE_CLASSES));
    }

    #[test]
    fn empty_summary_renders_message() {
        let html = summary_html(&Summary::NoMatchingColumns);
        assert_eq!(html, format!("<p>{}</p>", NO_MATCHING_COLUMNS));
    }

    #[test]
    fn templates_compile() {
        assert!(Templates::new().is_ok());
    }
}
