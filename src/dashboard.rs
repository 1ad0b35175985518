//! Landing page: the variable list, plot types and output formats.

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::Variable;
use crate::error::Result;
use crate::OutputFormat;

const TEMPLATE: &str = include_str!("../templates/dash.html");
const DESCRIPTIONS: &str = include_str!("../templates/plot_descriptions.json");

/// A plot the landing page can build a URL for.
///
/// `path` holds `{v1}`, `{v2}` and `{param}` placeholders; `needs` names the
/// ones the path uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotType {
    pub name: &'static str,
    pub path: &'static str,
    pub needs: &'static [&'static str],
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEntry {
    pub name: &'static str,
    pub ext: &'static str,
}

const PLOT_TYPES: [(&str, &str, &[&str]); 7] = [
    ("Histogram", "hist/{v1}?floor={param}", &["v1", "param"]),
    ("Comparison means", "comp/{v1}/{v2}/mean", &["v1", "v2"]),
    ("Comparison percentages", "comp/{v1}/{v2}/pst?floor={param}", &["v1", "v2", "param"]),
    ("Group comp. percentages", "comp/{v1}/{v2}/grppst?floor={param}", &["v1", "v2", "param"]),
    ("Comparison counts", "comp/{v1}/{v2}/count?floor={param}", &["v1", "v2", "param"]),
    ("Map mean", "map/{v1}/mean/0", &["v1"]),
    ("Map percent equals", "map/{v1}/eq/{param}", &["v1", "param"]),
];

/// Plot types with their descriptions; a type without one gets an empty text
pub fn plot_types() -> Result<Vec<PlotType>> {
    let descriptions: HashMap<String, String> = serde_json::from_str(DESCRIPTIONS)?;
    Ok(PLOT_TYPES
        .iter()
        .map(|&(name, path, needs)| PlotType {
            name,
            path,
            needs,
            description: descriptions.get(name).cloned().unwrap_or_default(),
        })
        .collect())
}

pub fn formats() -> Vec<FormatEntry> {
    OutputFormat::ALL
        .iter()
        .map(|f| FormatEntry {
            name: f.display_name(),
            ext: f.extension(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexPage {
    pub variables: Vec<Variable>,
    pub plot_types: Vec<PlotType>,
    pub formats: Vec<FormatEntry>,
}

impl IndexPage {
    /// Keeps only variables with a usable description
    pub fn new(variables: Vec<Variable>) -> Result<Self> {
        Ok(Self {
            variables: variables.into_iter().filter(Variable::is_listed).collect(),
            plot_types: plot_types()?,
            formats: formats(),
        })
    }

    pub fn render(&self) -> Result<String> {
        let mut data = serde_json::to_value(self)?;
        data["plot_types_json"] = serde_json::Value::String(serde_json::to_string(&self.plot_types)?);

        let handlebars = Handlebars::new();
        Ok(handlebars.render_template(TEMPLATE, &data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, description: Option<&str>) -> Variable {
        Variable {
            name: name.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_plot_types_have_descriptions() {
        let types = plot_types().unwrap();
        assert_eq!(types.len(), 7);
        assert!(types.iter().all(|t| !t.description.is_empty()));
        assert_eq!(types[0].name, "Histogram");
        assert_eq!(types[6].needs, &["v1", "param"]);
    }

    #[test]
    fn test_formats_listed() {
        let exts: Vec<&str> = formats().iter().map(|f| f.ext).collect();
        assert_eq!(exts, vec!["png", "jpg", "pdf", "ps", "svg"]);
    }

    #[test]
    fn test_index_filters_variables() {
        let page = IndexPage::new(vec![
            var("q1", Some("Age")),
            var("q2", Some("NaN")),
            var("q3", None),
        ])
        .unwrap();
        assert_eq!(page.variables.len(), 1);
        assert_eq!(page.variables[0].name, "q1");
    }

    #[test]
    fn test_render_html() {
        let page = IndexPage::new(vec![var("q1", Some("Age & gender"))]).unwrap();
        let html = page.render().unwrap();
        assert!(html.contains("<option value=\"q1\">q1: Age &amp; gender</option>"));
        assert!(html.contains("Group comp. percentages"));
        assert!(html.contains("\"path\":\"comp/{v1}/{v2}/grppst?floor={param}\""));
        assert!(html.contains("<option value=\"ps\">postscript</option>"));
    }
}
