//! MiniJinja-based templates
//!
//! [`JinjaTemplate`] holds one named Jinja2 source, checked for syntax when
//! constructed and rendered on demand with JSON variables.

use crate::{PromptError, Result};
use minijinja::Environment;

/// A prompt template backed by MiniJinja
///
/// Supports the usual Jinja2 syntax (`{{ var }}`, filters, `{% if %}`,
/// `{% for %}`) plus the `upper`, `lower`, `trim` and `capitalize` filters.
///
/// # Examples
///
/// ```
/// use yensense_prompt::JinjaTemplate;
/// use serde_json::json;
///
/// let template = JinjaTemplate::new(
///     "headlines",
///     "{% for h in headlines %}- {{ h }}\n{% endfor %}",
/// )?;
/// let rendered = template.render(&json!({"headlines": ["BOJ holds", "Yen slips"]}))?;
/// assert_eq!(rendered, "- BOJ holds\n- Yen slips\n");
/// # Ok::<(), yensense_prompt::PromptError>(())
/// ```
#[derive(Debug, Clone)]
pub struct JinjaTemplate {
    name: String,
    source: String,
}

impl JinjaTemplate {
    /// Create a template, failing if the source does not parse
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();

        Environment::new()
            .template_from_str(&source)
            .map_err(|e| PromptError::TemplateParseFailed {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self { name, source })
    }

    /// Render with the given variables
    pub fn render(&self, vars: &serde_json::Value) -> Result<String> {
        // Create a new environment for each render to avoid lifetime issues
        let mut env = Environment::new();

        env.add_filter("upper", |s: String| s.to_uppercase());
        env.add_filter("lower", |s: String| s.to_lowercase());
        env.add_filter("trim", |s: String| s.trim().to_string());
        env.add_filter("capitalize", |s: String| {
            let mut chars = s.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        });

        let value = minijinja::value::Value::from_serialize(vars);

        env.render_str(&self.source, value)
            .map_err(|e| PromptError::RenderError {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }
}
