//! URL template rendering
//!
//! Command URLs carry a single `{{ query }}` placeholder. The query handed to
//! the executor is already percent-encoded by the caller; rendering is pure
//! substitution with no escaping. Any other variable is a configuration bug
//! and fails loudly instead of rendering an empty string.

use minijinja::{context, AutoEscape, Environment, UndefinedBehavior};
use thiserror::Error;

/// Query used when probing templates at startup
const PROBE_QUERY: &str = "probe";

#[derive(Debug, Error)]
#[error("invalid URL template '{template}': {source}")]
pub struct TemplateError {
    pub template: String,
    #[source]
    pub source: minijinja::Error,
}

/// Renders command URL templates against the encoded query
pub struct TemplateExecutor {
    env: Environment<'static>,
}

impl TemplateExecutor {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    pub fn render(&self, template: &str, query: &str) -> Result<String, TemplateError> {
        self.env
            .render_str(template, context! { query => query })
            .map_err(|source| TemplateError {
                template: template.to_string(),
                source,
            })
    }

    /// Render with a placeholder query to surface broken templates early
    pub fn check(&self, template: &str) -> Result<(), TemplateError> {
        self.render(template, PROBE_QUERY).map(|_| ())
    }
}

impl Default for TemplateExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a single template with a throwaway executor
pub fn render_url(template: &str, query: &str) -> Result<String, TemplateError> {
    TemplateExecutor::new().render(template, query)
}
