//! Command registry and URL templating

pub mod models;
pub mod registry;
pub mod template;

pub use models::{Command, CommandConfig, Subcommand};
pub use registry::Registry;
pub use template::{render_url, TemplateError, TemplateExecutor};
