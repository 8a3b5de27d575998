use minijinja::{context, Environment};

use crate::commands::Registry;

const HELP_TEMPLATE: &str = include_str!("../../assets/templates/help.html");

/// HTML command list shown for `help` / `list`
pub struct HelpPage {
    env: Environment<'static>,
}

impl HelpPage {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    pub fn render(&self, registry: &Registry) -> Result<String, minijinja::Error> {
        // The .html name turns on HTML auto-escaping for command text
        self.env.render_named_str(
            "help.html",
            HELP_TEMPLATE,
            context! { commands => registry.list_commands() },
        )
    }
}

impl Default for HelpPage {
    fn default() -> Self {
        Self::new()
    }
}
