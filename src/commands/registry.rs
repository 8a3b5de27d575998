use std::collections::HashMap;
use tracing::warn;

use super::models::{Command, CommandConfig, Subcommand};
use super::template::TemplateExecutor;

/// Immutable, case-insensitive lookup structure over the configured commands
///
/// Built once at startup. Duplicate names or aliases follow last-write-wins;
/// collisions are reported with a warning but never rejected.
#[derive(Debug, Default)]
pub struct Registry {
    commands: Vec<Command>,
    /// Folded primary name -> index into `commands`
    names: HashMap<String, usize>,
    /// Folded alias -> index into `commands`
    aliases: HashMap<String, usize>,
    /// Folded command name or alias -> folded subcommand name or alias -> (command, subcommand)
    subcommands: HashMap<String, HashMap<String, (usize, usize)>>,
    default_command: Option<usize>,
    /// Every collision found while building, already logged
    collisions: Vec<String>,
}

impl Registry {
    pub fn new(config: CommandConfig) -> Self {
        let mut registry = Registry::default();

        for (idx, cmd) in config.commands.into_iter().enumerate() {
            let name = cmd.name.to_lowercase();
            if let Some(prev) = registry.names.insert(name.clone(), idx) {
                registry.collision(format!(
                    "command name '{name}' defined again, definition #{idx} replaces #{prev}"
                ));
            }
            if let Some(&owner) = registry.aliases.get(&name).filter(|&&owner| owner != idx) {
                registry.collision(format!(
                    "command name '{name}' is also an alias of '{}', the name takes precedence",
                    registry.commands[owner].name
                ));
            }

            for alias in &cmd.aliases {
                let alias = alias.to_lowercase();
                if let Some(prev) = registry.aliases.insert(alias.clone(), idx) {
                    if prev != idx {
                        registry.collision(format!(
                            "alias '{alias}' of '{}' replaces the same alias of '{}'",
                            cmd.name, registry.commands[prev].name
                        ));
                    }
                }
                if let Some(&owner) = registry.names.get(&alias).filter(|&&owner| owner != idx) {
                    registry.collision(format!(
                        "alias '{alias}' of '{}' is shadowed by the command name of '{}'",
                        cmd.name, registry.commands[owner].name
                    ));
                }
            }

            if cmd.default {
                if let Some(prev) = registry.default_command.replace(idx) {
                    registry.collision(format!(
                        "'{}' marked default after '{}', the later one wins",
                        cmd.name, registry.commands[prev].name
                    ));
                }
            }

            if !cmd.subcommands.is_empty() {
                let mut scoped = HashMap::new();
                for (sub_idx, sub) in cmd.subcommands.iter().enumerate() {
                    let keys = std::iter::once(&sub.name).chain(&sub.aliases);
                    for key in keys {
                        let key = key.to_lowercase();
                        if let Some((_, prev)) = scoped.insert(key.clone(), (idx, sub_idx)) {
                            if prev != sub_idx {
                                registry.collision(format!(
                                    "subcommand key '{key}' of '{}' maps to '{}', replacing '{}'",
                                    cmd.name, sub.name, cmd.subcommands[prev].name
                                ));
                            }
                        }
                    }
                }

                for alias in &cmd.aliases {
                    registry
                        .subcommands
                        .insert(alias.to_lowercase(), scoped.clone());
                }
                registry.subcommands.insert(name, scoped);
            }

            registry.commands.push(cmd);
        }

        registry
    }

    fn collision(&mut self, message: String) {
        warn!("command config collision: {}", message);
        self.collisions.push(message);
    }

    /// Name and alias collisions found in the configuration
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    /// Look up a command by primary name first, then by alias
    pub fn find_command(&self, name: &str) -> Option<&Command> {
        let name = name.to_lowercase();
        self.names
            .get(&name)
            .or_else(|| self.aliases.get(&name))
            .map(|&idx| &self.commands[idx])
    }

    /// Look up a subcommand scoped to `command` (its name or any of its aliases)
    pub fn find_subcommand(&self, command: &str, sub: &str) -> Option<&Subcommand> {
        let scoped = self.subcommands.get(&command.to_lowercase())?;
        scoped
            .get(&sub.to_lowercase())
            .map(|&(cmd_idx, sub_idx)| &self.commands[cmd_idx].subcommands[sub_idx])
    }

    pub fn default_command(&self) -> Option<&Command> {
        self.default_command.map(|idx| &self.commands[idx])
    }

    /// Commands for display, in configuration order, one per primary name
    pub fn list_commands(&self) -> Vec<&Command> {
        self.commands
            .iter()
            .enumerate()
            .filter(|(idx, cmd)| self.names.get(&cmd.name.to_lowercase()) == Some(idx))
            .map(|(_, cmd)| cmd)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Render every configured template once and collect the failures
    pub fn validate_templates(&self, executor: &TemplateExecutor) -> Vec<String> {
        let mut problems = Vec::new();

        for cmd in self.list_commands() {
            if let Err(err) = executor.check(&cmd.url) {
                problems.push(format!("command '{}': {}", cmd.name, err));
            }
            for sub in &cmd.subcommands {
                if let Err(err) = executor.check(&sub.url) {
                    problems.push(format!("subcommand '{} {}': {}", cmd.name, sub.name, err));
                }
            }
        }

        problems
    }
}

impl From<CommandConfig> for Registry {
    fn from(config: CommandConfig) -> Self {
        Registry::new(config)
    }
}
