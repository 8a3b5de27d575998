use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level command document (`commands.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// A named redirect target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub url: String,
    // `requiresquery` covers documents read back with lowercased keys
    #[serde(default, alias = "requiresquery")]
    pub requires_query: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<Subcommand>,
}

/// A redirect target scoped under exactly one command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcommand {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub url: String,
}

impl CommandConfig {
    /// Load the command document from disk.
    ///
    /// The format is picked from the file extension (`.json`, `.yaml`,
    /// `.toml`); files without a known extension are read as JSON.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => config::FileFormat::Yaml,
            Some("toml") => config::FileFormat::Toml,
            _ => config::FileFormat::Json,
        };

        let source = config::Config::builder()
            .add_source(config::File::from(path).format(format).required(true))
            .build()
            .with_context(|| format!("failed to read command config '{}'", path.display()))?;

        source
            .try_deserialize::<CommandConfig>()
            .with_context(|| format!("failed to parse command config '{}'", path.display()))
    }
}
