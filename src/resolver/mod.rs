//! Query resolution: free-text query in, redirect decision out
//!
//! The resolver splits the query into `command [arg [rest]]`, looks the
//! command up in the registry, picks the URL template to render and records
//! exactly one usage event per query.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::analytics::{ClientInfo, UsageEvent, UsageSink};
use crate::commands::{Registry, TemplateError, TemplateExecutor};

/// Search URL used when no configured command can handle the query
pub const FALLBACK_SEARCH_URL: &str = "https://www.google.com/?q=";

/// Command name recorded for hardcoded-fallback redirects
pub const FALLBACK_COMMAND: &str = "google-fallback";

/// Command name recorded for help/list requests
pub const HELP_COMMAND: &str = "help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Show the command list
    Help,
    /// Redirect to the given URL
    Redirect(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Encode a query for use inside a URL query component (spaces become `+`)
pub fn percent_encode_query(query: &str) -> String {
    urlencoding::encode(query).replace("%20", "+")
}

pub fn fallback_url(query: &str) -> String {
    format!("{FALLBACK_SEARCH_URL}{}", percent_encode_query(query))
}

pub struct Resolver {
    registry: Arc<Registry>,
    templates: TemplateExecutor,
    usage: Arc<dyn UsageSink>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>, usage: Arc<dyn UsageSink>) -> Self {
        Self {
            registry,
            templates: TemplateExecutor::new(),
            usage,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Decide where `q` goes and record the usage event.
    ///
    /// Unknown commands and missing queries are routing decisions, not
    /// errors. Only a broken configured template fails.
    pub fn resolve(&self, q: &str, client: &ClientInfo) -> Result<Resolution, ResolveError> {
        let mut parts = q.splitn(3, char::is_whitespace);
        let cmd_token = parts.next().unwrap_or_default();
        let arg = parts.next();
        let rest = parts.next();

        if cmd_token.eq_ignore_ascii_case("list") || cmd_token.eq_ignore_ascii_case("help") {
            self.usage.record(UsageEvent::new(HELP_COMMAND, q, client));
            return Ok(Resolution::Help);
        }

        let Some(cmd) = self.registry.find_command(cmd_token) else {
            return self.resolve_unknown(q, client);
        };

        let Some(arg) = arg else {
            if cmd.requires_query {
                debug!(command = %cmd.name, "command requires a query, using fallback search");
                self.usage
                    .record(UsageEvent::new(FALLBACK_COMMAND, q, client).fallback());
                return Ok(Resolution::Redirect(fallback_url(q)));
            }
            self.usage.record(UsageEvent::new(&cmd.name, q, client));
            return self.render(&cmd.url, "");
        };

        if let Some(sub) = self.registry.find_subcommand(cmd_token, arg) {
            let query = rest.map(percent_encode_query).unwrap_or_default();
            self.usage
                .record(UsageEvent::new(&cmd.name, q, client).with_subcommand(&sub.name));
            return self.render(&sub.url, &query);
        }

        let query = match rest {
            Some(rest) => percent_encode_query(&format!("{arg} {rest}")),
            None => percent_encode_query(arg),
        };
        self.usage.record(UsageEvent::new(&cmd.name, q, client));
        self.render(&cmd.url, &query)
    }

    fn resolve_unknown(&self, q: &str, client: &ClientInfo) -> Result<Resolution, ResolveError> {
        match self.registry.default_command() {
            Some(default) => {
                self.usage
                    .record(UsageEvent::new(&default.name, q, client).fallback());
                self.render(&default.url, &percent_encode_query(q))
            }
            None => {
                self.usage
                    .record(UsageEvent::new(FALLBACK_COMMAND, q, client).fallback());
                Ok(Resolution::Redirect(fallback_url(q)))
            }
        }
    }

    fn render(&self, template: &str, query: &str) -> Result<Resolution, ResolveError> {
        Ok(Resolution::Redirect(self.templates.render(template, query)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Command, CommandConfig, Subcommand};
    use parking_lot::Mutex;

    /// Sink that keeps events in memory
    #[derive(Default)]
    struct MemorySink {
        events: Mutex<Vec<UsageEvent>>,
    }

    impl UsageSink for MemorySink {
        fn record(&self, event: UsageEvent) {
            self.events.lock().push(event);
        }
    }

    impl MemorySink {
        fn last(&self) -> UsageEvent {
            self.events.lock().last().cloned().unwrap()
        }

        fn len(&self) -> usize {
            self.events.lock().len()
        }
    }

    fn command(name: &str, aliases: &[&str], url: &str, requires_query: bool) -> Command {
        Command {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            description: String::new(),
            url: url.to_string(),
            requires_query,
            default: false,
            subcommands: vec![],
        }
    }

    fn test_commands() -> Vec<Command> {
        let mut google = command("google", &["g", "search"], "https://www.google.com/?q={{ query }}", true);
        google.default = true;

        let mut github = command("github", &["gh"], "https://github.com/search?q={{ query }}", false);
        github.subcommands.push(Subcommand {
            name: "pr".to_string(),
            aliases: vec!["pull".to_string()],
            description: "GitHub pull requests".to_string(),
            url: "https://github.com/pulls?q={{ query }}".to_string(),
        });

        vec![
            google,
            command("stackoverflow", &["so", "stack"], "https://stackoverflow.com/search?q={{ query }}", true),
            command("author", &[], "https://www.markusdosch.com", false),
            github,
        ]
    }

    fn resolver_with(commands: Vec<Command>) -> (Resolver, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let registry = Arc::new(Registry::new(CommandConfig { commands }));
        let resolver = Resolver::new(registry, sink.clone());
        (resolver, sink)
    }

    fn client() -> ClientInfo {
        ClientInfo::new("test-agent", "127.0.0.1")
    }

    fn redirect(resolver: &Resolver, q: &str) -> String {
        match resolver.resolve(q, &client()).unwrap() {
            Resolution::Redirect(url) => url,
            Resolution::Help => panic!("expected redirect for {q:?}"),
        }
    }

    #[test]
    fn test_percent_encode_query() {
        assert_eq!(percent_encode_query("hello world"), "hello+world");
        assert_eq!(percent_encode_query("a&b=c?"), "a%26b%3Dc%3F");
        assert_eq!(percent_encode_query("100%"), "100%25");
        assert_eq!(percent_encode_query("-_.~"), "-_.~");
        assert_eq!(percent_encode_query("a+b"), "a%2Bb");
        assert_eq!(percent_encode_query("ü"), "%C3%BC");
        assert_eq!(percent_encode_query(""), "");
    }

    #[test]
    fn test_help_and_list() {
        let (resolver, sink) = resolver_with(test_commands());
        for q in ["help", "list", "HELP", "List me"] {
            assert_eq!(resolver.resolve(q, &client()).unwrap(), Resolution::Help);
            let event = sink.last();
            assert_eq!(event.command, HELP_COMMAND);
            assert_eq!(event.query, q);
            assert!(!event.is_default);
            assert!(!event.is_subcommand);
        }
    }

    #[test]
    fn test_command_with_query() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "g test query"), "https://www.google.com/?q=test+query");
        assert_eq!(
            redirect(&resolver, "so golang testing"),
            "https://stackoverflow.com/search?q=golang+testing"
        );

        let event = sink.last();
        assert_eq!(event.command, "stackoverflow");
        assert_eq!(event.query, "so golang testing");
        assert_eq!(event.user_agent, "test-agent");
        assert_eq!(event.remote_addr, "127.0.0.1");
        assert!(!event.is_default);
    }

    #[test]
    fn test_case_insensitive_commands() {
        let (resolver, _) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "G test"), "https://www.google.com/?q=test");
        assert_eq!(redirect(&resolver, "So test"), "https://stackoverflow.com/search?q=test");
    }

    #[test]
    fn test_special_characters_encoded() {
        let (resolver, _) = resolver_with(test_commands());
        assert_eq!(
            redirect(&resolver, "g hello world & special chars!"),
            "https://www.google.com/?q=hello+world+%26+special+chars%21"
        );
    }

    #[test]
    fn test_bare_command_without_required_query() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "author"), "https://www.markusdosch.com");
        assert_eq!(
            redirect(&resolver, "github"),
            "https://github.com/search?q="
        );

        let event = sink.last();
        assert_eq!(event.command, "github");
        assert!(!event.is_default);
    }

    #[test]
    fn test_bare_command_requiring_query_falls_back() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "so"), "https://www.google.com/?q=so");
        assert_eq!(redirect(&resolver, "G"), "https://www.google.com/?q=G");

        let event = sink.last();
        assert_eq!(event.command, FALLBACK_COMMAND);
        assert!(event.is_default);
    }

    #[test]
    fn test_unknown_command_uses_default_with_full_query() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(
            redirect(&resolver, "nonexistent command test"),
            "https://www.google.com/?q=nonexistent+command+test"
        );

        let event = sink.last();
        assert_eq!(event.command, "google");
        assert!(event.is_default);
        assert!(!event.is_subcommand);
    }

    #[test]
    fn test_empty_query_uses_default() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, ""), "https://www.google.com/?q=");
        assert_eq!(sink.last().command, "google");
    }

    #[test]
    fn test_unknown_command_without_default_uses_fallback() {
        let (resolver, sink) = resolver_with(vec![command(
            "author",
            &[],
            "https://www.markusdosch.com",
            false,
        )]);
        assert_eq!(
            redirect(&resolver, "nonexistent thing"),
            "https://www.google.com/?q=nonexistent+thing"
        );
        assert_eq!(redirect(&resolver, ""), "https://www.google.com/?q=");

        let event = sink.last();
        assert_eq!(event.command, FALLBACK_COMMAND);
        assert!(event.is_default);
    }

    #[test]
    fn test_subcommand() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(
            redirect(&resolver, "github pr open issues"),
            "https://github.com/pulls?q=open+issues"
        );

        let event = sink.last();
        assert_eq!(event.command, "github");
        assert!(event.is_subcommand);
        assert_eq!(event.subcommand.as_deref(), Some("pr"));
        assert!(!event.is_default);
    }

    #[test]
    fn test_subcommand_via_aliases() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "gh pull fix"), "https://github.com/pulls?q=fix");
        assert_eq!(sink.last().subcommand.as_deref(), Some("pr"));
    }

    #[test]
    fn test_subcommand_without_query() {
        let (resolver, _) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "gh PR"), "https://github.com/pulls?q=");
    }

    #[test]
    fn test_non_subcommand_argument_is_query() {
        let (resolver, sink) = resolver_with(test_commands());
        assert_eq!(
            redirect(&resolver, "github rust async runtime"),
            "https://github.com/search?q=rust+async+runtime"
        );

        let event = sink.last();
        assert!(!event.is_subcommand);
        assert!(event.subcommand.is_none());
    }

    #[test]
    fn test_subcommand_name_under_other_command_is_query() {
        let (resolver, _) = resolver_with(test_commands());
        assert_eq!(redirect(&resolver, "g pr review"), "https://www.google.com/?q=pr+review");
    }

    #[test]
    fn test_every_request_records_one_event() {
        let (resolver, sink) = resolver_with(test_commands());
        for q in ["help", "g x", "so", "author", "gh pr x", "gh x", "nope", ""] {
            let _ = resolver.resolve(q, &client());
        }
        assert_eq!(sink.len(), 8);
    }

    #[test]
    fn test_broken_template_is_error() {
        let mut default = command("broken", &[], "https://x.test/?q={{ .Query }}", true);
        default.default = true;
        let (resolver, _) = resolver_with(vec![
            default,
            command("typo", &[], "https://x.test/?q={{ querry }}", false),
        ]);

        assert!(matches!(
            resolver.resolve("typo", &client()),
            Err(ResolveError::Template(_))
        ));
        assert!(resolver.resolve("unknown words", &client()).is_err());
    }

    #[test]
    fn test_redirect_survives_log_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Appending to a directory fails on every write
        let logger = Arc::new(crate::analytics::UsageLogger::new(dir.path()));
        let registry = Arc::new(Registry::new(CommandConfig {
            commands: test_commands(),
        }));
        let resolver = Resolver::new(registry, logger);

        assert_eq!(redirect(&resolver, "g rust"), "https://www.google.com/?q=rust");
        assert_eq!(redirect(&resolver, "nope"), "https://www.google.com/?q=nope");
    }
}
