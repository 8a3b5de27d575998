use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub commands_file: PathBuf,
    pub analytics: AnalyticsConfig,
    pub proxy: ProxyConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Append-only usage log
    pub log_file: PathBuf,
    /// Capacity of the recorder channel; events beyond it are dropped
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    None,
    Standard,
    Cloudflare,
}

/// How the client address recorded in usage events is determined
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub mode: TrustedProxyMode,
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: TrustedProxyMode::None,
            trusted_proxies: vec![],
            num_trusted_proxies: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    /// Directory containing dashboard files
    /// If None, uses the embedded dashboard
    pub static_dir: Option<String>,
}

impl AnalyticsConfig {
    const fn default_buffer_size() -> usize {
        10_000
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let commands_file =
            std::env::var("COMMANDS_FILE").unwrap_or_else(|_| "commands.json".to_string());
        let log_file = std::env::var("USAGE_LOG").unwrap_or_else(|_| "usage.log".to_string());
        let buffer_size = std::env::var("ANALYTICS_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(AnalyticsConfig::default_buffer_size);

        let mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = match std::env::var("TRUSTED_PROXIES") {
            Ok(list) => parse_cidr_list(&list)?,
            Err(_) => vec![],
        };

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        let static_dir = std::env::var("DASHBOARD_STATIC_DIR").ok();

        Ok(Config {
            server: ServerConfig { host, port },
            commands_file: PathBuf::from(commands_file),
            analytics: AnalyticsConfig {
                log_file: PathBuf::from(log_file),
                buffer_size,
            },
            proxy: ProxyConfig {
                mode,
                trusted_proxies,
                num_trusted_proxies,
            },
            dashboard: DashboardConfig { static_dir },
        })
    }
}

/// Parse a comma-separated list of CIDRs; bare addresses become host routes
pub fn parse_cidr_list(list: &str) -> anyhow::Result<Vec<IpNet>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpNet>()
                .ok()
                .or_else(|| s.parse::<std::net::IpAddr>().ok().map(IpNet::from))
                .with_context(|| format!("invalid proxy CIDR '{s}' in TRUSTED_PROXIES"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_list() {
        let nets = parse_cidr_list("10.0.0.0/8, 192.168.1.7,, 2001:db8::/32").unwrap();
        assert_eq!(nets.len(), 3);
        assert!(nets[0].contains(&"10.1.2.3".parse::<std::net::IpAddr>().unwrap()));
        assert_eq!(nets[1].prefix_len(), 32);
    }

    #[test]
    fn test_parse_cidr_list_rejects_garbage() {
        assert!(parse_cidr_list("10.0.0.0/8, not-an-ip").is_err());
    }

    #[test]
    fn test_parse_cidr_list_empty() {
        assert!(parse_cidr_list("").unwrap().is_empty());
    }
}
