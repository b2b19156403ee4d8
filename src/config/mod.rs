use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection pool settings, applied per endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum cached connections per endpoint (0 disables caching)
    #[serde(default = "default_pool_size")]
    pub size: usize,

    /// How long an acquisition may block waiting for a free slot
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_pool_size() -> usize {
    2
}

fn default_acquire_timeout() -> u64 {
    5
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ordered "host:port" endpoints; the first is the preferred delegate
    pub endpoints: Vec<String>,

    /// Per-endpoint pool settings
    #[serde(default)]
    pub pool: PoolSettings,

    /// Transport connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// When true, every connection is used once and discarded, never pooled
    #[serde(default)]
    pub single_use: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

impl Config {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.acquire_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Split the configured endpoints into (host, port) pairs.
    pub fn parsed_endpoints(&self) -> Result<Vec<(String, u16)>> {
        self.endpoints
            .iter()
            .map(|endpoint| {
                let (host, port) = endpoint
                    .rsplit_once(':')
                    .with_context(|| format!("Endpoint '{}' is missing a port", endpoint))?;
                let port: u16 = port
                    .parse()
                    .with_context(|| format!("Endpoint '{}' has an invalid port", endpoint))?;
                Ok((host.to_string(), port))
            })
            .collect()
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// Supported variables:
/// - TCPPOOL_ENDPOINTS (comma-separated list of host:port endpoints)
/// - TCPPOOL_POOL_SIZE (optional)
/// - TCPPOOL_ACQUIRE_TIMEOUT (optional, seconds)
/// - TCPPOOL_CONNECT_TIMEOUT (optional, seconds)
/// - TCPPOOL_SINGLE_USE (optional, "true"/"false")
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let endpoints_str = std::env::var("TCPPOOL_ENDPOINTS")
        .context("TCPPOOL_ENDPOINTS environment variable not set")?;

    let endpoints: Vec<String> = endpoints_str
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if endpoints.is_empty() {
        anyhow::bail!("TCPPOOL_ENDPOINTS contains no valid endpoints");
    }

    let mut config = Config {
        endpoints,
        pool: PoolSettings::default(),
        connect_timeout_secs: default_connect_timeout(),
        single_use: false,
    };

    if let Ok(size) = std::env::var("TCPPOOL_POOL_SIZE") {
        if let Ok(val) = size.parse() {
            config.pool.size = val;
        }
    }

    if let Ok(timeout) = std::env::var("TCPPOOL_ACQUIRE_TIMEOUT") {
        if let Ok(val) = timeout.parse() {
            config.pool.acquire_timeout_secs = val;
        }
    }

    if let Ok(timeout) = std::env::var("TCPPOOL_CONNECT_TIMEOUT") {
        if let Ok(val) = timeout.parse() {
            config.connect_timeout_secs = val;
        }
    }

    if let Ok(single_use) = std::env::var("TCPPOOL_SINGLE_USE") {
        config.single_use = single_use == "true" || single_use == "1";
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// Tries the YAML file when a path is given, otherwise falls back to
/// environment variables.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        load_from_yaml(path)
    } else {
        load_from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
endpoints:
  - "10.0.0.1:7000"
  - "10.0.0.2:7000"

pool:
  size: 4
  acquire_timeout_secs: 2

connect_timeout_secs: 3
single_use: false
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.pool.acquire_timeout_secs, 2);
        assert_eq!(config.connect_timeout_secs, 3);
        assert!(!config.single_use);
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
endpoints:
  - "10.0.0.1:7000"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.pool.size, 2);
        assert_eq!(config.pool.acquire_timeout_secs, 5);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(!config.single_use);
    }

    #[test]
    fn test_parsed_endpoints() {
        let yaml = r#"
endpoints:
  - "10.0.0.1:7000"
  - "broker.example.com:7001"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let parsed = config.parsed_endpoints().unwrap();

        assert_eq!(parsed[0], ("10.0.0.1".to_string(), 7000));
        assert_eq!(parsed[1], ("broker.example.com".to_string(), 7001));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config: Config = serde_yaml::from_str("endpoints: [\"no-port\"]").unwrap();
        assert!(config.parsed_endpoints().is_err());

        let config: Config = serde_yaml::from_str("endpoints: [\"host:badport\"]").unwrap();
        assert!(config.parsed_endpoints().is_err());
    }
}
