//! Configuration management for the IoT agent.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`IOT_AGENT__` prefix, `__` separator)
//! 2. Config file (`config/agent.toml`, `.ini` and other formats also accepted)
//! 3. Legacy `BACKEND_URL` / `AUTH_TOKEN` environment variables
//! 4. Defaults

use serde::Deserialize;

use crate::error::AgentError;

pub const DEFAULT_CONFIG_PREFIX: &str = "config/agent";
pub const ENV_PREFIX: &str = "IOT_AGENT";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Backend connection settings, from the `[connection]` section.
///
/// The agent does not talk to the backend yet; these are carried so the
/// reporting sink can pick them up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub backend_url: String,

    #[serde(default)]
    pub auth_token: String,
}

impl ConnectionConfig {
    /// Fill unset fields from the legacy environment variables, then defaults.
    pub fn with_fallbacks<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.backend_url.is_empty() {
            self.backend_url =
                lookup("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        }
        if self.auth_token.is_empty() {
            self.auth_token = lookup("AUTH_TOKEN").unwrap_or_default();
        }
        self
    }

    pub fn has_token(&self) -> bool {
        !self.auth_token.is_empty()
    }
}

/// Build the layered config source shared by every section.
pub fn load_layered(file_prefix: &str) -> Result<config::Config, AgentError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Load the `[connection]` section, applying legacy env fallbacks.
pub fn load_connection_config(cfg: &config::Config) -> ConnectionConfig {
    let conn = match cfg.get::<ConnectionConfig>("connection") {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "No [connection] section, using defaults");
            ConnectionConfig::default()
        }
    };
    conn.with_fallbacks(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallbacks_use_legacy_env() {
        let conn = ConnectionConfig::default().with_fallbacks(|key| match key {
            "BACKEND_URL" => Some("https://iot.example.com".to_string()),
            "AUTH_TOKEN" => Some("s3cret".to_string()),
            _ => None,
        });
        assert_eq!(conn.backend_url, "https://iot.example.com");
        assert!(conn.has_token());
    }

    #[test]
    fn test_fallbacks_default_backend() {
        let conn = ConnectionConfig::default().with_fallbacks(|_| None);
        assert_eq!(conn.backend_url, DEFAULT_BACKEND_URL);
        assert!(!conn.has_token());
    }

    #[test]
    fn test_file_value_wins_over_legacy_env() {
        let conn = ConnectionConfig {
            backend_url: "http://10.0.0.2:9000".to_string(),
            auth_token: String::new(),
        }
        .with_fallbacks(|_| Some("http://ignored".to_string()));
        assert_eq!(conn.backend_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn test_load_connection_section() {
        let cfg = config::Config::builder()
            .set_override("connection.backend_url", "http://backend.lan")
            .unwrap()
            .build()
            .unwrap();
        let conn = load_connection_config(&cfg);
        assert_eq!(conn.backend_url, "http://backend.lan");
    }
}
