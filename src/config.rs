use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend API that owns `/auth/refresh-token` and `/auth/logout`.
    pub api_base_url: String,
    pub environment: Environment,
    pub protected_prefixes: Vec<String>,
    /// Public auth area; reachable without a session.
    pub auth_prefix: String,
    pub signin_path: String,
    pub set_password_path: String,
    pub home_path: String,
    pub session_max_age_secs: u64,
    /// Auth API request timeout; 0 disables it.
    pub api_timeout_secs: u64,
    /// HS256 secret; when unset, session tokens are decoded without signature checks.
    pub session_secret: Option<String>,
    /// Frontend that receives requests the gate lets through.
    pub upstream_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".to_string(),
            environment: Environment::Development,
            protected_prefixes: vec!["/dashboard".to_string(), "/auth".to_string()],
            auth_prefix: "/auth".to_string(),
            signin_path: "/auth/signin".to_string(),
            set_password_path: "/auth/set-password".to_string(),
            home_path: "/".to_string(),
            session_max_age_secs: 15 * 60,
            api_timeout_secs: 10,
            session_secret: None,
            upstream_url: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: Config = serde_json::from_str(&raw).context("parsing config JSON")?;
        Ok(cfg)
    }

    /// Reads `path` when it exists, falls back to defaults otherwise, then
    /// applies `GATE_*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let cfg = if Path::new(path).is_file() {
            Self::from_file(path)?
        } else {
            debug!(path, "config file not found, using defaults");
            Self::default()
        };
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("GATE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(env) = std::env::var("GATE_ENV") {
            self.environment = Environment::parse(&env);
        }
        if let Ok(url) = std::env::var("GATE_UPSTREAM_URL") {
            self.upstream_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(secret) = std::env::var("GATE_SESSION_SECRET") {
            self.session_secret = Some(secret).filter(|s| !s.is_empty());
        }
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "api_base_url": "https://api.example.com",
                "environment": "production",
                "protected_prefixes": ["/dashboard"],
                "session_max_age_secs": 60
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert!(config.is_production());
        assert_eq!(config.protected_prefixes, vec!["/dashboard".to_string()]);
        assert_eq!(config.session_max_age_secs, 60);
        // Unset fields keep their defaults
        assert_eq!(config.signin_path, "/auth/signin");
        assert_eq!(config.api_timeout_secs, 10);
        assert!(config.upstream_url.is_none());
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse(" production "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn test_load_defaults_and_env_overrides() {
        std::env::set_var("GATE_API_BASE_URL", "http://auth.internal:9000");
        std::env::set_var("GATE_ENV", "production");
        std::env::set_var("GATE_UPSTREAM_URL", "");

        let config = Config::load("/nonexistent/path/config.json").unwrap();
        assert_eq!(config.api_base_url, "http://auth.internal:9000");
        assert!(config.is_production());
        assert!(config.upstream_url.is_none());
        assert_eq!(config.home_path, "/");

        std::env::remove_var("GATE_API_BASE_URL");
        std::env::remove_var("GATE_ENV");
        std::env::remove_var("GATE_UPSTREAM_URL");
    }
}
