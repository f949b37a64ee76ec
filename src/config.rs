//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default base URL of the cooperative's backend.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Remote service configuration.
///
/// Endpoint paths are configuration, never hardcoded in the flow logic.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL without a trailing slash.
    pub api_base: String,
    pub emergency_path: String,
    pub accounts_path: String,
    pub compare_path: String,
    pub chat_path: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            emergency_path: "/api/emergencias/emergencias/".to_string(),
            accounts_path: "/api/boletas/consulta/".to_string(),
            compare_path: "/api/boletas/comparar/".to_string(),
            chat_path: "/api/chat/".to_string(),
            api_token: None,
            timeout: Duration::from_secs(15),
        }
    }
}

impl GatewayConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base = lookup("INTAKE_API_BASE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.api_base);
        let api_base = api_base.trim().trim_end_matches('/').to_string();
        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_API_BASE".into(),
                message: format!("expected an http(s) URL, got {api_base:?}"),
            });
        }

        let timeout = match lookup("INTAKE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "INTAKE_TIMEOUT_SECS".into(),
                    message: format!("not a whole number of seconds: {raw:?}"),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.timeout,
        };

        Ok(Self {
            api_base,
            emergency_path: lookup("INTAKE_EMERGENCY_PATH").unwrap_or(defaults.emergency_path),
            accounts_path: lookup("INTAKE_ACCOUNTS_PATH").unwrap_or(defaults.accounts_path),
            compare_path: lookup("INTAKE_COMPARE_PATH").unwrap_or(defaults.compare_path),
            chat_path: lookup("INTAKE_CHAT_PATH").unwrap_or(defaults.chat_path),
            api_token: lookup("INTAKE_API_TOKEN")
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
            timeout,
        })
    }

    /// Join the base URL and an endpoint path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}/{}", self.api_base, path)
        }
    }

    pub fn emergency_url(&self) -> String {
        self.url(&self.emergency_path)
    }

    pub fn accounts_url(&self) -> String {
        self.url(&self.accounts_path)
    }

    pub fn compare_url(&self) -> String {
        self.url(&self.compare_path)
    }

    pub fn chat_url(&self) -> String {
        self.url(&self.chat_path)
    }
}

/// Binary configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// When set, serve the REST surface on this port instead of the REPL.
    pub http_port: Option<u16>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_port = lookup("INTAKE_HTTP_PORT")
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                    key: "INTAKE_HTTP_PORT".into(),
                    message: format!("not a valid port: {raw:?}"),
                })
            })
            .transpose()?;
        Ok(Self { http_port })
    }
}
