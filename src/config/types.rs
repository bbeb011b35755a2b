use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::{ConfigError, ConfigResult};
use crate::auth::AccessLevel;

pub const DEFAULT_MAX_PAYLOAD_KB: u64 = 16;
pub const DEFAULT_IMPORT_API_DOCS_URL: &str = "https://carto.com/docs/carto-engine/import-api/";

/// Main gateway configuration. Built once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for every job route. Empty or "/" mounts them at the root.
    pub base_path: String,
    /// When set, replaces the resolved database port for batch jobs
    pub batch_port: Option<u16>,
    pub environment: Environment,
    pub default_max_payload_kb: u64,
    pub import_api_docs_url: String,
    /// Hard transport cap, enforced before the pipeline sees the body
    pub max_request_body_bytes: usize,
    pub profiling: bool,
    pub api_keys: HashMap<String, ApiKeyEntry>,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub log_level: Option<String>,
    pub log_json: bool,
    pub log_dir: Option<String>,
    pub prometheus: Option<PrometheusSettings>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_path: "/api/v2".to_string(),
            batch_port: None,
            environment: Environment::Development,
            default_max_payload_kb: DEFAULT_MAX_PAYLOAD_KB,
            import_api_docs_url: DEFAULT_IMPORT_API_DOCS_URL.to_string(),
            max_request_body_bytes: 2 * 1024 * 1024,
            profiling: false,
            api_keys: HashMap::new(),
            database: DatabaseConfig::default(),
            rate_limit: RateLimitConfig::default(),
            log_level: None,
            log_json: false,
            log_dir: None,
            prometheus: None,
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> super::GatewayConfigBuilder {
        super::GatewayConfigBuilder::new()
    }

    pub fn is_test(&self) -> bool {
        self.environment == Environment::Test
    }

    /// Base path normalized for mounting; `None` means mount at the root.
    pub fn mount_path(&self) -> Option<&str> {
        let trimmed = self.base_path.trim_end_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "base_path".to_string(),
                value: self.base_path.clone(),
                reason: "must start with '/'".to_string(),
            });
        }
        if self.default_max_payload_kb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_max_payload_kb".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if (self.default_max_payload_kb as usize).saturating_mul(1024) > self.max_request_body_bytes
        {
            return Err(ConfigError::IncompatibleConfig {
                reason: format!(
                    "default_max_payload_kb ({}kb) exceeds max_request_body_bytes ({} bytes)",
                    self.default_max_payload_kb, self.max_request_body_bytes
                ),
            });
        }
        if let Err(e) = url::Url::parse(&self.import_api_docs_url) {
            return Err(ConfigError::InvalidValue {
                field: "import_api_docs_url".to_string(),
                value: self.import_api_docs_url.clone(),
                reason: e.to_string(),
            });
        }
        if self.database.host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "database.host".to_string(),
            });
        }
        for (key, entry) in &self.api_keys {
            if key.is_empty() || entry.username.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: "api key entries need a non-empty key and username".to_string(),
                });
            }
        }
        if self.rate_limit.enabled
            && (self.rate_limit.requests_per_window == 0 || self.rate_limit.window_secs == 0)
        {
            return Err(ConfigError::ValidationFailed {
                reason: "rate limit window and request count must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    /// Automated test runs; per-request result logging is muted
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub username: String,
    #[serde(default)]
    pub access: AccessLevel,
}

/// Defaults used to derive a user's database coordinates.
///
/// `{user}` in the templates is replaced with the resolved username.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname_template: String,
    pub master_user_template: String,
    pub public_user: String,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname_template: "cartodb_user_{user}_db".to_string(),
            master_user_template: "cartodb_user_{user}".to_string(),
            public_user: "publicuser".to_string(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_window: 60,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusSettings {
    pub host: String,
    pub port: u16,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 29000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_max_payload_kb, 16);
        assert_eq!(config.mount_path(), Some("/api/v2"));
    }

    #[test]
    fn test_mount_path_root() {
        let mut config = GatewayConfig::default();
        config.base_path = "/".to_string();
        assert_eq!(config.mount_path(), None);
        config.base_path = String::new();
        assert_eq!(config.mount_path(), None);
        config.base_path = "/api/v1/".to_string();
        assert_eq!(config.mount_path(), Some("/api/v1"));
    }

    #[test]
    fn test_relative_base_path_rejected() {
        let mut config = GatewayConfig::default();
        config.base_path = "api".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "base_path"
        ));
    }

    #[test]
    fn test_payload_limit_must_fit_transport_cap() {
        let mut config = GatewayConfig::default();
        config.max_request_body_bytes = 1024;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompatibleConfig { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = r#"
port: 9090
batch_port: 6432
environment: test
api_keys:
  "1234":
    username: vizzuality
    access: master
database:
  host: pg.internal
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.batch_port, Some(6432));
        assert!(config.is_test());
        assert_eq!(config.api_keys["1234"].access, AccessLevel::Master);
        assert_eq!(config.database.host, "pg.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.base_path, "/api/v2");
    }
}
