use std::path::Path;

use super::{
    ApiKeyEntry, ConfigError, ConfigResult, DatabaseConfig, Environment, GatewayConfig,
    PrometheusSettings, RateLimitConfig,
};
use crate::auth::AccessLevel;

/// Builder for GatewayConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership
    pub fn from_config(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Start from a YAML file; fields it omits keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: GatewayConfig =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::FileLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_config(config))
    }

    // ==================== Server ====================

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.base_path = base_path.into();
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn max_request_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_request_body_bytes = bytes;
        self
    }

    // ==================== Jobs ====================

    pub fn batch_port(mut self, port: u16) -> Self {
        self.config.batch_port = Some(port);
        self
    }

    pub fn maybe_batch_port(mut self, port: Option<u16>) -> Self {
        if port.is_some() {
            self.config.batch_port = port;
        }
        self
    }

    pub fn default_max_payload_kb(mut self, kb: u64) -> Self {
        self.config.default_max_payload_kb = kb;
        self
    }

    pub fn import_api_docs_url(mut self, url: impl Into<String>) -> Self {
        self.config.import_api_docs_url = url.into();
        self
    }

    pub fn profiling(mut self, enabled: bool) -> Self {
        self.config.profiling = enabled;
        self
    }

    // ==================== Collaborators ====================

    pub fn api_key(
        mut self,
        key: impl Into<String>,
        username: impl Into<String>,
        access: AccessLevel,
    ) -> Self {
        self.config.api_keys.insert(
            key.into(),
            ApiKeyEntry {
                username: username.into(),
                access,
            },
        );
        self
    }

    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = database;
        self
    }

    pub fn database_host(mut self, host: impl Into<String>) -> Self {
        self.config.database.host = host.into();
        self
    }

    pub fn database_port(mut self, port: u16) -> Self {
        self.config.database.port = port;
        self
    }

    pub fn rate_limit(mut self, requests_per_window: u32, window_secs: u64) -> Self {
        self.config.rate_limit = RateLimitConfig {
            enabled: true,
            requests_per_window,
            window_secs,
        };
        self
    }

    // ==================== Observability ====================

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = Some(level.into());
        self
    }

    pub fn log_json(mut self, json: bool) -> Self {
        self.config.log_json = json;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.log_dir = Some(dir.into());
        self
    }

    pub fn prometheus(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.prometheus = Some(PrometheusSettings {
            host: host.into(),
            port,
        });
        self
    }

    // ==================== Build ====================

    pub fn build(self) -> ConfigResult<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Skips validation; meant for tests that need deliberately odd configs.
    pub fn build_unchecked(self) -> GatewayConfig {
        self.config
    }
}
