use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::api_key::Role;
use crate::domain::breaker::BreakerSettings;
use crate::domain::rate_limit::RoleLimits;
use crate::infrastructure::upstream::UpstreamConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub limits: LimitsConfig,
    pub breakers: BreakersConfig,
    pub operations: OperationsConfig,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Honor X-Forwarded-For / X-Real-IP only when running behind a proxy
    /// we control
    pub trusted_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Shared store selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    /// Process-local counters and key records; development only
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: Option<String>,
    pub connection_timeout_secs: u64,
}

/// Per-role bucket overrides; roles not listed use the built-in policy table
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LimitsConfig {
    pub roles: HashMap<Role, RoleLimitsConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RoleLimitsConfig {
    pub per_second: Option<u32>,
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakersConfig {
    pub default: BreakerSettingsConfig,
    pub dependencies: HashMap<String, BreakerSettingsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettingsConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
    pub max_backoff_exponent: u32,
    pub call_timeout_secs: u64,
}

/// Token costs per operation; unlisted operations cost 1
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperationsConfig {
    pub costs: HashMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub pypi_base_url: String,
    pub npm_base_url: String,
    pub github_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trusted_proxy: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis: RedisConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: Some("mcpd".to_string()),
            connection_timeout_secs: 5,
        }
    }
}

impl Default for BreakersConfig {
    fn default() -> Self {
        // Upstream-specific trip points: GitHub rate-limits aggressively, so
        // it gets a low threshold and a long cooldown
        let mut dependencies = HashMap::new();
        dependencies.insert(
            "github".to_string(),
            BreakerSettingsConfig {
                failure_threshold: 3,
                cooldown_secs: 300,
                ..Default::default()
            },
        );
        dependencies.insert(
            "pypi".to_string(),
            BreakerSettingsConfig {
                failure_threshold: 5,
                cooldown_secs: 120,
                ..Default::default()
            },
        );
        dependencies.insert(
            "npm".to_string(),
            BreakerSettingsConfig {
                failure_threshold: 5,
                cooldown_secs: 120,
                ..Default::default()
            },
        );

        Self {
            default: BreakerSettingsConfig::default(),
            dependencies,
        }
    }
}

impl Default for BreakerSettingsConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
            max_backoff_exponent: 4,
            call_timeout_secs: 10,
        }
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        let mut costs = HashMap::new();
        costs.insert("rescrape".to_string(), 20);

        Self { costs }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            pypi_base_url: "https://pypi.org".to_string(),
            npm_base_url: "https://registry.npmjs.org".to_string(),
            github_base_url: "https://api.github.com".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl RoleLimitsConfig {
    pub fn to_limits(&self) -> RoleLimits {
        RoleLimits::new(self.per_second, self.per_minute, self.per_hour)
    }
}

impl LimitsConfig {
    pub fn overrides(&self) -> HashMap<Role, RoleLimits> {
        self.roles
            .iter()
            .map(|(role, limits)| (*role, limits.to_limits()))
            .collect()
    }
}

impl BreakerSettingsConfig {
    pub fn to_settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            max_backoff_exponent: self.max_backoff_exponent,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

impl BreakersConfig {
    pub fn dependency_settings(&self) -> HashMap<String, BreakerSettings> {
        self.dependencies
            .iter()
            .map(|(name, settings)| (name.clone(), settings.to_settings()))
            .collect()
    }
}

impl UpstreamSettings {
    pub fn to_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            pypi_base_url: self.pypi_base_url.clone(),
            npm_base_url: self.npm_base_url.clone(),
            github_base_url: self.github_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
