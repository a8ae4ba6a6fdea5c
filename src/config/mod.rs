mod app_config;

pub use app_config::{
    AppConfig, BreakerSettingsConfig, BreakersConfig, LimitsConfig, LogFormat, LoggingConfig,
    OperationsConfig, RedisConfig, RoleLimitsConfig, ServerConfig, StoreBackend, StoreConfig,
    UpstreamSettings,
};
