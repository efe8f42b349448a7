use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
    /// External HTTP source polling configuration
    pub polling: PollingConfig,
    /// MQTT ingestion configuration
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,

    #[serde(default = "default_database_name")]
    pub database: String,

    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,

    #[serde(default = "default_history_max_range_days")]
    pub history_max_range_days: i64,

    #[serde(default = "default_max_export_rows")]
    pub max_export_rows: i64,

    #[serde(default = "default_max_upload_batch")]
    pub max_upload_batch: usize,

    #[serde(default = "default_reading_retention_days")]
    pub reading_retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// How often the poll job checks for due sources.
    #[serde(default = "default_poll_tick")]
    pub tick_secs: u64,

    /// Consecutive failures after which a source is deactivated.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Per-request timeout for source fetches.
    #[serde(default = "default_poll_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Fixed delay before re-polling a failed broker connection.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// rumqttc request channel capacity per source.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Time budget for the connection probe endpoint.
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,

    /// Hub broadcast channel capacity; lagging subscribers drop messages.
    #[serde(default = "default_hub_capacity")]
    pub hub_capacity: usize,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_database_name() -> String {
    "airwatch".to_string()
}
fn default_max_pool_size() -> u32 {
    20
}
fn default_min_pool_size() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_server_selection_timeout() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit() -> u32 {
    120
}
fn default_page_size() -> i64 {
    100
}
fn default_max_page_size() -> i64 {
    1000
}
fn default_history_max_range_days() -> i64 {
    92
}
fn default_max_export_rows() -> i64 {
    10_000
}
fn default_max_upload_batch() -> usize {
    500
}
fn default_reading_retention_days() -> u32 {
    365
}
fn default_poll_tick() -> u64 {
    30
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_poll_request_timeout() -> u64 {
    15
}
fn default_keep_alive() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    64
}
fn default_test_timeout() -> u64 {
    5
}
fn default_hub_capacity() -> usize {
    256
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with AW__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("AW").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults so tests do not depend on
    /// config files being present.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            uri = "mongodb://localhost:27017"
            database = "airwatch_test"
            max_pool_size = 20
            min_pool_size = 2
            connect_timeout_secs = 10
            server_selection_timeout_secs = 5

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_per_minute = 120

            [limits]
            default_page_size = 100
            max_page_size = 1000
            history_max_range_days = 92
            max_export_rows = 10000
            max_upload_batch = 500
            reading_retention_days = 365

            [polling]
            tick_secs = 30
            failure_threshold = 5
            request_timeout_secs = 15

            [mqtt]
            keep_alive_secs = 30
            reconnect_delay_secs = 10
            channel_capacity = 64
            test_timeout_secs = 5
            hub_capacity = 256
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.uri.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "AW__DATABASE__URI environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_pool_size > self.database.max_pool_size {
            return Err(ConfigValidationError::InvalidValue(
                "min_pool_size cannot exceed max_pool_size".to_string(),
            ));
        }

        if self.polling.tick_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "polling.tick_secs cannot be 0".to_string(),
            ));
        }

        if self.limits.default_page_size > self.limits.max_page_size {
            return Err(ConfigValidationError::InvalidValue(
                "default_page_size cannot exceed max_page_size".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .expect("Invalid socket address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.database, "airwatch_test");
        assert_eq!(config.polling.failure_threshold, 5);
        assert_eq!(config.mqtt.reconnect_delay_secs, 10);
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("server.port", "9000"),
            ("polling.failure_threshold", "3"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.polling.failure_threshold, 3);
    }

    #[test]
    fn test_config_validation_missing_uri() {
        let config = Config::load_for_test(&[("database.uri", "")]).unwrap();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("AW__DATABASE__URI"));
    }

    #[test]
    fn test_config_validation_pool_sizes() {
        let config = Config::load_for_test(&[
            ("database.min_pool_size", "50"),
            ("database.max_pool_size", "10"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_page_sizes() {
        let config = Config::load_for_test(&[
            ("limits.default_page_size", "2000"),
            ("limits.max_page_size", "1000"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_tick() {
        let config = Config::load_for_test(&[("polling.tick_secs", "0")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::load_for_test(&[
            ("server.host", "127.0.0.1"),
            ("server.port", "3000"),
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }
}
