use serde::Deserialize;

use crate::domain::chat::AssistantConfig;
use crate::domain::exchange::ExchangeCacheConfig;
use crate::domain::DomainError;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::storage::{StorageConfig, StorageType};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub cache: ExchangeCacheConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API directly
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where exchanges are persisted
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
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

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            max_connections: None,
        }
    }
}

impl StorageSettings {
    /// Resolve the backend name and connection options
    pub fn to_storage_config(&self) -> Result<StorageConfig, DomainError> {
        let config = StorageConfig::from_backend(&self.backend, self.url.as_deref())?;

        match (config, self.max_connections) {
            (StorageConfig::Postgres(pg), Some(max)) => {
                Ok(StorageConfig::postgres(pg.with_max_connections(max)))
            }
            (config, _) => Ok(config),
        }
    }

    pub fn is_persistent(&self) -> bool {
        StorageType::from_str(&self.backend) == Some(StorageType::Postgres)
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
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    /// Checks that deserialization alone cannot express
    pub fn validated(self) -> Result<Self, config::ConfigError> {
        self.cache
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderKind;

    fn from_toml(source: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = from_toml("");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.cache.scan_limit, 100);
        assert_eq!(config.cache.retention_days, 30);
        assert_eq!(config.assistant.max_prompt_chars, 5000);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 3001
            cors_origins = ["http://localhost:3000"]

            [logging]
            level = "debug"
            format = "json"

            [cache]
            similarity_threshold = 0.9
            max_retries = 4

            [assistant]
            default_provider = "groq"

            [storage]
            backend = "postgres"
            url = "postgres://localhost/teamup"
            max_connections = 4
            "#,
        );

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.cache.similarity_threshold, 0.9);
        assert_eq!(config.cache.max_attempts(), 5);
        assert_eq!(config.cache.scan_limit, 100);
        assert_eq!(config.assistant.default_provider, ProviderKind::Groq);
        assert!(config.storage.is_persistent());

        match config.storage.to_storage_config().unwrap() {
            StorageConfig::Postgres(pg) => assert_eq!(pg.max_connections, 4),
            other => panic!("unexpected storage config: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let config = from_toml("[cache]\nsimilarity_threshold = 1.5");
        assert!(config.validated().is_err());

        let config = from_toml("[cache]\nsimilarity_threshold = -1.0");
        assert!(config.validated().is_err());

        let config = from_toml("[cache]\nsimilarity_threshold = 1.0");
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_postgres_without_url_is_rejected() {
        let settings = StorageSettings {
            backend: "postgres".to_string(),
            url: None,
            max_connections: None,
        };

        assert!(settings.to_storage_config().is_err());
    }
}
