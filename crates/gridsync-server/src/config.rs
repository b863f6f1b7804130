//! Service configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! file (`gridsync.toml` or `gridsync.yaml`, or the path in
//! `GRIDSYNC_CONFIG`), then `GRIDSYNC__*` environment variables using `__`
//! as the section separator (for example `GRIDSYNC__HTTP__PORT=8080`).
//! `DATABASE_URL`, when set, wins over `database.url`.

use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use gridsync_db::PgSettings;
use serde::Deserialize;

use crate::sync::SyncOptions;

/// Default port of the request/response channel.
pub const DEFAULT_HTTP_PORT: u16 = 4038;
/// Default port of the streaming channel.
pub const DEFAULT_STREAM_PORT: u16 = 4039;
/// Default bind address for both channels.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or the merged result did not match
    /// [`ServiceConfig`].
    #[error("failed to load config: {source}")]
    Load {
        /// The underlying config error.
        #[from]
        source: config::ConfigError,
    },
}

/// Address one listener binds to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Host or IP address.
    pub host: String,
    /// TCP port; `0` picks an ephemeral port.
    pub port: u16,
}

impl ListenConfig {
    /// Listener on `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
        }
    }
}

/// Grid store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `PostgreSQL` URL. Absent means an in-memory store.
    pub url: Option<String>,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 5,
            idle_timeout_secs: 300,
        }
    }
}

impl DatabaseConfig {
    /// Store settings, or `None` when no URL is configured.
    pub fn pg_settings(&self) -> Option<PgSettings> {
        self.url.as_deref().map(|url| PgSettings {
            url: url.to_owned(),
            max_connections: self.max_connections,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        })
    }
}

/// Logging settings. `RUST_LOG` overrides `filter`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
            json: false,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Request/response channel listener.
    pub http: ListenConfig,
    /// Streaming channel listener.
    pub stream: ListenConfig,
    /// Grid store.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Sync service tunables.
    #[serde(default)]
    pub sync: SyncOptions,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http: ListenConfig::new(DEFAULT_HOST, DEFAULT_HTTP_PORT),
            stream: ListenConfig::new(DEFAULT_HOST, DEFAULT_STREAM_PORT),
            database: DatabaseConfig::default(),
            sync: SyncOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from the default file, the environment, and `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a present source is malformed or a
    /// value has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GRIDSYNC_CONFIG").unwrap_or_else(|_| String::from("gridsync"));

        let mut builder = defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("GRIDSYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse a TOML document over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the document is invalid.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Listener defaults, set key by key so a partial section still resolves.
fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("http.host", DEFAULT_HOST)?
        .set_default("http.port", i64::from(DEFAULT_HTTP_PORT))?
        .set_default("stream.host", DEFAULT_HOST)?
        .set_default("stream.port", i64::from(DEFAULT_STREAM_PORT))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ServiceConfig::parse("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.http.port, 4038);
        assert_eq!(config.stream.port, 4039);
        assert!(config.sync.republish_reads);
        assert!(config.database.pg_settings().is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ServiceConfig::parse(
            r#"
            [stream]
            port = 9000

            [sync]
            republish_reads = false

            [database]
            url = "postgresql://grid@localhost/grid"
            max_connections = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.stream, ListenConfig::new(DEFAULT_HOST, 9000));
        assert_eq!(config.http.port, DEFAULT_HTTP_PORT);
        assert!(!config.sync.republish_reads);
        assert_eq!(config.sync.subscriber_buffer, 256);

        let pg = config.database.pg_settings().unwrap();
        assert_eq!(pg.url, "postgresql://grid@localhost/grid");
        assert_eq!(pg.max_connections, 3);
        assert_eq!(pg.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(ServiceConfig::parse("[http]\nport = \"not a port\"").is_err());
    }
}
