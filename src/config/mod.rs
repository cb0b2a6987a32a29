//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::infra::error::InfraError;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_USER: &str = "tasknest";
const DEFAULT_DB_NAME: &str = "tasknest";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: i64 = 120;

/// Command-line arguments for the Tasknest binary.
#[derive(Debug, Default, Parser)]
#[command(name = "tasknest", version, about = "Tasknest task-management HTTP service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TASKNEST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis connection URL; presence selects the Redis cache
    /// backend.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Testing,
    Production,
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown mode `{other}`, expected development|testing|production"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub mode: RuntimeMode,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: i64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    server: RawServer,
    database: RawDatabase,
    redis: RawRedis,
    cache: RawCache,
    rate_limit: RawRateLimit,
    logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    mode: Option<String>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDatabase {
    url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    name: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRedis {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCache {
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRateLimit {
    window_seconds: Option<u64>,
    max_requests: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLogging {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    /// Build the settings once at startup. Defaults and validation live
    /// here; nothing downstream re-checks configuration.
    pub fn load(cli: &CliArgs) -> Result<Self, InfraError> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));
        if let Some(path) = &cli.config_file {
            builder = builder.add_source(File::from(path.clone()));
        }
        builder = builder.add_source(Environment::with_prefix("TASKNEST").separator("__"));

        let raw: RawSettings = builder
            .build()
            .map_err(|err| InfraError::configuration(err.to_string()))?
            .try_deserialize()
            .map_err(|err| InfraError::configuration(err.to_string()))?;

        Self::from_raw(raw, cli)
    }

    fn from_raw(raw: RawSettings, cli: &CliArgs) -> Result<Self, InfraError> {
        let mode = match raw.server.mode.as_deref() {
            Some(raw_mode) => raw_mode
                .parse::<RuntimeMode>()
                .map_err(InfraError::configuration)?,
            None => RuntimeMode::Development,
        };

        let server = ServerSettings {
            host: cli
                .server_host
                .clone()
                .or(raw.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.server_port.or(raw.server.port).unwrap_or(DEFAULT_PORT),
            mode,
            graceful_shutdown: Duration::from_secs(
                raw.server
                    .graceful_shutdown_seconds
                    .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
            ),
        };

        let database_url = match cli.database_url.clone().or(raw.database.url.clone()) {
            Some(url) => url,
            None => compose_database_url(&raw.database, mode)?,
        };
        let database = DatabaseSettings {
            url: database_url,
            max_connections: raw
                .database
                .max_connections
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        };

        let redis = RedisSettings {
            url: cli.redis_url.clone().or(raw.redis.url),
        };

        let cache = CacheSettings {
            ttl: Duration::from_secs(raw.cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
        };

        let max_requests = raw
            .rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
        if max_requests <= 0 {
            return Err(InfraError::configuration(
                "rate_limit.max_requests must be positive",
            ));
        }
        let rate_limit = RateLimitSettings {
            window: Duration::from_secs(
                raw.rate_limit
                    .window_seconds
                    .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            ),
            max_requests,
        };

        let level_raw = cli
            .log_level
            .clone()
            .or(raw.logging.level)
            .unwrap_or_else(|| "info".to_string());
        let level = LevelFilter::from_str(&level_raw)
            .map_err(|_| InfraError::configuration(format!("unknown log level `{level_raw}`")))?;
        let logging = LoggingSettings {
            level,
            format: if raw.logging.json.unwrap_or(false) {
                LogFormat::Json
            } else {
                LogFormat::Compact
            },
        };

        Ok(Self {
            server,
            database,
            redis,
            cache,
            rate_limit,
            logging,
        })
    }
}

fn compose_database_url(raw: &RawDatabase, mode: RuntimeMode) -> Result<String, InfraError> {
    let password = raw.password.clone().unwrap_or_default();
    if password.is_empty() && mode == RuntimeMode::Production {
        return Err(InfraError::configuration(
            "database.password is required in production",
        ));
    }

    let host = raw.host.as_deref().unwrap_or(DEFAULT_DB_HOST);
    let port = raw.port.unwrap_or(DEFAULT_DB_PORT);
    let user = raw.user.as_deref().unwrap_or(DEFAULT_DB_USER);
    let name = raw.name.as_deref().unwrap_or(DEFAULT_DB_NAME);

    if password.is_empty() {
        Ok(format!("postgres://{user}@{host}:{port}/{name}"))
    } else {
        Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_section() {
        let settings =
            Settings::from_raw(RawSettings::default(), &CliArgs::default()).expect("settings");
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.server.mode, RuntimeMode::Development);
        assert_eq!(settings.cache.ttl, Duration::from_secs(300));
        assert_eq!(settings.rate_limit.max_requests, 120);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(settings.redis.url.is_none());
        assert_eq!(
            settings.database.url,
            "postgres://tasknest@127.0.0.1:5432/tasknest"
        );
    }

    #[test]
    fn cli_overrides_win_over_file_values() {
        let raw = RawSettings {
            server: RawServer {
                port: Some(9000),
                ..RawServer::default()
            },
            ..RawSettings::default()
        };
        let cli = CliArgs {
            server_port: Some(9001),
            ..CliArgs::default()
        };
        let settings = Settings::from_raw(raw, &cli).expect("settings");
        assert_eq!(settings.server.port, 9001);
    }

    #[test]
    fn production_requires_a_database_password() {
        let raw = RawSettings {
            server: RawServer {
                mode: Some("production".to_string()),
                ..RawServer::default()
            },
            ..RawSettings::default()
        };
        let err =
            Settings::from_raw(raw, &CliArgs::default()).expect_err("missing password rejected");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[test]
    fn full_database_url_skips_composition() {
        let raw = RawSettings {
            server: RawServer {
                mode: Some("production".to_string()),
                ..RawServer::default()
            },
            database: RawDatabase {
                url: Some("postgres://u:p@db:5432/tasks".to_string()),
                ..RawDatabase::default()
            },
            ..RawSettings::default()
        };
        let settings = Settings::from_raw(raw, &CliArgs::default()).expect("settings");
        assert_eq!(settings.database.url, "postgres://u:p@db:5432/tasks");
    }

    #[test]
    fn unknown_mode_and_level_are_rejected() {
        let raw = RawSettings {
            server: RawServer {
                mode: Some("staging".to_string()),
                ..RawServer::default()
            },
            ..RawSettings::default()
        };
        assert!(Settings::from_raw(raw, &CliArgs::default()).is_err());

        let raw = RawSettings {
            logging: RawLogging {
                level: Some("loud".to_string()),
                json: None,
            },
            ..RawSettings::default()
        };
        assert!(Settings::from_raw(raw, &CliArgs::default()).is_err());
    }

    #[test]
    fn nonpositive_rate_limit_is_rejected() {
        let raw = RawSettings {
            rate_limit: RawRateLimit {
                window_seconds: Some(60),
                max_requests: Some(0),
            },
            ..RawSettings::default()
        };
        assert!(Settings::from_raw(raw, &CliArgs::default()).is_err());
    }
}
