//! Environment-driven settings. A `.env` file is read first when present.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = var_or("APP_PORT", "3000");
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port))?;

        Ok(Self {
            environment: AppEnvironment::parse(&var_or("APP_ENV", "development")),
            server: ServerConfig {
                host: var_or("APP_HOST", "127.0.0.1"),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: var_or("APP_LOG_LEVEL", "info"),
            },
            engine: EngineConfig::from_env()?,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost {
                    host: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `tracing` filter directive, e.g. `info` or `warn,scorecard=debug`.
    pub log_level: String,
}

/// Calculation engine knobs plus the optional on-disk sources for the service.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Minimum confidence for a formula token to bind to a data point.
    pub match_threshold: f64,
    /// Master file CSV; the bundled sample definition is used when unset.
    pub hierarchy_path: Option<PathBuf>,
    /// Directory for JSON assessment documents; assessments stay in memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

    fn from_env() -> Result<Self, ConfigError> {
        let match_threshold = match env::var("SCORECARD_MATCH_THRESHOLD") {
            Ok(raw) => parse_match_threshold(&raw)?,
            Err(_) => Self::DEFAULT_MATCH_THRESHOLD,
        };
        Ok(Self {
            match_threshold,
            hierarchy_path: optional_path("SCORECARD_HIERARCHY_PATH"),
            data_dir: optional_path("SCORECARD_DATA_DIR"),
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: Self::DEFAULT_MATCH_THRESHOLD,
            hierarchy_path: None,
            data_dir: None,
        }
    }
}

fn parse_match_threshold(raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| (0.0..=1.0).contains(value))
        .ok_or_else(|| ConfigError::InvalidMatchThreshold(raw.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort(String),
    InvalidHost {
        host: String,
        source: std::net::AddrParseError,
    },
    InvalidMatchThreshold(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort(raw) => {
                write!(f, "APP_PORT must be a port number (got '{raw}')")
            }
            ConfigError::InvalidHost { host, .. } => {
                write!(f, "APP_HOST '{host}' is not an IP address or localhost")
            }
            ConfigError::InvalidMatchThreshold(raw) => write!(
                f,
                "SCORECARD_MATCH_THRESHOLD must be a number between 0 and 1 (got '{raw}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source, .. } => Some(source),
            ConfigError::InvalidPort(_) | ConfigError::InvalidMatchThreshold(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const VARS: [&str; 7] = [
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "SCORECARD_MATCH_THRESHOLD",
        "SCORECARD_HIERARCHY_PATH",
        "SCORECARD_DATA_DIR",
    ];

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let guard = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env mutex poisoned");
        for name in VARS {
            env::remove_var(name);
        }
        guard
    }

    #[test]
    fn defaults_apply_without_environment() {
        let _lock = env_lock();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn localhost_binds_loopback() {
        let _lock = env_lock();
        env::set_var("APP_HOST", "localhost");
        env::set_var("APP_PORT", "8088");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8088));
    }

    #[test]
    fn engine_settings_come_from_scorecard_vars() {
        let _lock = env_lock();
        env::set_var("APP_ENV", "prod");
        env::set_var("SCORECARD_MATCH_THRESHOLD", "0.35");
        env::set_var("SCORECARD_HIERARCHY_PATH", "data/master.csv");
        env::set_var("SCORECARD_DATA_DIR", "  ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.engine.match_threshold, 0.35);
        assert_eq!(
            config.engine.hierarchy_path,
            Some(PathBuf::from("data/master.csv"))
        );
        assert!(config.engine.data_dir.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let _lock = env_lock();
        env::set_var("SCORECARD_MATCH_THRESHOLD", "1.5");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidMatchThreshold(_))
        ));

        env::remove_var("SCORECARD_MATCH_THRESHOLD");
        env::set_var("APP_PORT", "http");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPort(_))));

        env::remove_var("APP_PORT");
        let server = ServerConfig {
            host: "scorecard.internal".to_string(),
            port: 3000,
        };
        assert!(matches!(
            server.socket_addr(),
            Err(ConfigError::InvalidHost { .. })
        ));
    }
}
