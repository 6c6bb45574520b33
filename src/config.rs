//! Configuration management for the artifact gateway

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

/// Configuration errors raised while reading the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticConfig,
    pub backend: BackendConfig,
    pub jobs: JobConfig,
    /// Applied to every single outbound call (relay and each status query)
    pub communication_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StaticConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub skip_cert_verify: bool,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Consecutive failed status queries tolerated before giving up
    pub max_query_retries: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
            max_query_retries: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            static_files: StaticConfig {
                root: PathBuf::from("./static"),
            },
            backend: BackendConfig {
                base_url: Url::parse("http://localhost:9022").expect("static URL parses"),
                username: "gateway".to_string(),
                password: "gateway".to_string(),
                skip_cert_verify: false,
            },
            jobs: JobConfig::default(),
            communication_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let base_url = required("BACKEND_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
            name: "BACKEND_URL",
            reason: e.to_string(),
        })?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parsed("SERVER_PORT", defaults.server.port)?,
            },
            static_files: StaticConfig {
                root: PathBuf::from(required("STATIC_DIRECTORY")?),
            },
            backend: BackendConfig {
                base_url,
                username: required("BACKEND_USERNAME")?,
                password: required("BACKEND_PASSWORD")?,
                skip_cert_verify: parsed("BACKEND_SKIP_CERT_VERIFY", false)?,
            },
            jobs: JobConfig {
                poll_interval: Duration::from_millis(parsed(
                    "JOB_POLL_INTERVAL_MS",
                    defaults.jobs.poll_interval.as_millis() as u64,
                )?),
                timeout: Duration::from_secs(parsed(
                    "JOB_TIMEOUT_SECS",
                    defaults.jobs.timeout.as_secs(),
                )?),
                max_query_retries: parsed("JOB_QUERY_RETRIES", defaults.jobs.max_query_retries)?,
            },
            communication_timeout: Duration::from_secs(parsed(
                "COMMUNICATION_TIMEOUT_SECS",
                defaults.communication_timeout.as_secs(),
            )?),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
