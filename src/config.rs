use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub descriptor_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub deployment: DeploymentConfig,
    pub logging: LoggingConfig,
    pub shutdown_check_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server: ServerConfig {
                host: string("SERVER_HOST", "127.0.0.1"),
                port: parse(&lookup, "SERVER_PORT", 9080)?,
            },
            deployment: DeploymentConfig {
                descriptor_path: PathBuf::from(string("DEPLOYMENT_FILE", "./deployment.yaml")),
            },
            logging: LoggingConfig {
                level: string("LOG_LEVEL", "info"),
                directory: PathBuf::from(string("LOG_DIR", "./logs")),
            },
            shutdown_check_interval: Duration::from_millis(parse(
                &lookup,
                "SHUTDOWN_CHECK_INTERVAL_MS",
                100u64,
            )?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            bail!("SERVER_HOST must not be empty");
        }
        if self.server.port == 0 {
            bail!("SERVER_PORT must not be 0");
        }
        if self.deployment.descriptor_path.as_os_str().is_empty() {
            bail!("DEPLOYMENT_FILE must not be empty");
        }
        if self.shutdown_check_interval.is_zero() {
            bail!("SHUTDOWN_CHECK_INTERVAL_MS must be greater than 0");
        }
        Ok(())
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
