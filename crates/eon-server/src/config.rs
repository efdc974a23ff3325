use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use tracing::info;

use eon_types::DEFAULT_MAX_SELECTIONS;

/// Which backend the devices talk to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// In-process project; tokens signed with `jwt_secret`.
    Memory { jwt_secret: String },
    /// Hosted project over HTTP.
    Rest { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub device_db_path: PathBuf,
    pub backend: BackendConfig,
    pub max_selections: usize,
    /// Device sessions untouched this long are closed.
    pub device_idle: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let backend = match try_load::<String>("EON_BACKEND", "memory")?.as_str() {
            "memory" => BackendConfig::Memory {
                jwt_secret: try_load("EON_JWT_SECRET", "dev-secret-change-me")?,
            },
            "rest" => BackendConfig::Rest {
                url: required("EON_BACKEND_URL")?,
                anon_key: required("EON_BACKEND_ANON_KEY")?,
            },
            other => bail!("EON_BACKEND must be \"memory\" or \"rest\", got {other:?}"),
        };

        let max_selections: usize =
            try_load("EON_MAX_SELECTIONS", &DEFAULT_MAX_SELECTIONS.to_string())?;
        if max_selections == 0 {
            bail!("EON_MAX_SELECTIONS must be at least 1");
        }

        Ok(Self {
            host: try_load("EON_HOST", "0.0.0.0")?,
            port: try_load("EON_PORT", "3000")?,
            device_db_path: try_load::<String>("EON_DEVICE_DB_PATH", "eon-devices.db")?.into(),
            backend,
            max_selections,
            device_idle: Duration::from_secs(try_load("EON_DEVICE_IDLE_SECS", "1800")?),
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value: {e}"))
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} is required for the rest backend"))
}
