use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

const DEFAULT_DATABASE_URL: &str = "data/expense_tracker.db";
const DEFAULT_STORAGE_DIR: &str = "storage";
const DEFAULT_PORT: &str = "8080";
const DEFAULT_MAX_POOL_SIZE: u32 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. `https://api.honeycomb.io`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub service_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Path of the SQLite file. A `sqlite:` scheme prefix is accepted.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    pub telemetry: Option<TelemetryConfig>,
    /// Frontend build to serve for every non-API route.
    pub static_dir: Option<PathBuf>,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DIR)
}

fn default_bind_address() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

fn default_max_pool_size() -> u32 {
    DEFAULT_MAX_POOL_SIZE
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: default_database_url(),
            storage_dir: default_storage_dir(),
            bind_address: default_bind_address(),
            max_pool_size: default_max_pool_size(),
            max_upload_bytes: default_max_upload_bytes(),
            telemetry: None,
            static_dir: None,
        }
    }
}

impl Config {
    pub fn from_file(path: PathBuf) -> Result<Config, anyhow::Error> {
        let config = fs::read_to_string(&path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        Config::from_toml(&config)
    }

    pub fn from_toml(config: &str) -> Result<Config, anyhow::Error> {
        let config: Config = toml::from_str(config).context("Unable to parse config")?;
        Ok(config)
    }

    /// Builds the config from `DATABASE_URL` (or `DB_PATH`), `STORAGE_DIR`,
    /// `PORT`, `MAX_UPLOAD_BYTES`, `MAX_POOL_SIZE`, `STATIC_DIR` and
    /// `OTLP_ENDPOINT`/`OTLP_API_KEY`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Config, anyhow::Error> {
        Config::from_vars(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Config, anyhow::Error> {
        let mut config = Config::default();
        if let Some(database_url) = var("DATABASE_URL").or_else(|| var("DB_PATH")) {
            config.database_url = database_url;
        }
        if let Some(storage_dir) = var("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(storage_dir);
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port.parse().context("Unable to parse PORT value")?;
            config.bind_address = format!("0.0.0.0:{}", port);
        }
        if let Some(max_upload_bytes) = var("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = max_upload_bytes
                .parse()
                .context("Unable to parse MAX_UPLOAD_BYTES value")?;
        }
        if let Some(max_pool_size) = var("MAX_POOL_SIZE") {
            config.max_pool_size = max_pool_size
                .parse()
                .context("Unable to parse MAX_POOL_SIZE value")?;
        }
        config.static_dir = var("STATIC_DIR").map(PathBuf::from);
        config.telemetry = var("OTLP_ENDPOINT").map(|endpoint| TelemetryConfig {
            endpoint,
            api_key: var("OTLP_API_KEY"),
            service_name: None,
        });
        Ok(config)
    }

    pub fn database_path(&self) -> &Path {
        let path = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))
            .unwrap_or(&self.database_url);
        Path::new(path)
    }
}
