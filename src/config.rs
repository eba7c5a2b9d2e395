use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::doe::service::DEFAULT_PARALLEL_BATCH_THRESHOLD;
use crate::doe::DoeThresholds;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub doe: DoeConfig,
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    pub enable_cors: bool,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            body_limit_bytes: 1024 * 1024,
            enable_cors: false,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,hyper=warn,tower_http=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DoeConfig {
    pub critical_margin: f64,
    pub ample_margin: f64,
    pub max_export_kw: f64,
    pub max_import_kw: f64,
    pub max_batch_size: usize,
    pub parallel_batch_threshold: usize,
}

impl Default for DoeConfig {
    fn default() -> Self {
        let thresholds = DoeThresholds::default();
        Self {
            critical_margin: thresholds.critical_margin,
            ample_margin: thresholds.ample_margin,
            max_export_kw: thresholds.max_export_kw,
            max_import_kw: thresholds.max_import_kw,
            max_batch_size: 1000,
            parallel_batch_threshold: DEFAULT_PARALLEL_BATCH_THRESHOLD,
        }
    }
}

impl DoeConfig {
    pub fn thresholds(&self) -> DoeThresholds {
        DoeThresholds {
            critical_margin: self.critical_margin,
            ample_margin: self.ample_margin,
            max_export_kw: self.max_export_kw,
            max_import_kw: self.max_import_kw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySource {
    /// Hard-coded proof-of-concept connection points
    #[default]
    Builtin,
    /// TOML table on disk
    File { path: PathBuf },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub source: TopologySource,
}

impl Config {
    /// `config/default.toml` overlaid with `DOE__SECTION__KEY` variables.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DOE__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.doe.thresholds().validate().map_err(anyhow::Error::msg)?;
        if self.doe.max_batch_size == 0 {
            anyhow::bail!("doe.max_batch_size must be at least 1");
        }
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
