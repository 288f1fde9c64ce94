//! Named database instance configuration.
//!
//! A configuration file holds either named tables, one per instance, or flat
//! keys which fold into the implicit `default` instance:
//!
//! ```toml
//! driver = "mysql"        # flat keys belong to "default"
//! dbname = "app"
//!
//! [reporting]
//! driver = "mssql"
//! host = "10.0.0.4"
//! dbname = "reports"
//! ```
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Result, SqlError};

pub const DEFAULT_INSTANCE: &str = "default";

/// Default lifetime of cached configurations.
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(2 * 3600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub driver: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub passwd: String,
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates. Use with caution.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate file (PEM format).
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    /// Keys this crate does not interpret, kept for custom drivers.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// SSL/TLS connection modes.
///
/// - `Disable`: No SSL (unencrypted, default)
/// - `Prefer`: Try SSL first, fall back to non-SSL
/// - `Require`: Require SSL but don't verify certificate
/// - `VerifyFull`: Require SSL and verify the certificate and hostname
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
    VerifyFull,
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

fn default_user() -> String {
    String::from("root")
}

impl InstanceConfig {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    pub fn display_string(&self) -> String {
        match self.port {
            Some(port) => format!("{}@{}:{}/{}", self.user, self.host, port, self.dbname),
            None => format!("{}@{}/{}", self.user, self.host, self.dbname),
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            host: default_host(),
            port: None,
            user: default_user(),
            passwd: String::new(),
            dbname: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Where named instance configurations come from.
pub trait ConfigSource {
    /// Load every configuration, keyed by instance name.
    fn load(&self) -> Result<BTreeMap<String, InstanceConfig>>;

    fn get(&self, name: &str) -> Result<InstanceConfig> {
        let mut configs = self.load()?;
        configs.remove(name).ok_or_else(|| {
            SqlError::configuration(format!(
                "Database configuration with name \"{}\" not found.",
                name
            ))
        })
    }
}

/// Parse a configuration document, folding flat keys into `default`.
pub fn parse_configs(content: &str) -> Result<BTreeMap<String, InstanceConfig>> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| SqlError::configuration(format!("Invalid database configuration: {}", e)))?;

    let mut named = toml::Table::new();
    let mut flat = toml::Table::new();
    for (key, value) in table {
        match value {
            toml::Value::Table(t) => {
                named.insert(key, toml::Value::Table(t));
            }
            other => {
                flat.insert(key, other);
            }
        }
    }
    if !flat.is_empty() {
        let entry = named
            .entry(DEFAULT_INSTANCE.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(default) = entry {
            for (key, value) in flat {
                default.entry(key).or_insert(value);
            }
        }
    }

    named
        .into_iter()
        .map(|(name, value)| {
            let config: InstanceConfig = value.try_into().map_err(|e| {
                SqlError::configuration(format!(
                    "Invalid configuration for instance \"{}\": {}",
                    name, e
                ))
            })?;
            Ok((name, config))
        })
        .collect()
}

/// Reads instance configurations from a TOML file.
pub struct TomlConfigSource {
    path: PathBuf,
}

impl TomlConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqladapter")
            .join("database.toml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TomlConfigSource {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl ConfigSource for TomlConfigSource {
    fn load(&self) -> Result<BTreeMap<String, InstanceConfig>> {
        debug!(path = %self.path.display(), "loading database configuration");
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SqlError::configuration(format!(
                "Unable to read database configuration {}: {}",
                self.path.display(),
                e
            ))
        })?;
        parse_configs(&content)
    }
}

/// A fixed set of configurations, mostly for hosts that build them in code.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    configs: BTreeMap<String, InstanceConfig>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, config: InstanceConfig) -> Self {
        self.configs.insert(name.into(), config);
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load(&self) -> Result<BTreeMap<String, InstanceConfig>> {
        Ok(self.configs.clone())
    }
}

/// Caches another source's configurations for a bounded time.
pub struct CachedConfigSource<S> {
    inner: S,
    ttl: Duration,
    cached: RefCell<Option<(Instant, BTreeMap<String, InstanceConfig>)>>,
}

impl<S: ConfigSource> CachedConfigSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_CONFIG_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RefCell::new(None),
        }
    }

    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }
}

impl<S: ConfigSource> ConfigSource for CachedConfigSource<S> {
    fn load(&self) -> Result<BTreeMap<String, InstanceConfig>> {
        if let Some((loaded_at, configs)) = self.cached.borrow().as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(configs.clone());
            }
        }
        let configs = self.inner.load()?;
        *self.cached.borrow_mut() = Some((Instant::now(), configs.clone()));
        Ok(configs)
    }
}
