//! Driver keys and named instances.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use super::{MsSqlAdapter, MySqlAdapter, PgSqlAdapter, Session, SqlAdapter};
use crate::config::{ConfigSource, InstanceConfig, DEFAULT_INSTANCE};
use crate::driver::{self, Connector};
use crate::error::{Result, SqlError};

type AdapterFactory = Rc<dyn Fn(Session) -> Rc<dyn SqlAdapter>>;
type ConnectorFactory = Rc<dyn Fn() -> Connector>;

#[derive(Clone)]
struct DriverEntry {
    adapter: AdapterFactory,
    connector: ConnectorFactory,
}

/// Maps a configuration's `driver` key to the dialect that serves it.
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, DriverEntry>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(
            "mysql",
            |s| Rc::new(MySqlAdapter::new(s)),
            || Box::new(driver::connect_mysql),
        );
        for key in ["mssql", "dblib"] {
            registry.register(
                key,
                |s| Rc::new(MsSqlAdapter::new(s)),
                || Box::new(driver::connect_mssql),
            );
        }
        for key in ["pgsql", "postgres"] {
            registry.register(
                key,
                |s| Rc::new(PgSqlAdapter::new(s)),
                || Box::new(driver::connect_postgres),
            );
        }
        registry
    }
}

impl DriverRegistry {
    /// A registry with no drivers at all.
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    pub fn register<A, C>(&mut self, key: impl Into<String>, adapter: A, connector: C)
    where
        A: Fn(Session) -> Rc<dyn SqlAdapter> + 'static,
        C: Fn() -> Connector + 'static,
    {
        self.drivers.insert(
            key.into(),
            DriverEntry {
                adapter: Rc::new(adapter),
                connector: Rc::new(connector),
            },
        );
    }

    /// Route every driver through connectors made by `make`, keeping the
    /// dialects. Used to run the real SQL renderers against a script.
    pub fn with_connector<C>(mut self, make: C) -> Self
    where
        C: Fn() -> Connector + 'static,
    {
        let make: ConnectorFactory = Rc::new(make);
        for entry in self.drivers.values_mut() {
            entry.connector = make.clone();
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.drivers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    fn build(&self, name: &str, config: InstanceConfig) -> Result<Rc<dyn SqlAdapter>> {
        let key = config.driver.trim();
        if key.is_empty() {
            return Err(SqlError::configuration(format!(
                "Database configuration with name \"{}\" has no driver property.",
                name
            )));
        }
        let Some(entry) = self.drivers.get(key) else {
            return Err(SqlError::configuration(format!(
                "Database configuration with name \"{}\" requires an unknown driver \"{}\".",
                name, key
            )));
        };
        debug!(instance = name, driver = key, "creating adapter");
        let session = Session::new(name, config, (entry.connector)());
        Ok((entry.adapter)(session))
    }
}

/// Named adapter instances, created on first request and kept for the
/// lifetime of the context.
pub struct Instances {
    source: Box<dyn ConfigSource>,
    registry: DriverRegistry,
    adapters: RefCell<HashMap<String, Rc<dyn SqlAdapter>>>,
}

impl Instances {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self::with_registry(source, DriverRegistry::default())
    }

    pub fn with_registry(source: impl ConfigSource + 'static, registry: DriverRegistry) -> Self {
        Self {
            source: Box::new(source),
            registry,
            adapters: RefCell::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// The adapter for `name`, or for `default` when no name is given.
    ///
    /// Configuration problems surface here; the connection itself is opened
    /// on the first query.
    pub fn get(&self, name: Option<&str>) -> Result<Rc<dyn SqlAdapter>> {
        let name = name.unwrap_or(DEFAULT_INSTANCE);
        if let Some(adapter) = self.adapters.borrow().get(name) {
            return Ok(adapter.clone());
        }
        let adapter = self.make(name)?;
        self.adapters
            .borrow_mut()
            .insert(name.to_string(), adapter.clone());
        Ok(adapter)
    }

    /// A fresh adapter for `name` that is not cached.
    pub fn make(&self, name: &str) -> Result<Rc<dyn SqlAdapter>> {
        let config = self.source.get(name)?;
        self.registry.build(name, config)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.adapters.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigSource;
    use crate::driver::Script;

    fn instances(script: &Script, source: MemoryConfigSource) -> Instances {
        let script = script.clone();
        let registry = DriverRegistry::default().with_connector(move || script.connector());
        Instances::with_registry(source, registry)
    }

    #[test]
    fn test_builtin_keys() {
        let registry = DriverRegistry::default();
        assert_eq!(registry.keys(), vec!["dblib", "mssql", "mysql", "pgsql", "postgres"]);
        assert!(!DriverRegistry::new().contains("mysql"));
    }

    #[test]
    fn test_driver_selects_dialect() {
        let source = MemoryConfigSource::new()
            .with("default", InstanceConfig::new("mysql"))
            .with("reports", InstanceConfig::new("dblib"))
            .with("pg", InstanceConfig::new("postgres"));
        let instances = instances(&Script::new(), source);
        assert_eq!(instances.get(None).unwrap().driver(), "mysql");
        assert_eq!(instances.get(Some("reports")).unwrap().driver(), "mssql");
        assert_eq!(instances.get(Some("pg")).unwrap().driver(), "pgsql");
    }

    #[test]
    fn test_instances_are_cached() {
        let source = MemoryConfigSource::new().with("default", InstanceConfig::new("mysql"));
        let instances = instances(&Script::new(), source);
        let a = instances.get(None).unwrap();
        let b = instances.get(Some("default")).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        let fresh = instances.make("default").unwrap();
        assert!(!Rc::ptr_eq(&a, &fresh));
    }

    #[test]
    fn test_configuration_errors_never_connect() {
        let script = Script::new();
        let source = MemoryConfigSource::new()
            .with("nodriver", InstanceConfig::new(""))
            .with("odd", InstanceConfig::new("oracle"));
        let instances = instances(&script, source);

        let missing = instances.get(Some("nowhere")).err().unwrap();
        assert!(missing.is_configuration());
        assert!(missing.to_string().contains("\"nowhere\" not found"));

        let nodriver = instances.get(Some("nodriver")).err().unwrap();
        assert!(nodriver.to_string().contains("has no driver property"));

        let unknown = instances.get(Some("odd")).err().unwrap();
        assert!(unknown.to_string().contains("unknown driver \"oracle\""));

        assert_eq!(script.connects(), 0);
        assert!(!instances.is_loaded("odd"));
    }

    #[test]
    fn test_connection_opens_on_first_query() {
        let script = Script::new();
        let source = MemoryConfigSource::new().with("default", InstanceConfig::new("pgsql"));
        let instances = instances(&script, source);
        let adapter = instances.get(None).unwrap();
        assert_eq!(script.connects(), 0);
        adapter.query("SELECT 1", crate::adapter::Fetch::All).unwrap();
        adapter.query("SELECT 2", crate::adapter::Fetch::All).unwrap();
        assert_eq!(script.connects(), 1);
    }

    #[test]
    fn test_register_custom_driver() {
        let mut registry = DriverRegistry::new();
        let script = Script::new();
        let connector_script = script.clone();
        registry.register(
            "maria",
            |s| Rc::new(MySqlAdapter::new(s)),
            move || connector_script.connector(),
        );
        let source = MemoryConfigSource::new().with("default", InstanceConfig::new("maria"));
        let instances = Instances::with_registry(source, registry);
        assert_eq!(instances.get(None).unwrap().driver(), "mysql");
    }
}
