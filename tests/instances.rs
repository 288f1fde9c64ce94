//! Instances built from a configuration file, run against scripted connections.
use std::io::Write;
use std::rc::Rc;

use sqladapter::config::{CachedConfigSource, TomlConfigSource};
use sqladapter::driver::Script;
use sqladapter::hydrate::deserialize_row;
use sqladapter::{
    DriverRegistry, Entity, ErrorCategory, Fetch, InsertRequest, Instances, Repository, Result,
    Row, Value,
};

const CONFIG: &str = r#"
driver = "mysql"
dbname = "app"

[reports]
driver = "mssql"
host = "10.0.0.4"
dbname = "reports"

[broken]
host = "nowhere"

[legacy]
driver = "sybase"
"#;

fn instances(script: &Script) -> (Instances, tempfile::NamedTempFile) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    let source = CachedConfigSource::new(TomlConfigSource::new(file.path()));
    let script = script.clone();
    let registry = DriverRegistry::default().with_connector(move || script.connector());
    (Instances::with_registry(source, registry), file)
}

#[derive(Debug, serde::Deserialize)]
struct Report {
    id: i64,
    title: String,
}

impl Entity for Report {
    fn from_row(row: Row) -> Result<Self> {
        deserialize_row(row)
    }
}

#[test]
fn test_default_and_named_instances() {
    let script = Script::new();
    let (instances, _file) = instances(&script);
    let default = instances.get(None).unwrap();
    assert_eq!(default.driver(), "mysql");
    assert_eq!(default.config().dbname, "app");
    assert_eq!(default.config().host, "127.0.0.1");
    let reports = instances.get(Some("reports")).unwrap();
    assert_eq!(reports.driver(), "mssql");
    assert_eq!(reports.name(), "reports");
    assert_eq!(script.connects(), 0);
}

#[test]
fn test_configuration_errors() {
    let script = Script::new();
    let (instances, _file) = instances(&script);
    for name in ["broken", "legacy", "missing"] {
        let err = instances.get(Some(name)).err().unwrap();
        assert!(err.is_configuration(), "{}: {}", name, err);
    }
    assert_eq!(script.connects(), 0);
}

#[test]
fn test_hydrated_objects_from_named_instance() {
    let script = Script::new().on_query(
        "reports",
        vec![
            Row::from_pairs([("id", Value::Int(1)), ("title", Value::from("q1"))]),
            Row::from_pairs([("id", Value::Int(2)), ("title", Value::from("q2"))]),
            Row::from_pairs([("id", Value::Int(3)), ("title", Value::from("draft"))]),
        ],
    );
    let (instances, _file) = instances(&script);
    let adapter = instances.get(Some("reports")).unwrap();
    let repo = Rc::new(Repository::<Report>::new("reports"));

    let published = repo
        .select(adapter.clone())
        .filter(|r| r.object().map(|o| o.title != "draft").unwrap_or(false))
        .objects()
        .unwrap();
    assert_eq!(published.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(repo.cache().len(), 3);

    let again = repo.select(adapter).object().unwrap().unwrap();
    assert!(Rc::ptr_eq(&again, &published[0]));
    assert_eq!(script.connects(), 1);
}

#[test]
fn test_transaction_around_insert() {
    // both statements contain "INSERT"; the first matching rule answers
    let script = Script::new()
        .on_query("LAST_INSERT_ID", vec![Row::from_pairs([("id", 41)])])
        .on_execute("INSERT INTO", 1);
    let (instances, _file) = instances(&script);
    let adapter = instances.get(None).unwrap();

    adapter.start_transaction().unwrap();
    let insert = InsertRequest::new(adapter.clone(), "users").values([("name", "ann")]);
    assert_eq!(insert.execute().unwrap(), 1);
    assert_eq!(insert.last_id().unwrap(), Some(Value::Int(41)));
    adapter.commit().unwrap();

    assert_eq!(
        script.executed(),
        vec![
            "START TRANSACTION",
            "INSERT INTO `users` SET `name`='ann'",
            "SELECT LAST_INSERT_ID()",
            "COMMIT",
        ]
    );
}

#[test]
fn test_driver_failure_is_classified() {
    let script = Script::new().fail_on_with_state("missing", "42S02", "Table 'app.missing' doesn't exist");
    let (instances, _file) = instances(&script);
    let adapter = instances.get(None).unwrap();
    let err = adapter
        .query("SELECT * FROM missing", Fetch::All)
        .err()
        .unwrap();
    assert!(err.is_driver());
    assert_eq!(err.category(), Some(ErrorCategory::Semantic));
    assert_eq!(err.action(), Some("SELECT * FROM missing"));
    assert!(std::error::Error::source(&err).is_some());
}
