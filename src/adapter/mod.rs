//! Dialect adapters.
//!
//! A request is described once as `QueryOptions`; each dialect renders it to
//! its own SQL text and runs it through the instance `Session`:
//!
//! ```text
//! QueryOptions (request layer)
//!       ↓ merged over dialect defaults
//! SqlAdapter::render_*     (mysql.rs / mssql.rs / pgsql.rs)
//!       ↓
//! Session::execute_raw     (single native boundary)
//!       ↓
//! Output                   (text, rows, statement or count)
//! ```
mod mssql;
mod mysql;
mod pgsql;
pub mod registry;

use std::cell::{Cell, RefCell};

use tracing::{debug, info, warn};

use crate::config::InstanceConfig;
use crate::driver::{Connector, NativeConnection, Statement};
use crate::error::{Result, SqlError};
use crate::value::{Row, Value};

pub use mssql::MsSqlAdapter;
pub use mysql::MySqlAdapter;
pub use pgsql::PgSqlAdapter;
pub use registry::{DriverRegistry, Instances};

pub const DEFAULT_ID_FIELD: &str = "id";

/// Shape of a select result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One hydrated object; the adapter treats it as `ArrayFirst`.
    Object,
    /// First raw row only.
    ArrayFirst,
    /// Every raw row.
    ArrayAssoc,
    /// Every row as an untyped JSON object.
    ArrayObjects,
    /// The open statement, drained by the caller.
    Statement,
    /// The generated SQL text; nothing is executed.
    SqlQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Update,
    Insert,
    Delete,
}

/// The `what` part of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    /// Used verbatim.
    Raw(String),
    /// Field expressions joined with `, `.
    List(Vec<String>),
    /// Column assignments, for update and single-row insert.
    Assign(Vec<(String, Value)>),
    /// Same-shaped rows for a bulk insert.
    Rows(Vec<Vec<(String, Value)>>),
}

impl Fields {
    fn is_empty(&self) -> bool {
        match self {
            Fields::Raw(s) => s.trim().is_empty(),
            Fields::List(items) => items.is_empty(),
            Fields::Assign(pairs) => pairs.is_empty(),
            Fields::Rows(rows) => rows.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub table: String,
    pub alias: String,
    pub condition: String,
    /// `INNER JOIN` when set, `LEFT JOIN` otherwise.
    pub mandatory: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    Raw(String),
    Spec(JoinSpec),
}

/// Everything one query needs. Unset fields take the dialect defaults.
///
/// Conditions arrive already formatted by the condition grammar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub table: Option<String>,
    pub what: Option<Fields>,
    pub conditions: Vec<String>,
    pub joins: Vec<Join>,
    pub order_by: Option<String>,
    pub group_by: Option<String>,
    pub having: Vec<String>,
    /// Zero or negative means unlimited.
    pub number: Option<i64>,
    /// Ignored unless `number` is positive.
    pub offset: Option<i64>,
    pub distinct: Option<bool>,
    pub alias: Option<String>,
    pub output: Option<OutputMode>,
    pub id_field: Option<String>,
    pub low_priority: Option<bool>,
    pub ignore: Option<bool>,
    pub quick: Option<bool>,
    pub delayed: Option<bool>,
    pub into: Option<bool>,
    pub only: Option<bool>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Default::default()
        }
    }

    /// Defaults shared by every dialect.
    pub fn defaults(kind: QueryKind) -> Self {
        let mut defaults = Self {
            number: Some(-1),
            offset: Some(0),
            ..Default::default()
        };
        match kind {
            QueryKind::Select => {
                defaults.output = Some(OutputMode::ArrayAssoc);
                defaults.distinct = Some(false);
            }
            QueryKind::Update => {
                defaults.low_priority = Some(false);
                defaults.ignore = Some(false);
                defaults.only = Some(false);
            }
            QueryKind::Delete => {
                defaults.low_priority = Some(false);
                defaults.quick = Some(false);
                defaults.ignore = Some(false);
                defaults.only = Some(false);
            }
            QueryKind::Insert => {
                defaults.low_priority = Some(false);
                defaults.delayed = Some(false);
                defaults.ignore = Some(false);
                defaults.into = Some(true);
            }
        }
        defaults
    }

    /// Supplied values win; unset values fall back to `defaults`.
    pub fn merged_over(self, defaults: &QueryOptions) -> QueryOptions {
        fn pick<T: Clone>(mine: Option<T>, theirs: &Option<T>) -> Option<T> {
            mine.or_else(|| theirs.clone())
        }
        fn pick_list<T: Clone>(mine: Vec<T>, theirs: &[T]) -> Vec<T> {
            if mine.is_empty() {
                theirs.to_vec()
            } else {
                mine
            }
        }
        QueryOptions {
            table: pick(self.table, &defaults.table),
            what: pick(self.what, &defaults.what),
            conditions: pick_list(self.conditions, &defaults.conditions),
            joins: pick_list(self.joins, &defaults.joins),
            order_by: pick(self.order_by, &defaults.order_by),
            group_by: pick(self.group_by, &defaults.group_by),
            having: pick_list(self.having, &defaults.having),
            number: pick(self.number, &defaults.number),
            offset: pick(self.offset, &defaults.offset),
            distinct: pick(self.distinct, &defaults.distinct),
            alias: pick(self.alias, &defaults.alias),
            output: pick(self.output, &defaults.output),
            id_field: pick(self.id_field, &defaults.id_field),
            low_priority: pick(self.low_priority, &defaults.low_priority),
            ignore: pick(self.ignore, &defaults.ignore),
            quick: pick(self.quick, &defaults.quick),
            delayed: pick(self.delayed, &defaults.delayed),
            into: pick(self.into, &defaults.into),
            only: pick(self.only, &defaults.only),
        }
    }

    /// `(count, offset)` when the query is limited.
    pub fn paging(&self) -> Option<(i64, i64)> {
        match self.number {
            Some(n) if n > 0 => Some((n, self.offset.unwrap_or(0).max(0))),
            _ => None,
        }
    }

    fn flag(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }
}

/// Result of an adapter operation.
#[derive(Debug)]
pub enum Output {
    Sql(String),
    Rows(Vec<Row>),
    Row(Option<Row>),
    Objects(Vec<serde_json::Value>),
    Statement(Statement),
    Affected(u64),
}

impl Output {
    fn mismatch(&self, wanted: &str) -> SqlError {
        let got = match self {
            Output::Sql(_) => "SQL text",
            Output::Rows(_) => "rows",
            Output::Row(_) => "a single row",
            Output::Objects(_) => "objects",
            Output::Statement(_) => "a statement",
            Output::Affected(_) => "an affected row count",
        };
        SqlError::query_build(format!("Expected {} but the query produced {}", wanted, got))
    }

    pub fn into_sql(self) -> Result<String> {
        match self {
            Output::Sql(sql) => Ok(sql),
            other => Err(other.mismatch("SQL text")),
        }
    }

    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            Output::Rows(rows) => Ok(rows),
            Output::Row(row) => Ok(row.into_iter().collect()),
            other => Err(other.mismatch("rows")),
        }
    }

    pub fn into_row(self) -> Result<Option<Row>> {
        match self {
            Output::Row(row) => Ok(row),
            Output::Rows(rows) => Ok(rows.into_iter().next()),
            other => Err(other.mismatch("a single row")),
        }
    }

    pub fn into_objects(self) -> Result<Vec<serde_json::Value>> {
        match self {
            Output::Objects(objects) => Ok(objects),
            other => Err(other.mismatch("objects")),
        }
    }

    pub fn into_statement(self) -> Result<Statement> {
        match self {
            Output::Statement(stmt) => Ok(stmt),
            other => Err(other.mismatch("a statement")),
        }
    }

    pub fn into_affected(self) -> Result<u64> {
        match self {
            Output::Affected(n) => Ok(n),
            other => Err(other.mismatch("an affected row count")),
        }
    }
}

/// How raw SQL is run and what comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Affected row count.
    Exec,
    /// Control statement, nothing returned.
    Batch,
    /// The open statement.
    Statement,
    /// Every row.
    All,
    /// The first row; the rest are discarded.
    One,
    /// First column of the first row.
    FirstColumn,
}

#[derive(Debug)]
pub enum Fetched {
    Affected(u64),
    Done,
    Statement(Statement),
    Rows(Vec<Row>),
    Row(Option<Row>),
    Value(Option<Value>),
}

impl Fetched {
    fn mismatch(self, wanted: &str) -> SqlError {
        SqlError::query_build(format!("Expected {} from raw query, got {:?}", wanted, self))
    }

    pub fn into_affected(self) -> Result<u64> {
        match self {
            Fetched::Affected(n) => Ok(n),
            other => Err(other.mismatch("an affected row count")),
        }
    }

    pub fn into_statement(self) -> Result<Statement> {
        match self {
            Fetched::Statement(stmt) => Ok(stmt),
            other => Err(other.mismatch("a statement")),
        }
    }

    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            Fetched::Rows(rows) => Ok(rows),
            other => Err(other.mismatch("rows")),
        }
    }

    pub fn into_row(self) -> Result<Option<Row>> {
        match self {
            Fetched::Row(row) => Ok(row),
            other => Err(other.mismatch("a row")),
        }
    }

    pub fn into_value(self) -> Result<Option<Value>> {
        match self {
            Fetched::Value(value) => Ok(value),
            other => Err(other.mismatch("a value")),
        }
    }
}

/// One named instance: its configuration and its lazily opened connection.
pub struct Session {
    name: String,
    config: InstanceConfig,
    connector: Connector,
    connection: RefCell<Option<Box<dyn NativeConnection>>>,
    default_id_field: RefCell<String>,
    in_transaction: Cell<bool>,
}

impl Session {
    pub fn new(name: impl Into<String>, config: InstanceConfig, connector: Connector) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
            connection: RefCell::new(None),
            default_id_field: RefCell::new(DEFAULT_ID_FIELD.to_string()),
            in_transaction: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    pub fn default_id_field(&self) -> String {
        self.default_id_field.borrow().clone()
    }

    pub fn set_default_id_field(&self, field: impl Into<String>) {
        *self.default_id_field.borrow_mut() = field.into();
    }

    /// Open the connection if it is not open yet.
    pub fn ensure_connection(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let conn = (self.connector)(&self.config).map_err(|e| {
            warn!(instance = %self.name, error = %e, "connection failed");
            SqlError::driver(e, format!("connecting to instance \"{}\"", self.name))
        })?;
        info!(instance = %self.name, target = %self.config.display_string(), "connected");
        *self.connection.borrow_mut() = Some(conn);
        Ok(())
    }

    /// Run SQL on the native connection.
    ///
    /// This is the only place native failures are turned into `SqlError`.
    pub fn execute_raw(&self, sql: &str, fetch: Fetch) -> Result<Fetched> {
        self.ensure_connection()?;
        debug!(instance = %self.name, ?fetch, sql, "executing");

        let mut guard = self.connection.borrow_mut();
        let Some(conn) = guard.as_mut() else {
            return Err(SqlError::query_build(format!(
                "Instance \"{}\" has no open connection",
                self.name
            )));
        };
        let result = match fetch {
            Fetch::Exec => conn.execute(sql).map(Fetched::Affected),
            Fetch::Batch => conn.batch(sql).map(|_| Fetched::Done),
            Fetch::Statement => conn.query(sql).map(Fetched::Statement),
            Fetch::All => conn
                .query(sql)
                .and_then(Statement::fetch_all)
                .map(Fetched::Rows),
            Fetch::One => conn.query(sql).and_then(|mut stmt| {
                let row = stmt.fetch()?;
                stmt.close();
                Ok(Fetched::Row(row))
            }),
            Fetch::FirstColumn => conn.query(sql).and_then(|mut stmt| {
                let value = stmt.fetch_column()?;
                stmt.close();
                Ok(Fetched::Value(value))
            }),
        };
        result.map_err(|e| {
            warn!(instance = %self.name, error = %e, sql, "query failed");
            SqlError::driver(e, sql)
        })
    }

    pub fn begin(&self, sql: &str) -> Result<()> {
        if self.in_transaction.get() {
            return Err(SqlError::query_build(format!(
                "A transaction is already open on instance \"{}\"",
                self.name
            )));
        }
        self.execute_raw(sql, Fetch::Batch)?;
        self.in_transaction.set(true);
        Ok(())
    }

    pub fn commit(&self, sql: &str) -> Result<()> {
        self.require_transaction()?;
        self.execute_raw(sql, Fetch::Batch)?;
        self.in_transaction.set(false);
        Ok(())
    }

    pub fn rollback(&self, sql: &str) -> Result<()> {
        self.require_transaction()?;
        self.in_transaction.set(false);
        self.execute_raw(sql, Fetch::Batch).map(|_| ())
    }

    fn require_transaction(&self) -> Result<()> {
        if self.in_transaction.get() {
            Ok(())
        } else {
            Err(SqlError::query_build(format!(
                "No open transaction on instance \"{}\"",
                self.name
            )))
        }
    }
}

/// A SQL dialect bound to one instance session.
pub trait SqlAdapter {
    fn session(&self) -> &Session;

    /// Driver key this adapter was registered under.
    fn driver(&self) -> &'static str;

    fn name(&self) -> &str {
        self.session().name()
    }

    fn config(&self) -> &InstanceConfig {
        self.session().config()
    }

    /// Dialect defaults for one kind of query.
    fn defaults(&self, kind: QueryKind) -> QueryOptions {
        QueryOptions::defaults(kind)
    }

    fn render_select(&self, options: &QueryOptions) -> Result<String>;
    fn render_update(&self, options: &QueryOptions) -> Result<String>;
    fn render_insert(&self, options: &QueryOptions) -> Result<String>;
    fn render_delete(&self, options: &QueryOptions) -> Result<String>;

    fn last_insert_id_sql(&self, table: &str, id_field: &str) -> String;

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Quote an identifier. Embedded quotes are doubled.
    fn escape_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn format_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> String {
        String::from(if b { "1" } else { "0" })
    }

    fn format_bytes(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex(bytes))
    }

    /// Render a value as an inline SQL literal.
    fn escape_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.format_bool(*b),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::Text(s) => self.format_string(s),
            Value::Bytes(b) => self.format_bytes(b),
            Value::Json(j) => self.format_string(&j.to_string()),
            Value::List(items) => format!("({})", self.format_value_list(items)),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                self.format_string(&value.display())
            }
        }
    }

    fn format_value_list(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.escape_value(v))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn format_field_list(&self, fields: &[(String, Value)]) -> String {
        fields
            .iter()
            .map(|(name, value)| {
                format!("{}={}", self.escape_identifier(name), self.escape_value(value))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select(&self, options: QueryOptions) -> Result<Output> {
        let mut options = options.merged_over(&self.defaults(QueryKind::Select));
        let output = options.output.unwrap_or(OutputMode::ArrayAssoc);
        if matches!(output, OutputMode::ArrayFirst | OutputMode::Object) {
            options.number = Some(1);
        }
        let sql = self.render_select(&options)?;
        match output {
            OutputMode::SqlQuery => Ok(Output::Sql(sql)),
            OutputMode::Statement => self
                .query(&sql, Fetch::Statement)?
                .into_statement()
                .map(Output::Statement),
            OutputMode::ArrayFirst | OutputMode::Object => {
                self.query(&sql, Fetch::One)?.into_row().map(Output::Row)
            }
            OutputMode::ArrayAssoc => self.query(&sql, Fetch::All)?.into_rows().map(Output::Rows),
            OutputMode::ArrayObjects => {
                let rows = self.query(&sql, Fetch::All)?.into_rows()?;
                Ok(Output::Objects(rows.iter().map(Row::to_json).collect()))
            }
        }
    }

    fn update(&self, options: QueryOptions) -> Result<Output> {
        let options = options.merged_over(&self.defaults(QueryKind::Update));
        let sql = self.render_update(&options)?;
        self.dispatch_exec(sql, options.output)
    }

    fn insert(&self, options: QueryOptions) -> Result<Output> {
        let options = options.merged_over(&self.defaults(QueryKind::Insert));
        let sql = self.render_insert(&options)?;
        self.dispatch_exec(sql, options.output)
    }

    fn delete(&self, options: QueryOptions) -> Result<Output> {
        let options = options.merged_over(&self.defaults(QueryKind::Delete));
        let sql = self.render_delete(&options)?;
        self.dispatch_exec(sql, options.output)
    }

    fn dispatch_exec(&self, sql: String, output: Option<OutputMode>) -> Result<Output> {
        if output == Some(OutputMode::SqlQuery) {
            return Ok(Output::Sql(sql));
        }
        self.query(&sql, Fetch::Exec)?
            .into_affected()
            .map(Output::Affected)
    }

    /// Id generated by the last insert on this connection.
    fn last_insert_id(&self, table: &str) -> Result<Option<Value>> {
        let id_field = self.session().default_id_field();
        let sql = self.last_insert_id_sql(table, &id_field);
        let value = self.query(&sql, Fetch::FirstColumn)?.into_value()?;
        Ok(value.filter(|v| !v.is_null()))
    }

    fn start_transaction(&self) -> Result<()> {
        self.session().begin(self.begin_sql())
    }

    fn commit(&self) -> Result<()> {
        self.session().commit(self.commit_sql())
    }

    fn rollback(&self) -> Result<()> {
        self.session().rollback(self.rollback_sql())
    }

    /// Run raw SQL.
    fn query(&self, sql: &str, fetch: Fetch) -> Result<Fetched> {
        self.session().execute_raw(sql, fetch)
    }

    fn set_default_id_field(&self, field: &str) {
        self.session().set_default_id_field(field);
    }

    fn default_id_field(&self) -> String {
        self.session().default_id_field()
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

pub(crate) fn require_table(options: &QueryOptions) -> Result<&str> {
    match options.table.as_deref().map(str::trim) {
        Some(table) if !table.is_empty() => Ok(table),
        _ => Err(SqlError::query_build("Empty table option")),
    }
}

pub(crate) fn require_fields(options: &QueryOptions) -> Result<&Fields> {
    match &options.what {
        Some(fields) if !fields.is_empty() => Ok(fields),
        _ => Err(SqlError::query_build("No field")),
    }
}

/// A table starting with `(` is a derived table and is used verbatim.
pub(crate) fn is_derived(table: &str) -> bool {
    table.starts_with('(')
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Selected field list, or the table wildcard when none was given.
pub(crate) fn select_fields(
    options: &QueryOptions,
    table_sql: &str,
    derived: bool,
) -> Result<String> {
    match &options.what {
        Some(fields) if !fields.is_empty() => match fields {
            Fields::Raw(raw) => Ok(raw.clone()),
            Fields::List(items) => Ok(items.join(", ")),
            Fields::Assign(_) | Fields::Rows(_) => Err(SqlError::query_build(
                "Column assignments cannot be used as a select field list",
            )),
        },
        _ if derived => Ok("*".to_string()),
        _ => {
            let owner = non_empty(&options.alias).unwrap_or(table_sql);
            Ok(format!("{}.*", owner))
        }
    }
}

/// `SET` part of an update.
pub(crate) fn assignment_list<A: SqlAdapter + ?Sized>(adapter: &A, fields: &Fields) -> Result<String> {
    match fields {
        Fields::Raw(raw) => Ok(raw.clone()),
        Fields::List(items) => Ok(items.join(", ")),
        Fields::Assign(pairs) => Ok(adapter.format_field_list(pairs)),
        Fields::Rows(_) => Err(SqlError::query_build(
            "Bulk rows cannot be used as an update field list",
        )),
    }
}

pub(crate) fn where_clause(conditions: &[String]) -> Option<String> {
    let conditions: Vec<&str> = conditions
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if conditions.is_empty() {
        None
    } else {
        Some(format!("WHERE {}", conditions.join(" AND ")))
    }
}

pub(crate) fn having_clause(having: &[String]) -> Option<String> {
    where_clause(having).map(|w| w.replacen("WHERE", "HAVING", 1))
}

pub(crate) fn join_clause<A: SqlAdapter + ?Sized>(adapter: &A, joins: &[Join]) -> Option<String> {
    let rendered: Vec<String> = joins
        .iter()
        .map(|join| match join {
            Join::Raw(raw) => raw.clone(),
            Join::Spec(spec) => format!(
                "{} JOIN {} {} ON {}",
                if spec.mandatory { "INNER" } else { "LEFT" },
                adapter.escape_identifier(&spec.table),
                spec.alias,
                spec.condition
            ),
        })
        .filter(|j| !j.trim().is_empty())
        .collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(", "))
    }
}

/// Column list and `VALUES` rows of an insert. Every row must have the
/// same columns in the same order.
pub(crate) fn insert_values<A: SqlAdapter + ?Sized>(
    adapter: &A,
    rows: &[Vec<(String, Value)>],
) -> Result<(String, String)> {
    let Some(first) = rows.first() else {
        return Err(SqlError::query_build("No field"));
    };
    let columns: Vec<&str> = first.iter().map(|(name, _)| name.as_str()).collect();
    let mut values = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let same_shape = row.len() == columns.len()
            && row.iter().zip(&columns).all(|((name, _), col)| name == col);
        if !same_shape {
            return Err(SqlError::query_build(format!(
                "Insert row {} does not have the same columns as the first row",
                i
            )));
        }
        let items: Vec<String> = row.iter().map(|(_, v)| adapter.escape_value(v)).collect();
        values.push(format!("({})", items.join(", ")));
    }
    let columns: Vec<String> = columns.iter().map(|c| adapter.escape_identifier(c)).collect();
    Ok((
        format!("({})", columns.join(", ")),
        format!("VALUES {}", values.join(", ")),
    ))
}

/// MSSQL-style bound on `rownum`.
pub(crate) fn rownum_bound(count: i64, offset: i64) -> String {
    if offset > 0 {
        format!("BETWEEN {} AND {}", offset, offset.saturating_add(count))
    } else {
        format!("<= {}", count)
    }
}
