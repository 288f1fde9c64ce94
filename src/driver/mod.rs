//! Native connections behind the adapters.
//!
//! Every dialect adapter talks to its database through a boxed
//! `NativeConnection` produced by a `Connector`. The real drivers are async
//! (tokio-postgres, mysql_async, tiberius); each connection owns a
//! current-thread tokio runtime and blocks on it, so the adapter API stays
//! synchronous and single-threaded.
mod mssql;
mod mysql;
mod postgres;
mod scripted;

use std::collections::VecDeque;
use std::fmt;

use crate::config::InstanceConfig;
use crate::error::DriverError;
use crate::value::Row;

pub use mssql::connect as connect_mssql;
pub use mysql::connect as connect_mysql;
pub use postgres::connect as connect_postgres;
pub use scripted::{Script, ScriptedConnection};

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Opens a native connection for an instance configuration.
pub type Connector = Box<dyn Fn(&InstanceConfig) -> DriverResult<Box<dyn NativeConnection>>>;

/// One open connection to a database server.
pub trait NativeConnection {
    /// Run a statement that returns no rows; yields the affected row count.
    fn execute(&mut self, sql: &str) -> DriverResult<u64>;

    /// Run a statement that returns rows.
    fn query(&mut self, sql: &str) -> DriverResult<Statement>;

    /// Run control statements such as `BEGIN` that must not be wrapped by
    /// the driver in a prepared or procedure call.
    fn batch(&mut self, sql: &str) -> DriverResult<()> {
        self.execute(sql).map(|_| ())
    }
}

/// Rows pulled from the server one at a time.
pub trait RowSource {
    fn next_row(&mut self) -> DriverResult<Option<Row>>;
}

/// A forward-only result set.
///
/// Rows are either buffered up front or pulled from a `RowSource` on each
/// fetch. Neither form borrows the connection it came from.
#[derive(Default)]
pub struct Statement {
    rows: VecDeque<Row>,
    source: Option<Box<dyn RowSource>>,
    fetched: usize,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("buffered", &self.rows.len())
            .field("streaming", &self.source.is_some())
            .field("fetched", &self.fetched)
            .finish()
    }
}

impl Statement {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            ..Self::default()
        }
    }

    pub fn streaming(source: impl RowSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Next row, or `None` once the statement is drained.
    pub fn fetch(&mut self) -> DriverResult<Option<Row>> {
        let row = match self.rows.pop_front() {
            Some(row) => Some(row),
            None => self.pull()?,
        };
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    fn pull(&mut self) -> DriverResult<Option<Row>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        let next = source.next_row();
        if !matches!(next, Ok(Some(_))) {
            self.source = None;
        }
        next
    }

    /// All remaining rows.
    pub fn fetch_all(mut self) -> DriverResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.rows.len());
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// First column of the next row.
    pub fn fetch_column(&mut self) -> DriverResult<Option<crate::value::Value>> {
        Ok(self.fetch()?.and_then(|row| row.get_index(0).cloned()))
    }

    /// Number of rows handed out so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Buffered rows not handed out yet. A streaming statement may hold more.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_streaming(&self) -> bool {
        self.source.is_some()
    }

    /// Drop any remaining rows.
    pub fn close(&mut self) {
        self.rows.clear();
        self.source = None;
    }
}

impl Iterator for Statement {
    type Item = DriverResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch().transpose()
    }
}

pub(crate) fn block_on_runtime() -> DriverResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DriverError::new)
}

/// Error used when a driver is asked to do something it cannot express.
#[derive(Debug)]
pub(crate) struct Unsupported(pub &'static str);

impl std::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Unsupported {}
