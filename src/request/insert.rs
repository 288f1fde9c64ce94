use std::rc::Rc;

use super::RequestBase;
use crate::adapter::{Fetch, Fields, Output, OutputMode, SqlAdapter};
use crate::error::{Result, SqlError};
use crate::value::Value;

/// An INSERT of one row, several same-shaped rows, or a raw fragment.
pub struct InsertRequest {
    base: RequestBase,
}

impl InsertRequest {
    pub fn new(adapter: Rc<dyn SqlAdapter>, table: &str) -> Self {
        let id_field = adapter.default_id_field();
        let mut base = RequestBase::new(adapter, id_field);
        base.set_table(table);
        Self { base }
    }

    pub fn base(&self) -> &RequestBase {
        &self.base
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.base.set_table(table);
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.base.set_id_field(id_field);
        self
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.base.options_mut().what = Some(fields);
        self
    }

    pub fn get_fields(&self) -> Option<&Fields> {
        self.base.options().what.as_ref()
    }

    /// A single row of column values.
    pub fn values<K, V, I>(self, values: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.fields(Fields::Assign(pairs(values)))
    }

    /// Add one row to a bulk insert.
    pub fn add_row<K, V, I>(mut self, row: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let row = pairs(row);
        let what = &mut self.base.options_mut().what;
        *what = Some(match what.take() {
            Some(Fields::Rows(mut rows)) => {
                rows.push(row);
                Fields::Rows(rows)
            }
            Some(Fields::Assign(first)) => Fields::Rows(vec![first, row]),
            _ => Fields::Rows(vec![row]),
        });
        self
    }

    pub fn ignore(mut self, ignore: bool) -> Self {
        self.base.options_mut().ignore = Some(ignore);
        self
    }

    pub fn low_priority(mut self, low_priority: bool) -> Self {
        self.base.options_mut().low_priority = Some(low_priority);
        self
    }

    pub fn delayed(mut self, delayed: bool) -> Self {
        self.base.options_mut().delayed = Some(delayed);
        self
    }

    pub fn into_keyword(mut self, into: bool) -> Self {
        self.base.options_mut().into = Some(into);
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.base.set_output(output);
        self
    }

    pub fn sql(&self) -> Result<String> {
        self.base.adapter().insert(self.base.resolved_text()?)?.into_sql()
    }

    pub fn run(&self) -> Result<Output> {
        self.base.adapter().insert(self.base.resolved()?)
    }

    /// Insert and return the affected row count.
    pub fn execute(&self) -> Result<u64> {
        let mut options = self.base.resolved()?;
        options.output = None;
        self.base.adapter().insert(options)?.into_affected()
    }

    /// Id generated by the last insert on this connection.
    pub fn last_id(&self) -> Result<Option<Value>> {
        let table = self
            .base
            .table()
            .ok_or_else(|| SqlError::query_build("Empty table option"))?;
        let adapter = self.base.adapter();
        let sql = adapter.last_insert_id_sql(table, self.base.id_field());
        let value = adapter.query(&sql, Fetch::FirstColumn)?.into_value()?;
        Ok(value.filter(|v| !v.is_null()))
    }
}

fn pairs<K, V, I>(values: I) -> Vec<(String, Value)>
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MySqlAdapter, PgSqlAdapter, Session};
    use crate::config::InstanceConfig;
    use crate::driver::Script;
    use crate::value::Row;

    fn adapter(driver: &str, script: &Script) -> Rc<dyn SqlAdapter> {
        let session = Session::new("default", InstanceConfig::new(driver), script.connector());
        match driver {
            "pgsql" => Rc::new(PgSqlAdapter::new(session)),
            _ => Rc::new(MySqlAdapter::new(session)),
        }
    }

    #[test]
    fn test_single_and_bulk() {
        let mysql = adapter("mysql", &Script::new());
        let single = InsertRequest::new(mysql.clone(), "users").values([("name", "ann")]);
        assert_eq!(single.sql().unwrap(), "INSERT INTO `users` SET `name`='ann'");

        let bulk = InsertRequest::new(mysql, "users")
            .values([("name", "ann")])
            .add_row([("name", "bo")])
            .delayed(true);
        assert_eq!(
            bulk.sql().unwrap(),
            "INSERT DELAYED INTO `users` (`name`) VALUES ('ann'), ('bo')"
        );
    }

    #[test]
    fn test_requires_values() {
        let request = InsertRequest::new(adapter("mysql", &Script::new()), "users");
        assert!(request.sql().unwrap_err().is_query_build());
    }

    #[test]
    fn test_execute_and_last_id() {
        let script = Script::new()
            .on_execute("INSERT", 1)
            .on_query("currval", vec![Row::from_pairs([("currval", 77)])]);
        let request = InsertRequest::new(adapter("pgsql", &script), "users")
            .id_field("user_id")
            .values([("name", Value::from("ann")), ("age", Value::Int(30))]);
        assert_eq!(request.execute().unwrap(), 1);
        assert_eq!(request.last_id().unwrap(), Some(Value::Int(77)));
        assert_eq!(
            script.executed(),
            vec![
                "INSERT INTO \"users\" (\"name\", \"age\") VALUES ('ann', 30)",
                "SELECT currval(pg_get_serial_sequence('users', 'user_id'))",
            ]
        );
    }
}
