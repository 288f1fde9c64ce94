use std::rc::Rc;

use super::{Condition, RequestBase};
use crate::adapter::{Fields, Output, OutputMode, SqlAdapter};
use crate::error::Result;
use crate::value::Value;

/// An UPDATE with optional conditions, ordering and row limit.
pub struct UpdateRequest {
    base: RequestBase,
}

impl UpdateRequest {
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

    /// Assign `column = value`, keeping earlier assignments.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let pair = (column.into(), value.into());
        let what = &mut self.base.options_mut().what;
        *what = Some(match what.take() {
            Some(Fields::Assign(mut pairs)) => {
                pairs.push(pair);
                Fields::Assign(pairs)
            }
            _ => Fields::Assign(vec![pair]),
        });
        self
    }

    pub fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        self.base.push_condition(condition.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.base.options_mut().order_by = Some(order_by.into());
        self
    }

    pub fn number(mut self, number: i64) -> Self {
        self.base.options_mut().number = Some(number);
        self
    }

    pub fn from_offset(mut self, offset: i64) -> Self {
        self.base.options_mut().offset = Some(offset);
        self
    }

    pub fn low_priority(mut self, low_priority: bool) -> Self {
        self.base.options_mut().low_priority = Some(low_priority);
        self
    }

    pub fn ignore(mut self, ignore: bool) -> Self {
        self.base.options_mut().ignore = Some(ignore);
        self
    }

    pub fn only(mut self, only: bool) -> Self {
        self.base.options_mut().only = Some(only);
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.base.set_output(output);
        self
    }

    pub fn sql(&self) -> Result<String> {
        self.base.adapter().update(self.base.resolved_text()?)?.into_sql()
    }

    pub fn run(&self) -> Result<Output> {
        self.base.adapter().update(self.base.resolved()?)
    }

    /// Update and return the affected row count.
    pub fn execute(&self) -> Result<u64> {
        let mut options = self.base.resolved()?;
        options.output = None;
        self.base.adapter().update(options)?.into_affected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MsSqlAdapter, MySqlAdapter, Session};
    use crate::config::InstanceConfig;
    use crate::driver::Script;

    fn session(driver: &str, script: &Script) -> Session {
        Session::new("default", InstanceConfig::new(driver), script.connector())
    }

    #[test]
    fn test_set_accumulates() {
        let adapter = Rc::new(MySqlAdapter::new(session("mysql", &Script::new())));
        let request = UpdateRequest::new(adapter, "users")
            .set("name", "ann")
            .set("age", 4)
            .and_where(("id", 1));
        assert_eq!(
            request.sql().unwrap(),
            "UPDATE `users` SET `name`='ann', `age`=4 WHERE `id` = 1"
        );
    }

    #[test]
    fn test_mssql_paged_update_uses_request_id_field() {
        let adapter = Rc::new(MsSqlAdapter::new(session("mssql", &Script::new())));
        let request = UpdateRequest::new(adapter, "jobs")
            .id_field("job_id")
            .set("state", "done")
            .number(2);
        assert_eq!(
            request.sql().unwrap(),
            "WITH a AS (SELECT *, ROW_NUMBER() OVER(ORDER BY job_id) AS rownum FROM \"jobs\") \
             UPDATE a SET \"state\"='done' WHERE a.rownum <= 2"
        );
    }

    #[test]
    fn test_execute_returns_affected() {
        let script = Script::new().on_execute("UPDATE", 3);
        let adapter = Rc::new(MySqlAdapter::new(session("mysql", &script)));
        let request = UpdateRequest::new(adapter, "users").set("active", false);
        assert_eq!(request.execute().unwrap(), 3);
        assert!(matches!(request.run().unwrap(), Output::Affected(3)));
    }

    #[test]
    fn test_requires_fields() {
        let adapter = Rc::new(MySqlAdapter::new(session("mysql", &Script::new())));
        let err = UpdateRequest::new(adapter, "users").execute().unwrap_err();
        assert!(err.is_query_build());
    }
}
