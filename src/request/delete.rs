use std::rc::Rc;

use super::{Condition, RequestBase};
use crate::adapter::{Output, OutputMode, SqlAdapter};
use crate::error::Result;

/// A DELETE with optional conditions, ordering and row limit.
pub struct DeleteRequest {
    base: RequestBase,
}

impl DeleteRequest {
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

    pub fn quick(mut self, quick: bool) -> Self {
        self.base.options_mut().quick = Some(quick);
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
        self.base.adapter().delete(self.base.resolved_text()?)?.into_sql()
    }

    pub fn run(&self) -> Result<Output> {
        self.base.adapter().delete(self.base.resolved()?)
    }

    /// Delete and return the affected row count.
    pub fn execute(&self) -> Result<u64> {
        let mut options = self.base.resolved()?;
        options.output = None;
        self.base.adapter().delete(options)?.into_affected()
    }
}
