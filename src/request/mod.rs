//! Fluent request builders over an adapter.
//!
//! Builders collect options and conditions without touching the database;
//! nothing is rendered or executed until a terminal call (`run`, `sql`,
//! `rows`, `count`, iteration, ...).
pub mod condition;
mod delete;
mod insert;
mod select;
mod update;

use std::rc::Rc;

use crate::adapter::{OutputMode, QueryOptions, SqlAdapter};
use crate::error::Result;

pub use condition::{Condition, Term};
pub use delete::DeleteRequest;
pub use insert::InsertRequest;
pub use select::{SelectCursor, SelectRequest, Selection};
pub use update::UpdateRequest;

/// State shared by every request kind.
#[derive(Clone)]
pub struct RequestBase {
    adapter: Rc<dyn SqlAdapter>,
    id_field: String,
    options: QueryOptions,
    conditions: Vec<Condition>,
}

impl RequestBase {
    pub fn new(adapter: Rc<dyn SqlAdapter>, id_field: impl Into<String>) -> Self {
        Self {
            adapter,
            id_field: id_field.into(),
            options: QueryOptions::new(),
            conditions: Vec::new(),
        }
    }

    pub fn adapter(&self) -> &Rc<dyn SqlAdapter> {
        &self.adapter
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn set_id_field(&mut self, id_field: impl Into<String>) {
        self.id_field = id_field.into();
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }

    pub fn table(&self) -> Option<&str> {
        self.options.table.as_deref()
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.options.table = Some(table.into());
    }

    pub fn output(&self) -> Option<OutputMode> {
        self.options.output
    }

    pub fn set_output(&mut self, output: OutputMode) {
        self.options.output = Some(output);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn escape_identifier(&self, identifier: &str) -> String {
        self.adapter.escape_identifier(identifier)
    }

    pub fn format_condition(&self, condition: &Condition) -> Result<String> {
        condition.format(&*self.adapter)
    }

    pub(crate) fn format_conditions(&self, conditions: &[Condition]) -> Result<Vec<String>> {
        conditions.iter().map(|c| self.format_condition(c)).collect()
    }

    /// Options handed to the adapter: conditions rendered, id field set.
    pub(crate) fn resolved(&self) -> Result<QueryOptions> {
        let mut options = self.options.clone();
        options.conditions = self.format_conditions(&self.conditions)?;
        options.id_field = Some(self.id_field.clone());
        Ok(options)
    }

    /// Options with the output forced to the SQL text.
    pub(crate) fn resolved_text(&self) -> Result<QueryOptions> {
        let mut options = self.resolved()?;
        options.output = Some(OutputMode::SqlQuery);
        Ok(options)
    }
}
