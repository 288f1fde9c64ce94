use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{Condition, RequestBase};
use crate::adapter::{Fields, Join, JoinSpec, Output, OutputMode, QueryOptions, SqlAdapter};
use crate::driver::Statement;
use crate::error::{Result, SqlError};
use crate::hydrate::{Entity, Record, Repository};
use crate::value::Row;

const COUNT_COLUMN: &str = "row_count";

type Filter<E> = Rc<dyn Fn(&Record<E>) -> bool>;

enum CursorState {
    Unstarted,
    Fetching { statement: Statement, hydrate: bool },
    Exhausted,
}

/// What `run` produced, following the requested output mode.
pub enum Selection<E> {
    Sql(String),
    Rows(Vec<Row>),
    Row(Option<Row>),
    Object(Option<Rc<E>>),
    Objects(Vec<Rc<E>>),
    Statement(Statement),
}

impl<E> fmt::Debug for Selection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Selection::Rows(rows) => write!(f, "Rows({})", rows.len()),
            Selection::Row(row) => write!(f, "Row({})", row.is_some()),
            Selection::Object(object) => write!(f, "Object({})", object.is_some()),
            Selection::Objects(objects) => write!(f, "Objects({})", objects.len()),
            Selection::Statement(stmt) => write!(f, "Statement({})", stmt.remaining()),
        }
    }
}

/// A SELECT over one table.
///
/// Iterating the request (`into_iter` or `cursor`) runs it through a
/// `SelectCursor`.
pub struct SelectRequest<E: Entity = Row> {
    base: RequestBase,
    having: Vec<Condition>,
    repository: Rc<Repository<E>>,
    using_cache: bool,
    filters: Vec<Filter<E>>,
}

impl SelectRequest<Row> {
    /// Select raw rows from `table`.
    pub fn from_table(adapter: Rc<dyn SqlAdapter>, table: &str) -> Self {
        let id_field = adapter.default_id_field();
        SelectRequest::new(
            adapter,
            Rc::new(Repository::with_id_field(table, id_field)),
        )
    }
}

impl<E: Entity> SelectRequest<E> {
    pub fn new(adapter: Rc<dyn SqlAdapter>, repository: Rc<Repository<E>>) -> Self {
        let mut base = RequestBase::new(adapter, repository.id_field());
        base.set_table(repository.table());
        Self {
            base,
            having: Vec::new(),
            repository,
            using_cache: true,
            filters: Vec::new(),
        }
    }

    pub fn base(&self) -> &RequestBase {
        &self.base
    }

    pub fn options(&self) -> &QueryOptions {
        self.base.options()
    }

    pub fn repository(&self) -> &Rc<Repository<E>> {
        &self.repository
    }

    /// Options and conditions only; filters start over.
    pub fn get_clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            having: self.having.clone(),
            repository: self.repository.clone(),
            using_cache: self.using_cache,
            filters: Vec::new(),
        }
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.base.options_mut().what = Some(fields);
        self
    }

    pub fn field_list<S: Into<String>>(self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields(Fields::List(fields.into_iter().map(Into::into).collect()))
    }

    /// Append to the field list; with no list yet, appends to `*`.
    pub fn add_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        let what = &mut self.base.options_mut().what;
        *what = Some(match what.take() {
            Some(Fields::Raw(raw)) => Fields::Raw(format!("{},{}", raw, field)),
            Some(Fields::List(mut items)) => {
                items.push(field);
                Fields::List(items)
            }
            _ => Fields::List(vec!["*".to_string(), field]),
        });
        self
    }

    pub fn get_fields(&self) -> Option<&Fields> {
        self.options().what.as_ref()
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.base.set_table(table);
        self
    }

    pub fn get_table(&self) -> Option<&str> {
        self.base.table()
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.base.options_mut().alias = Some(alias.into());
        self
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.options().alias.as_deref()
    }

    /// Set the alias unless one is set already; returns the alias in use.
    pub fn set_alias_default(&mut self, alias: &str) -> String {
        let current = &mut self.base.options_mut().alias;
        current.get_or_insert_with(|| alias.to_string()).clone()
    }

    /// Alias if set, else the table.
    pub fn entity_name(&self) -> &str {
        self.get_alias()
            .or_else(|| self.get_table())
            .unwrap_or_default()
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.base.options_mut().distinct = Some(distinct);
        self
    }

    pub fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        self.base.push_condition(condition.into());
        self
    }

    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.having.push(condition.into());
        self
    }

    pub fn get_having(&self) -> &[Condition] {
        &self.having
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.base.options_mut().order_by = Some(order_by.into());
        self
    }

    pub fn get_order_by(&self) -> Option<&str> {
        self.options().order_by.as_deref()
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.base.options_mut().group_by = Some(group_by.into());
        self
    }

    pub fn number(self, number: i64) -> Self {
        self.max_rows(number)
    }

    pub fn max_rows(mut self, number: i64) -> Self {
        self.base.options_mut().number = Some(number);
        self
    }

    pub fn get_number(&self) -> Option<i64> {
        self.options().number
    }

    pub fn from_offset(mut self, offset: i64) -> Self {
        self.base.options_mut().offset = Some(offset);
        self
    }

    pub fn get_offset(&self) -> Option<i64> {
        self.options().offset
    }

    pub fn join(mut self, join: Join) -> Self {
        self.base.options_mut().joins.push(join);
        self
    }

    pub fn join_raw(self, join: impl Into<String>) -> Self {
        self.join(Join::Raw(join.into()))
    }

    pub fn join_spec(self, spec: JoinSpec) -> Self {
        self.join(Join::Spec(spec))
    }

    /// Join `table` on `alias.their_field = entity.my_field`. The alias
    /// defaults to `j<n>` and `my_field` to the id field.
    pub fn join_smart(
        mut self,
        table: &str,
        alias: Option<&str>,
        my_field: Option<&str>,
        their_field: &str,
        mandatory: bool,
    ) -> Self {
        let alias = match alias {
            Some(alias) => alias.to_string(),
            None => format!("j{}", self.options().joins.len() + 1),
        };
        let my_field = my_field.unwrap_or(self.base.id_field()).to_string();
        let condition = format!(
            "{} = {}",
            self.base.escape_identifier(&format!("{}.{}", alias, their_field)),
            self.base
                .escape_identifier(&format!("{}.{}", self.entity_name(), my_field))
        );
        self.base.options_mut().joins.push(Join::Spec(JoinSpec {
            table: table.to_string(),
            alias,
            condition,
            mandatory,
        }));
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.base.set_output(output);
        self
    }

    pub fn get_output(&self) -> Option<OutputMode> {
        self.base.output()
    }

    pub fn as_object(self) -> Self {
        self.output(OutputMode::Object)
    }

    pub fn as_object_list(self) -> Self {
        self.output(OutputMode::ArrayObjects)
    }

    pub fn as_array(self) -> Self {
        self.output(OutputMode::ArrayFirst)
    }

    pub fn as_array_list(self) -> Self {
        self.output(OutputMode::ArrayAssoc)
    }

    /// Keep only records for which `predicate` holds. Filters run in order
    /// after hydration; `count` and `exists` ignore them.
    pub fn filter(mut self, predicate: impl Fn(&Record<E>) -> bool + 'static) -> Self {
        self.filters.push(Rc::new(predicate));
        self
    }

    pub fn disable_cache(self) -> Self {
        self.set_using_cache(false)
    }

    pub fn set_using_cache(mut self, using_cache: bool) -> Self {
        self.using_cache = using_cache;
        self
    }

    pub fn using_cache(&self) -> bool {
        self.using_cache
    }

    fn passes(&self, record: &Record<E>) -> bool {
        self.filters.iter().all(|f| f(record))
    }

    fn hydrate(&self, row: Row) -> Result<Rc<E>> {
        self.repository.load(row, self.using_cache)
    }

    fn resolved(&self) -> Result<QueryOptions> {
        let mut options = self.base.resolved()?;
        options.having = self.base.format_conditions(&self.having)?;
        Ok(options)
    }

    fn select(&self, options: QueryOptions) -> Result<Output> {
        self.base.adapter().select(options)
    }

    /// The generated SQL; nothing is executed.
    pub fn sql(&self) -> Result<String> {
        let mut options = self.resolved()?;
        options.output = Some(OutputMode::SqlQuery);
        self.select(options)?.into_sql()
    }

    /// Run according to the output mode.
    pub fn run(&self) -> Result<Selection<E>> {
        let mut options = self.resolved()?;
        match options.output {
            Some(OutputMode::Object) => {
                options.number = Some(1);
                options.output = Some(OutputMode::ArrayAssoc);
                let row = self.select(options)?.into_rows()?.into_iter().next();
                let object = match row {
                    Some(row) => Some(self.hydrate(row)?),
                    None => None,
                };
                Ok(Selection::Object(
                    object.filter(|o| self.passes(&Record::Object(o.clone()))),
                ))
            }
            Some(OutputMode::ArrayObjects) => {
                options.output = Some(OutputMode::ArrayAssoc);
                let mut objects = Vec::new();
                for row in self.select(options)?.into_rows()? {
                    let object = self.hydrate(row)?;
                    if self.passes(&Record::Object(object.clone())) {
                        objects.push(object);
                    }
                }
                Ok(Selection::Objects(objects))
            }
            _ => Ok(match self.select(options)? {
                Output::Sql(sql) => Selection::Sql(sql),
                Output::Rows(rows) => Selection::Rows(rows),
                Output::Row(row) => Selection::Row(row),
                Output::Statement(stmt) => Selection::Statement(stmt),
                other => {
                    return Err(SqlError::query_build(format!(
                        "Unexpected select output {:?}",
                        other
                    )))
                }
            }),
        }
    }

    /// The first matching object, or `None`.
    pub fn object(&self) -> Result<Option<Rc<E>>> {
        let request = self.get_clone_with_filters().as_object();
        match request.run()? {
            Selection::Object(object) => Ok(object),
            other => Err(SqlError::query_build(format!(
                "Expected an object, got {:?}",
                other
            ))),
        }
    }

    /// Every object passing the filters.
    pub fn objects(&self) -> Result<Vec<Rc<E>>> {
        let request = self.get_clone_with_filters().as_object_list();
        match request.run()? {
            Selection::Objects(objects) => Ok(objects),
            other => Err(SqlError::query_build(format!(
                "Expected objects, got {:?}",
                other
            ))),
        }
    }

    /// Every raw row. Filters do not apply.
    pub fn rows(&self) -> Result<Vec<Row>> {
        let mut options = self.resolved()?;
        options.output = Some(OutputMode::ArrayAssoc);
        self.select(options)?.into_rows()
    }

    /// The first raw row.
    pub fn row(&self) -> Result<Option<Row>> {
        let mut options = self.resolved()?;
        options.output = Some(OutputMode::ArrayFirst);
        self.select(options)?.into_row()
    }

    fn get_clone_with_filters(&self) -> Self {
        let mut clone = self.get_clone();
        clone.filters = self.filters.clone();
        clone
    }

    /// Rows this query returns, counted in the database before any filter.
    /// `max` caps the rows the inner query may return.
    pub fn count(&self, max: Option<i64>) -> Result<u64> {
        let mut inner = self.resolved()?;
        inner.output = Some(OutputMode::SqlQuery);
        if let Some(max) = max {
            inner.number = Some(max);
        }
        // ORDER BY is not allowed in an unpaged derived table on SQL Server
        if inner.paging().is_none() {
            inner.order_by = None;
        }
        let inner_sql = self.select(inner)?.into_sql()?;

        let outer = QueryOptions {
            table: Some(format!("({}) oq", inner_sql)),
            what: Some(Fields::Raw(format!("COUNT(*) {}", COUNT_COLUMN))),
            output: Some(OutputMode::ArrayAssoc),
            ..QueryOptions::new()
        };
        let row = self.select(outer)?.into_rows()?.into_iter().next();
        let count = row
            .as_ref()
            .and_then(|r| r.get(COUNT_COLUMN).or_else(|| r.get_index(0)))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.count(Some(1))? > 0)
    }

    /// A cursor over this query, filters included. Nothing runs until the
    /// first fetch.
    pub fn cursor(&self) -> SelectCursor<E> {
        SelectCursor::new(self.get_clone_with_filters())
    }
}

impl<E: Entity> IntoIterator for SelectRequest<E> {
    type Item = Result<(usize, Record<E>)>;
    type IntoIter = SelectCursor<E>;

    fn into_iter(self) -> SelectCursor<E> {
        SelectCursor::new(self)
    }
}

/// Single-pass cursor over a select.
///
/// Iterating yields `(index, record)` pairs. Records come back hydrated
/// through the repository when the output mode is `Object`, `ArrayObjects`
/// or unset, and as raw rows otherwise. Rows rejected by a filter are
/// skipped without consuming an index.
pub struct SelectCursor<E: Entity = Row> {
    request: SelectRequest<E>,
    state: CursorState,
    index: usize,
}

impl<E: Entity> SelectCursor<E> {
    fn new(request: SelectRequest<E>) -> Self {
        Self {
            request,
            state: CursorState::Unstarted,
            index: 0,
        }
    }

    pub fn request(&self) -> &SelectRequest<E> {
        &self.request
    }

    fn start(&mut self) -> Result<()> {
        let mut options = self.request.resolved()?;
        let hydrate = matches!(
            options.output,
            None | Some(OutputMode::Object) | Some(OutputMode::ArrayObjects)
        );
        options.output = Some(OutputMode::Statement);
        let statement = self.request.select(options)?.into_statement()?;
        trace!(
            hydrate,
            streaming = statement.is_streaming(),
            buffered = statement.remaining(),
            "select cursor started"
        );
        self.state = CursorState::Fetching { statement, hydrate };
        Ok(())
    }

    /// The next record, ignoring filters. Starts the query on first use.
    pub fn fetch(&mut self) -> Result<Option<Record<E>>> {
        if let CursorState::Unstarted = self.state {
            if let Err(e) = self.start() {
                self.state = CursorState::Exhausted;
                return Err(e);
            }
        }
        let (row, hydrate) = match &mut self.state {
            CursorState::Fetching { statement, hydrate } => (statement.fetch(), *hydrate),
            _ => return Ok(None),
        };
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                self.state = CursorState::Exhausted;
                return Err(SqlError::driver(e, "fetching the next select row"));
            }
        };
        match row {
            None => {
                trace!(fetched = self.index, "select cursor exhausted");
                self.state = CursorState::Exhausted;
                Ok(None)
            }
            Some(row) if hydrate => self.request.hydrate(row).map(|o| Some(Record::Object(o))),
            Some(row) => Ok(Some(Record::Row(row))),
        }
    }

    /// Index the next accepted record will get.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }
}

impl<E: Entity> Iterator for SelectCursor<E> {
    type Item = Result<(usize, Record<E>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.fetch() {
                Err(e) => return Some(Err(e)),
                Ok(None) => return None,
                Ok(Some(record)) if self.request.passes(&record) => {
                    let index = self.index;
                    self.index += 1;
                    return Some(Ok((index, record)));
                }
                Ok(Some(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MsSqlAdapter, MySqlAdapter, Session};
    use crate::config::InstanceConfig;
    use crate::driver::Script;
    use crate::value::Value;

    fn mysql(script: &Script) -> Rc<dyn SqlAdapter> {
        Rc::new(MySqlAdapter::new(Session::new(
            "default",
            InstanceConfig::new("mysql"),
            script.connector(),
        )))
    }

    fn numbered(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::from_pairs([("id", Value::Int(i))])).collect()
    }

    fn id_of(record: &Record<Row>) -> i64 {
        match record {
            Record::Object(row) => row.get("id"),
            Record::Row(row) => row.get("id"),
        }
        .and_then(Value::as_i64)
        .unwrap_or(-1)
    }

    #[test]
    fn test_sql_rendering() {
        let request = SelectRequest::from_table(mysql(&Script::new()), "users")
            .field_list(["id", "name"])
            .and_where(("age", ">", 18))
            .and_where(("role", vec!["a", "b"]))
            .order_by("name")
            .number(10)
            .from_offset(20);
        assert_eq!(
            request.sql().unwrap(),
            "SELECT id, name FROM `users` WHERE `age` > 18 AND `role` IN ('a','b') \
             ORDER BY name LIMIT 20,10"
        );
    }

    #[test]
    fn test_add_field_and_alias() {
        let mut request = SelectRequest::from_table(mysql(&Script::new()), "users").add_field("x");
        assert_eq!(request.set_alias_default("u"), "u");
        assert_eq!(request.set_alias_default("v"), "u");
        assert_eq!(request.entity_name(), "u");
        assert_eq!(request.sql().unwrap(), "SELECT *, x FROM `users` u");
    }

    #[test]
    fn test_having_uses_grammar() {
        let request = SelectRequest::from_table(mysql(&Script::new()), "orders")
            .field_list(["user_id", "COUNT(*) n"])
            .group_by("user_id")
            .having(Condition::compare("n", ">", 2));
        assert_eq!(
            request.sql().unwrap(),
            "SELECT user_id, COUNT(*) n FROM `orders` GROUP BY user_id HAVING `n` > 2"
        );
    }

    #[test]
    fn test_join_smart() {
        let request = SelectRequest::from_table(mysql(&Script::new()), "users")
            .join_smart("groups", None, Some("group_id"), "id", true)
            .join_smart("profiles", Some("p"), None, "user_id", false);
        assert_eq!(
            request.sql().unwrap(),
            "SELECT `users`.* FROM `users` \
             INNER JOIN `groups` j1 ON `j1`.`id` = `users`.`group_id`, \
             LEFT JOIN `profiles` p ON `p`.`user_id` = `users`.`id`"
        );
    }

    #[test]
    fn test_malformed_condition_fails_at_terminal() {
        let bad = Condition::Or(vec![]);
        let request = SelectRequest::from_table(mysql(&Script::new()), "users").and_where(bad);
        assert!(request.sql().unwrap_err().is_query_build());
    }

    #[test]
    fn test_iteration_skips_filtered_rows_without_gaps() {
        let script = Script::new().on_query("", numbered(10));
        let request = SelectRequest::from_table(mysql(&script), "t")
            .filter(|r| id_of(r) % 2 == 0);
        let items: Vec<(usize, i64)> = request
            .into_iter()
            .map(|item| item.map(|(i, r)| (i, id_of(&r))).unwrap())
            .collect();
        assert_eq!(items, vec![(0, 0), (1, 2), (2, 4), (3, 6), (4, 8)]);
        assert_eq!(script.executed().len(), 1);
    }

    #[test]
    fn test_iteration_hydrates_unless_array_output() {
        let script = Script::new().on_query("", numbered(2));
        let mut objects = SelectRequest::from_table(mysql(&script), "t").into_iter();
        assert!(matches!(objects.next(), Some(Ok((0, Record::Object(_))))));

        let mut rows = SelectRequest::from_table(mysql(&script), "t").as_array_list().cursor();
        assert!(matches!(rows.next(), Some(Ok((0, Record::Row(_))))));
        assert_eq!(rows.position(), 1);
    }

    #[test]
    fn test_start_error_yielded_once() {
        let script = Script::new().fail_on("FROM", "boom");
        let mut cursor = SelectRequest::from_table(mysql(&script), "t").cursor();
        let err = cursor.next().unwrap().unwrap_err();
        assert!(err.is_driver());
        assert!(cursor.next().is_none());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_count_ignores_filters() {
        let script = Script::new()
            .on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 5)])])
            .on_query("", numbered(5));
        let request = SelectRequest::from_table(mysql(&script), "t").filter(|r| id_of(r) < 2);
        assert_eq!(request.count(None).unwrap(), 5);
        assert_eq!(
            script.last().as_deref(),
            Some("SELECT COUNT(*) row_count FROM (SELECT `t`.* FROM `t`) oq")
        );
        assert!(request.exists().unwrap());
        assert_eq!(
            script.last().as_deref(),
            Some("SELECT COUNT(*) row_count FROM (SELECT `t`.* FROM `t` LIMIT 1) oq")
        );
        assert_eq!(request.objects().unwrap().len(), 2);
    }

    #[test]
    fn test_count_on_owned_filtered_request() {
        let script = Script::new()
            .on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 5)])])
            .on_query("", numbered(5));
        let request = SelectRequest::from_table(mysql(&script), "t")
            .filter(|r| id_of(r) < 2)
            .order_by("id");
        let counted = request.count(None).unwrap();
        assert_eq!(counted, 5);
        assert_eq!(
            script.executed(),
            vec!["SELECT COUNT(*) row_count FROM (SELECT `t`.* FROM `t`) oq"]
        );
        assert_eq!(request.into_iter().count(), 2);
    }

    #[test]
    fn test_count_keeps_order_when_paged() {
        let script = Script::new().on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 1)])]);
        let request = SelectRequest::from_table(mysql(&script), "t").order_by("id");
        assert!(request.exists().unwrap());
        assert_eq!(
            script.last().as_deref(),
            Some("SELECT COUNT(*) row_count FROM (SELECT `t`.* FROM `t` ORDER BY id LIMIT 1) oq")
        );
    }

    #[test]
    fn test_mssql_count_drops_unpaged_order() {
        let script = Script::new().on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 7)])]);
        let adapter: Rc<dyn SqlAdapter> = Rc::new(MsSqlAdapter::new(Session::new(
            "default",
            InstanceConfig::new("mssql"),
            script.connector(),
        )));
        let request = SelectRequest::from_table(adapter, "users").order_by("name");
        assert_eq!(request.count(None).unwrap(), 7);
        assert_eq!(
            script.last().as_deref(),
            Some("SELECT COUNT(*) row_count FROM (SELECT \"users\".* FROM \"users\") oq")
        );
    }

    #[test]
    fn test_mssql_paging_near_i64_max() {
        let adapter: Rc<dyn SqlAdapter> = Rc::new(MsSqlAdapter::new(Session::new(
            "default",
            InstanceConfig::new("mssql"),
            Script::new().connector(),
        )));
        let sql = SelectRequest::from_table(adapter, "users")
            .number(i64::MAX)
            .from_offset(1)
            .sql()
            .unwrap();
        assert!(sql.ends_with(&format!("a.rownum BETWEEN 1 AND {}", i64::MAX)));
    }

    #[test]
    fn test_exists_on_empty_result() {
        let script = Script::new().on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 0)])]);
        let request = SelectRequest::from_table(mysql(&script), "t");
        assert!(!request.exists().unwrap());
    }

    #[test]
    fn test_object_on_no_rows_is_none() {
        let script = Script::new();
        let request = SelectRequest::from_table(mysql(&script), "t").and_where(("id", 9));
        assert!(request.object().unwrap().is_none());
        assert_eq!(
            script.last().as_deref(),
            Some("SELECT `t`.* FROM `t` WHERE `id` = 9 LIMIT 1")
        );
        assert!(request.objects().unwrap().is_empty());
    }

    #[test]
    fn test_object_rejected_by_filter_is_none() {
        let script = Script::new().on_query("", numbered(1));
        let request = SelectRequest::from_table(mysql(&script), "t").filter(|_| false);
        assert!(request.object().unwrap().is_none());
    }

    #[test]
    fn test_filtered_object_only_sees_first_row() {
        let script = Script::new().on_query("", numbered(4));
        let request = SelectRequest::from_table(mysql(&script), "t").filter(|r| id_of(r) > 1);
        assert!(request.object().unwrap().is_none());
        assert_eq!(script.last().as_deref(), Some("SELECT `t`.* FROM `t` LIMIT 1"));
    }

    #[test]
    fn test_run_follows_output_mode() {
        let script = Script::new().on_query("", numbered(3));
        let request = SelectRequest::from_table(mysql(&script), "t");
        assert!(matches!(request.run().unwrap(), Selection::Rows(rows) if rows.len() == 3));
        let request = request.as_array();
        assert!(matches!(request.run().unwrap(), Selection::Row(Some(_))));
        let request = request.output(OutputMode::SqlQuery);
        assert!(matches!(request.run().unwrap(), Selection::Sql(_)));
        assert_eq!(request.rows().unwrap().len(), 3);
    }

    #[test]
    fn test_identity_cache_across_runs() {
        let script = Script::new().on_query("", numbered(1));
        let adapter = mysql(&script);
        let repo = Rc::new(Repository::<Row>::new("t"));
        let a = repo.select(adapter.clone()).object().unwrap().unwrap();
        let b = repo.select(adapter.clone()).object().unwrap().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        let c = repo.select(adapter).disable_cache().object().unwrap().unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_mssql_paging_falls_back_to_request_id_field() {
        let adapter: Rc<dyn SqlAdapter> = Rc::new(MsSqlAdapter::new(Session::new(
            "default",
            InstanceConfig::new("mssql"),
            Script::new().connector(),
        )));
        let repo = Rc::new(Repository::<Row>::with_id_field("users", "user_id"));
        let sql = repo.select(adapter).number(3).sql().unwrap();
        assert!(sql.contains("ROW_NUMBER() OVER(ORDER BY user_id)"));
        assert!(sql.ends_with("a.rownum <= 3"));
    }
}
