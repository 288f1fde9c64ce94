use super::{
    assignment_list, hex, having_clause, insert_values, is_derived, join_clause, non_empty,
    require_fields, require_table, rownum_bound, select_fields, where_clause, Fields,
    QueryOptions, Session, SqlAdapter,
};
use crate::error::{Result, SqlError};

/// SQL Server dialect. There is no OFFSET clause, so paged queries number
/// their rows with `ROW_NUMBER()` inside a derived table or CTE.
pub struct MsSqlAdapter {
    session: Session,
}

impl MsSqlAdapter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// `ORDER BY` used for row numbering. Falls back to the id field so
    /// paging stays deterministic.
    fn row_order(&self, options: &QueryOptions) -> String {
        match non_empty(&options.order_by) {
            Some(order_by) => format!("ORDER BY {}", order_by),
            None => {
                let id_field = non_empty(&options.id_field)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.session.default_id_field());
                format!("ORDER BY {}", id_field)
            }
        }
    }

    /// `WITH a AS (...)` over the filtered table, shared by paged update and delete.
    fn numbered_cte(&self, options: &QueryOptions, table: &str) -> String {
        let mut inner = vec![
            format!("SELECT *, ROW_NUMBER() OVER({}) AS rownum", self.row_order(options)),
            "FROM".to_string(),
            self.escape_identifier(table),
        ];
        inner.extend(where_clause(&options.conditions));
        format!("WITH a AS ({})", inner.join(" "))
    }
}

impl SqlAdapter for MsSqlAdapter {
    fn session(&self) -> &Session {
        &self.session
    }

    fn driver(&self) -> &'static str {
        "mssql"
    }

    fn format_bytes(&self, bytes: &[u8]) -> String {
        format!("0x{}", hex(bytes))
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }

    fn render_select(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let derived = is_derived(table);
        let table_sql = if derived {
            table.to_string()
        } else {
            self.escape_identifier(table)
        };
        let what = select_fields(options, &table_sql, derived)?;
        let paging = options.paging();

        let mut parts = vec![String::from("SELECT")];
        if QueryOptions::flag(options.distinct) {
            parts.push("DISTINCT".into());
        }
        if paging.is_some() {
            parts.push(format!(
                "{}, ROW_NUMBER() OVER({}) AS rownum",
                what,
                self.row_order(options)
            ));
        } else {
            parts.push(what);
        }
        parts.push("FROM".into());
        parts.push(table_sql);
        if let Some(alias) = non_empty(&options.alias) {
            parts.push(alias.to_string());
        }
        parts.extend(join_clause(self, &options.joins));
        parts.extend(where_clause(&options.conditions));
        if let Some(group_by) = non_empty(&options.group_by) {
            parts.push(format!("GROUP BY {}", group_by));
        }
        parts.extend(having_clause(&options.having));

        match paging {
            Some((count, offset)) => Ok(format!(
                "SELECT * FROM ({}) AS a WHERE a.rownum {}",
                parts.join(" "),
                rownum_bound(count, offset)
            )),
            None => {
                if let Some(order_by) = non_empty(&options.order_by) {
                    parts.push(format!("ORDER BY {}", order_by));
                }
                Ok(parts.join(" "))
            }
        }
    }

    fn render_update(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;
        let assignments = assignment_list(self, fields)?;

        match options.paging() {
            Some((count, offset)) => Ok(format!(
                "{} UPDATE a SET {} WHERE a.rownum {}",
                self.numbered_cte(options, table),
                assignments,
                rownum_bound(count, offset)
            )),
            None => {
                let mut parts = vec![
                    String::from("UPDATE"),
                    self.escape_identifier(table),
                    "SET".into(),
                    assignments,
                ];
                parts.extend(where_clause(&options.conditions));
                Ok(parts.join(" "))
            }
        }
    }

    fn render_insert(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;

        let mut parts = vec![String::from("INSERT")];
        if QueryOptions::flag(options.into) {
            parts.push("INTO".into());
        }
        parts.push(self.escape_identifier(table));
        match fields {
            Fields::Raw(raw) => parts.push(raw.clone()),
            Fields::Assign(pairs) => {
                let (columns, values) = insert_values(self, std::slice::from_ref(pairs))?;
                parts.push(columns);
                parts.push(values);
            }
            Fields::Rows(rows) => {
                let (columns, values) = insert_values(self, rows)?;
                parts.push(columns);
                parts.push(values);
            }
            Fields::List(_) => {
                return Err(SqlError::query_build(
                    "Insert needs column values, not a field list",
                ))
            }
        }

        Ok(parts.join(" "))
    }

    fn render_delete(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;

        match options.paging() {
            Some((count, offset)) => Ok(format!(
                "{} DELETE FROM a WHERE a.rownum {}",
                self.numbered_cte(options, table),
                rownum_bound(count, offset)
            )),
            None => {
                let mut parts = vec![String::from("DELETE FROM"), self.escape_identifier(table)];
                parts.extend(where_clause(&options.conditions));
                Ok(parts.join(" "))
            }
        }
    }

    fn last_insert_id_sql(&self, _table: &str, _id_field: &str) -> String {
        String::from("SELECT SCOPE_IDENTITY() AS LAST_ID")
    }
}
