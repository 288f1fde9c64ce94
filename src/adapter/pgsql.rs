use super::{
    assignment_list, hex, having_clause, insert_values, is_derived, join_clause, non_empty,
    require_fields, require_table, select_fields, where_clause, Fields, QueryOptions, Session,
    SqlAdapter,
};
use crate::error::{Result, SqlError};

/// PostgreSQL dialect.
pub struct PgSqlAdapter {
    session: Session,
}

impl PgSqlAdapter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl SqlAdapter for PgSqlAdapter {
    fn session(&self) -> &Session {
        &self.session
    }

    fn driver(&self) -> &'static str {
        "pgsql"
    }

    fn escape_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn format_bool(&self, b: bool) -> String {
        String::from(if b { "TRUE" } else { "FALSE" })
    }

    fn format_bytes(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'", hex(bytes))
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

        let mut parts = vec![String::from("SELECT")];
        if QueryOptions::flag(options.distinct) {
            parts.push("DISTINCT".into());
        }
        parts.push(what);
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
        if let Some(order_by) = non_empty(&options.order_by) {
            parts.push(format!("ORDER BY {}", order_by));
        }
        if let Some((count, offset)) = options.paging() {
            parts.push(format!("LIMIT {}", count));
            if offset > 0 {
                parts.push(format!("OFFSET {}", offset));
            }
        }

        Ok(parts.join(" "))
    }

    fn render_update(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;

        let mut parts = vec![String::from("UPDATE")];
        if QueryOptions::flag(options.only) {
            parts.push("ONLY".into());
        }
        parts.push(self.escape_identifier(table));
        parts.push("SET".into());
        parts.push(assignment_list(self, fields)?);
        parts.extend(where_clause(&options.conditions));

        Ok(parts.join(" "))
    }

    fn render_insert(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;

        let mut parts = vec![
            String::from("INSERT INTO"),
            self.escape_identifier(table),
        ];
        let rows = match fields {
            Fields::Raw(raw) => {
                parts.push(raw.clone());
                return Ok(parts.join(" "));
            }
            Fields::Assign(pairs) => insert_values(self, std::slice::from_ref(pairs))?,
            Fields::Rows(rows) => insert_values(self, rows)?,
            Fields::List(_) => {
                return Err(SqlError::query_build(
                    "Insert needs column values, not a field list",
                ))
            }
        };
        parts.push(rows.0);
        parts.push(rows.1);

        Ok(parts.join(" "))
    }

    fn render_delete(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;

        let mut parts = vec![String::from("DELETE FROM")];
        if QueryOptions::flag(options.only) {
            parts.push("ONLY".into());
        }
        parts.push(self.escape_identifier(table));
        parts.extend(where_clause(&options.conditions));

        Ok(parts.join(" "))
    }

    fn last_insert_id_sql(&self, table: &str, id_field: &str) -> String {
        format!(
            "SELECT currval(pg_get_serial_sequence({}, {}))",
            self.format_string(table),
            self.format_string(id_field)
        )
    }
}
