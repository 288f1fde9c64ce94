use super::{
    assignment_list, having_clause, insert_values, is_derived, join_clause, non_empty,
    require_fields, require_table, select_fields, where_clause, Fields, QueryOptions, Session,
    SqlAdapter,
};
use crate::error::{Result, SqlError};

/// MySQL dialect: backtick identifiers and `LIMIT offset,count` paging.
pub struct MySqlAdapter {
    session: Session,
}

impl MySqlAdapter {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn limit_clause(options: &QueryOptions) -> Option<String> {
        options.paging().map(|(count, offset)| {
            if offset > 0 {
                format!("LIMIT {},{}", offset, count)
            } else {
                format!("LIMIT {}", count)
            }
        })
    }

    /// Single-table UPDATE and DELETE accept a row count but no offset.
    fn row_count_clause(options: &QueryOptions) -> Option<String> {
        options.paging().map(|(count, _)| format!("LIMIT {}", count))
    }
}

impl SqlAdapter for MySqlAdapter {
    fn session(&self) -> &Session {
        &self.session
    }

    fn driver(&self) -> &'static str {
        "mysql"
    }

    fn escape_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn format_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
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
        parts.extend(Self::limit_clause(options));

        Ok(parts.join(" "))
    }

    fn render_update(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;

        let mut parts = vec![String::from("UPDATE")];
        if QueryOptions::flag(options.low_priority) {
            parts.push("LOW_PRIORITY".into());
        }
        if QueryOptions::flag(options.ignore) {
            parts.push("IGNORE".into());
        }
        parts.push(self.escape_identifier(table));
        parts.push("SET".into());
        parts.push(assignment_list(self, fields)?);
        parts.extend(where_clause(&options.conditions));
        if let Some(order_by) = non_empty(&options.order_by) {
            parts.push(format!("ORDER BY {}", order_by));
        }
        parts.extend(Self::row_count_clause(options));

        Ok(parts.join(" "))
    }

    fn render_insert(&self, options: &QueryOptions) -> Result<String> {
        let table = require_table(options)?;
        let fields = require_fields(options)?;

        let mut parts = vec![String::from("INSERT")];
        if QueryOptions::flag(options.low_priority) {
            parts.push("LOW_PRIORITY".into());
        } else if QueryOptions::flag(options.delayed) {
            parts.push("DELAYED".into());
        }
        if QueryOptions::flag(options.ignore) {
            parts.push("IGNORE".into());
        }
        if QueryOptions::flag(options.into) {
            parts.push("INTO".into());
        }
        parts.push(self.escape_identifier(table));
        match fields {
            Fields::Raw(raw) => parts.push(raw.clone()),
            Fields::Assign(pairs) => parts.push(format!("SET {}", self.format_field_list(pairs))),
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

        let mut parts = vec![String::from("DELETE")];
        if QueryOptions::flag(options.low_priority) {
            parts.push("LOW_PRIORITY".into());
        }
        if QueryOptions::flag(options.quick) {
            parts.push("QUICK".into());
        }
        if QueryOptions::flag(options.ignore) {
            parts.push("IGNORE".into());
        }
        parts.push("FROM".into());
        parts.push(self.escape_identifier(table));
        parts.extend(where_clause(&options.conditions));
        if let Some(order_by) = non_empty(&options.order_by) {
            parts.push(format!("ORDER BY {}", order_by));
        }
        parts.extend(Self::row_count_clause(options));

        Ok(parts.join(" "))
    }

    fn last_insert_id_sql(&self, _table: &str, _id_field: &str) -> String {
        String::from("SELECT LAST_INSERT_ID()")
    }
}
