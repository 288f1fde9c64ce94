//! The condition grammar shared by WHERE and HAVING.
//!
//! A condition is raw SQL, one comparison term, or a group of them:
//!
//! ```text
//! "id = 5"                          raw, used verbatim
//! ["id", 5]                         "id" = 5       (operator inferred)
//! ["id", [1, 2]]                    "id" IN (1,2)
//! ["id", ">", 5]                    "id" > 5
//! ["name", "=", "NOW()", false]     value not escaped
//! [["a", 1], ["b", 2]]              (("a" = 1) OR ("b" = 2))
//! [[["a", 1], ["b", 2]], ["c", 3]]  (("a" = 1 AND "b" = 2) OR ("c" = 3))
//! ```
use serde_json::Value as Json;

use crate::adapter::SqlAdapter;
use crate::error::{Result, SqlError};
use crate::value::Value;

/// One comparison: `identifier operator value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub identifier: String,
    /// Inferred from the value when unset: `IN` for lists, `=` otherwise.
    pub operator: Option<String>,
    pub value: Option<Value>,
    /// Escape the value as a literal. Lists are always escaped per item.
    pub escape: bool,
}

impl Term {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            operator: None,
            value: None,
            escape: true,
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Insert the value as SQL text instead of a quoted literal.
    pub fn unescaped(mut self) -> Self {
        self.escape = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Raw(String),
    Term(Term),
    /// Each item in parentheses, joined with `OR`, wrapped once more.
    Or(Vec<Condition>),
    /// Items joined with `AND`.
    And(Vec<Condition>),
}

impl Condition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw(sql.into())
    }

    /// `identifier = value`, or `identifier IN (...)` for a list.
    pub fn eq(identifier: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Term(Term::new(identifier).value(value))
    }

    pub fn compare(
        identifier: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Condition::Term(Term::new(identifier).operator(operator).value(value))
    }

    pub fn or(items: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or(items.into_iter().collect())
    }

    pub fn and(items: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And(items.into_iter().collect())
    }

    /// Render for `adapter`. Identifiers always go through its quoting rule.
    pub fn format<A: SqlAdapter + ?Sized>(&self, adapter: &A) -> Result<String> {
        match self {
            Condition::Raw(sql) => Ok(sql.clone()),
            Condition::Term(term) => format_term(adapter, term),
            Condition::Or(items) => {
                let parts = format_all(adapter, items, "OR")?;
                let parts: Vec<String> = parts.into_iter().map(|p| format!("({})", p)).collect();
                Ok(format!("({})", parts.join(" OR ")))
            }
            Condition::And(items) => Ok(format_all(adapter, items, "AND")?.join(" AND ")),
        }
    }
}

fn format_all<A: SqlAdapter + ?Sized>(
    adapter: &A,
    items: &[Condition],
    group: &str,
) -> Result<Vec<String>> {
    if items.is_empty() {
        return Err(SqlError::query_build(format!("Empty {} condition group", group)));
    }
    items.iter().map(|c| c.format(adapter)).collect()
}

fn format_term<A: SqlAdapter + ?Sized>(adapter: &A, term: &Term) -> Result<String> {
    if term.identifier.trim().is_empty() {
        return Err(SqlError::query_build("Condition identifier is empty"));
    }
    // A lone operator is the value, as in `["id", 5]`.
    let (operator, value) = match (&term.operator, &term.value) {
        (None, None) => return Ok(term.identifier.clone()),
        (Some(op), None) => (None, Value::Text(op.clone())),
        (op, Some(value)) => (op.clone(), value.clone()),
    };
    let operator = operator.unwrap_or_else(|| {
        String::from(if value.is_list() { "IN" } else { "=" })
    });
    let value = match &value {
        Value::List(items) => format!("({})", adapter.format_value_list(items)),
        other if term.escape => adapter.escape_value(other),
        other => other.display(),
    };
    Ok(format!(
        "{} {} {}",
        adapter.escape_identifier(&term.identifier),
        operator,
        value
    ))
}

impl From<&str> for Condition {
    fn from(sql: &str) -> Self {
        Condition::Raw(sql.to_string())
    }
}

impl From<String> for Condition {
    fn from(sql: String) -> Self {
        Condition::Raw(sql)
    }
}

impl From<Term> for Condition {
    fn from(term: Term) -> Self {
        Condition::Term(term)
    }
}

impl<V: Into<Value>> From<(&str, V)> for Condition {
    fn from((identifier, value): (&str, V)) -> Self {
        Condition::eq(identifier, value)
    }
}

impl<V: Into<Value>> From<(&str, &str, V)> for Condition {
    fn from((identifier, operator, value): (&str, &str, V)) -> Self {
        Condition::compare(identifier, operator, value)
    }
}

/// The positional list form.
impl TryFrom<Json> for Condition {
    type Error = SqlError;

    fn try_from(json: Json) -> Result<Self> {
        match json {
            Json::String(sql) => Ok(Condition::Raw(sql)),
            Json::Array(items) if items.is_empty() => {
                Err(SqlError::query_build("Empty condition list"))
            }
            Json::Array(items) if matches!(items[0], Json::Array(_)) => items
                .into_iter()
                .map(or_branch)
                .collect::<Result<Vec<_>>>()
                .map(Condition::Or),
            Json::Array(items) => positional(items),
            other => Err(SqlError::query_build(format!(
                "A condition must be a string or a list, got {}",
                other
            ))),
        }
    }
}

impl TryFrom<&str> for Term {
    type Error = SqlError;

    /// Parse a JSON positional term such as `["id", ">", 3]`.
    fn try_from(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text)
            .map_err(|e| SqlError::query_build(format!("Invalid condition JSON: {}", e)))?;
        match json {
            Json::Array(items) => match positional(items)? {
                Condition::Term(term) => Ok(term),
                _ => Err(SqlError::query_build("Expected a single condition term")),
            },
            _ => Err(SqlError::query_build("Expected a condition list")),
        }
    }
}

/// One branch of an OR: a term, raw SQL, or a list of terms joined with AND.
fn or_branch(json: Json) -> Result<Condition> {
    match json {
        Json::Array(items) if matches!(items.first(), Some(Json::Array(_))) => items
            .into_iter()
            .map(Condition::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Condition::And),
        other => Condition::try_from(other),
    }
}

fn positional(items: Vec<Json>) -> Result<Condition> {
    if items.len() > 4 {
        return Err(SqlError::query_build(format!(
            "A condition takes at most 4 arguments, got {}",
            items.len()
        )));
    }
    let mut args = items.into_iter();
    let identifier = match args.next() {
        Some(Json::String(s)) => s,
        Some(other) => {
            return Err(SqlError::query_build(format!(
                "Condition identifier must be a string, got {}",
                other
            )))
        }
        None => return Err(SqlError::query_build("Empty condition list")),
    };
    let second = args.next().unwrap_or(Json::Null);
    let third = args.next().unwrap_or(Json::Null);
    let escape = match args.next() {
        None | Some(Json::Null) => true,
        Some(Json::Bool(b)) => b,
        Some(other) => {
            return Err(SqlError::query_build(format!(
                "Condition escape flag must be a boolean, got {}",
                other
            )))
        }
    };

    let mut term = Term::new(identifier);
    term.escape = escape;
    match (second, third) {
        // without an operator the identifier is raw SQL
        (Json::Null, _) => {}
        (value, Json::Null) => term.value = Some(Value::from_json(&value)),
        (Json::String(op), value) => {
            term.operator = Some(op);
            term.value = Some(Value::from_json(&value));
        }
        (other, _) => {
            return Err(SqlError::query_build(format!(
                "Condition operator must be a string, got {}",
                other
            )))
        }
    }
    Ok(Condition::Term(term))
}
