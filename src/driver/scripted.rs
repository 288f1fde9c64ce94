use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use super::{Connector, DriverResult, NativeConnection, Statement};
use crate::config::InstanceConfig;
use crate::error::DriverError;
use crate::value::Row;

/// Canned responses keyed on SQL fragments, for tests and dry runs.
///
/// Rules are checked in the order they were added; the first whose pattern
/// occurs in the statement text answers it. An empty pattern matches every
/// statement. Unmatched queries return no rows and unmatched commands
/// affect no rows. Every statement is recorded.
#[derive(Clone, Default)]
pub struct Script {
    state: Rc<ScriptState>,
}

#[derive(Default)]
struct ScriptState {
    rules: RefCell<Vec<Rule>>,
    log: RefCell<Vec<String>>,
    connects: Cell<usize>,
    connect_failure: RefCell<Option<String>>,
}

struct Rule {
    pattern: String,
    response: Response,
}

enum Response {
    Rows(Vec<Row>),
    Affected(u64),
    Fail {
        message: String,
        sqlstate: Option<String>,
    },
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(self, pattern: impl Into<String>, response: Response) -> Self {
        self.state.rules.borrow_mut().push(Rule {
            pattern: pattern.into(),
            response,
        });
        self
    }

    /// Answer statements containing `pattern` with `rows`.
    pub fn on_query(self, pattern: impl Into<String>, rows: Vec<Row>) -> Self {
        self.rule(pattern, Response::Rows(rows))
    }

    /// Report `affected` rows for commands containing `pattern`.
    pub fn on_execute(self, pattern: impl Into<String>, affected: u64) -> Self {
        self.rule(pattern, Response::Affected(affected))
    }

    /// Fail statements containing `pattern`.
    pub fn fail_on(self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rule(
            pattern,
            Response::Fail {
                message: message.into(),
                sqlstate: None,
            },
        )
    }

    pub fn fail_on_with_state(
        self,
        pattern: impl Into<String>,
        sqlstate: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.rule(
            pattern,
            Response::Fail {
                message: message.into(),
                sqlstate: Some(sqlstate.into()),
            },
        )
    }

    /// Make every connection attempt fail.
    pub fn fail_connect(self, message: impl Into<String>) -> Self {
        *self.state.connect_failure.borrow_mut() = Some(message.into());
        self
    }

    /// Statements run so far, oldest first.
    pub fn executed(&self) -> Vec<String> {
        self.state.log.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.state.log.borrow().last().cloned()
    }

    pub fn clear_log(&self) {
        self.state.log.borrow_mut().clear();
    }

    /// Number of connections opened through `connector`.
    pub fn connects(&self) -> usize {
        self.state.connects.get()
    }

    pub fn connector(&self) -> Connector {
        let script = self.clone();
        Box::new(move |config: &InstanceConfig| {
            if let Some(message) = script.state.connect_failure.borrow().as_ref() {
                return Err(DriverError::new(message.clone()).with_sqlstate("08001"));
            }
            script.state.connects.set(script.state.connects.get() + 1);
            trace!(target = %config.display_string(), "scripted connection opened");
            Ok(Box::new(ScriptedConnection {
                script: script.clone(),
            }) as Box<dyn NativeConnection>)
        })
    }

    fn respond(&self, sql: &str) -> DriverResult<Option<Answer>> {
        self.state.log.borrow_mut().push(sql.to_string());
        let rules = self.state.rules.borrow();
        let Some(rule) = rules.iter().find(|r| sql.contains(r.pattern.as_str())) else {
            return Ok(None);
        };
        match &rule.response {
            Response::Rows(rows) => Ok(Some(Answer::Rows(rows.clone()))),
            Response::Affected(n) => Ok(Some(Answer::Affected(*n))),
            Response::Fail { message, sqlstate } => {
                let err = DriverError::new(message.clone());
                Err(match sqlstate {
                    Some(state) => err.with_sqlstate(state.clone()),
                    None => err,
                })
            }
        }
    }
}

enum Answer {
    Rows(Vec<Row>),
    Affected(u64),
}

/// A connection answering from a `Script`.
pub struct ScriptedConnection {
    script: Script,
}

impl ScriptedConnection {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

impl NativeConnection for ScriptedConnection {
    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        Ok(match self.script.respond(sql)? {
            Some(Answer::Affected(n)) => n,
            Some(Answer::Rows(rows)) => rows.len() as u64,
            None => 0,
        })
    }

    fn query(&mut self, sql: &str) -> DriverResult<Statement> {
        Ok(match self.script.respond(sql)? {
            Some(Answer::Rows(rows)) => Statement::new(rows),
            Some(Answer::Affected(_)) | None => Statement::empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let script = Script::new()
            .on_query("COUNT(*)", vec![Row::from_pairs([("row_count", 3)])])
            .on_query("", vec![Row::from_pairs([("id", 1)]), Row::from_pairs([("id", 2)])]);
        let mut conn = ScriptedConnection::new(script.clone());
        assert_eq!(conn.query("SELECT COUNT(*) row_count FROM t").unwrap().remaining(), 1);
        assert_eq!(conn.query("SELECT * FROM t").unwrap().remaining(), 2);
        assert_eq!(script.executed().len(), 2);
    }

    #[test]
    fn test_failures_carry_sqlstate() {
        let script = Script::new().fail_on_with_state("missing", "42S02", "no such table");
        let mut conn = ScriptedConnection::new(script);
        let err = conn.execute("DELETE FROM missing").unwrap_err();
        assert_eq!(err.sqlstate.as_deref(), Some("42S02"));
        assert_eq!(err.message, "no such table");
    }

    #[test]
    fn test_connector_counts_and_fails() {
        let script = Script::new();
        let connector = script.connector();
        assert!(connector(&InstanceConfig::new("mysql")).is_ok());
        assert_eq!(script.connects(), 1);

        let failing = Script::new().fail_connect("refused");
        assert!((failing.connector())(&InstanceConfig::new("mysql")).is_err());
        assert_eq!(failing.connects(), 0);
    }
}
