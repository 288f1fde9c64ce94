//! Error taxonomy for the adapter layer.
//!
//! Configuration and build errors are raised before any I/O. Native driver
//! failures are wrapped exactly once, in `Session::execute_raw` or while
//! connecting, and only reachable afterwards through `Error::source`.
use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Categorized error types for native SQL failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Syntax errors (SQLSTATE class 42 - syntax_error, etc.)
    Syntax,
    /// Semantic errors (missing table/column, ambiguous reference)
    Semantic,
    /// Execution/runtime errors (division by zero, constraint violation)
    Execution,
    /// Transaction state errors (e.g., transaction aborted)
    Transaction,
    /// Connection/communication errors
    Connection,
    /// The configured database does not exist on the server
    UnknownDatabase,
    /// Unknown or unclassified errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::UnknownDatabase => write!(f, "Unknown Database"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

impl ErrorCategory {
    /// Classify from a SQLSTATE code and, when known, the vendor error code.
    pub fn classify(sqlstate: Option<&str>, vendor_code: Option<i64>) -> Self {
        // MySQL ER_BAD_DB_ERROR, SQL Server 4060 (cannot open database)
        if matches!(vendor_code, Some(1049) | Some(4060)) {
            return ErrorCategory::UnknownDatabase;
        }
        match sqlstate {
            Some(code) => categorize_sqlstate(code),
            None => ErrorCategory::Unknown,
        }
    }
}

/// Categorize a SQLSTATE code into an ErrorCategory.
fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    // 3D000 = invalid_catalog_name
    if code == "3D000" {
        return ErrorCategory::UnknownDatabase;
    }
    match &code[..2] {
        // 42601 = syntax_error; MySQL reports generic syntax errors as 42000
        "42" => {
            if code == "42601" || code == "42000" {
                ErrorCategory::Syntax
            } else {
                // 42P01 = undefined_table, 42S02, 42703 = undefined_column, etc.
                ErrorCategory::Semantic
            }
        }
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}

/// A failure reported by a native driver, before it is given query context.
#[derive(Debug)]
pub struct DriverError {
    pub message: String,
    pub sqlstate: Option<String>,
    pub vendor_code: Option<i64>,
    pub source: BoxError,
}

impl DriverError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            sqlstate: None,
            vendor_code: None,
            source,
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    pub fn with_vendor_code(mut self, code: i64) -> Self {
        self.vendor_code = Some(code);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::classify(self.sqlstate.as_deref(), self.vendor_code)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sqlstate {
            Some(state) => write!(f, "[{}] {}", state, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    /// Unknown instance, missing or unknown driver, unreadable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required option is missing or a condition is malformed.
    #[error("query build error: {0}")]
    QueryBuild(String),

    /// The native driver failed while connecting, executing or fetching.
    #[error("{category}: {message} (while {action})")]
    DriverExecution {
        message: String,
        action: String,
        category: ErrorCategory,
        #[source]
        source: BoxError,
    },
}

impl SqlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SqlError::Configuration(message.into())
    }

    pub fn query_build(message: impl Into<String>) -> Self {
        SqlError::QueryBuild(message.into())
    }

    /// Attach the attempted action (usually the query text) to a native failure.
    pub fn driver(err: DriverError, action: impl Into<String>) -> Self {
        let category = err.category();
        SqlError::DriverExecution {
            message: err.to_string(),
            action: action.into(),
            category,
            source: err.source,
        }
    }

    /// The action in progress when a driver failure happened.
    pub fn action(&self) -> Option<&str> {
        match self {
            SqlError::DriverExecution { action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            SqlError::DriverExecution { category, .. } => Some(*category),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SqlError::Configuration(_))
    }

    pub fn is_query_build(&self) -> bool {
        matches!(self, SqlError::QueryBuild(_))
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, SqlError::DriverExecution { .. })
    }
}

pub type Result<T> = std::result::Result<T, SqlError>;
