use chrono::{NaiveDate, NaiveTime};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, SslOpts};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::{block_on_runtime, DriverResult, NativeConnection, Statement, Unsupported};
use crate::config::{InstanceConfig, SslMode};
use crate::error::DriverError;
use crate::value::{Row, Value};

const DEFAULT_PORT: u16 = 3306;

pub struct MySqlConnection {
    runtime: Runtime,
    conn: Option<Conn>,
}

pub fn connect(config: &InstanceConfig) -> DriverResult<Box<dyn NativeConnection>> {
    let runtime = block_on_runtime()?;
    let conn = runtime
        .block_on(Conn::new(build_opts(config)))
        .map_err(mysql_error)?;
    debug!(target = %config.display_string(), "mysql connection established");
    Ok(Box::new(MySqlConnection {
        runtime,
        conn: Some(conn),
    }))
}

fn build_opts(config: &InstanceConfig) -> OptsBuilder {
    let mut opts = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port.unwrap_or(DEFAULT_PORT))
        .user(Some(config.user.clone()))
        .pass(Some(config.passwd.clone()))
        .init(vec!["SET NAMES utf8"]);
    if !config.dbname.is_empty() {
        opts = opts.db_name(Some(config.dbname.clone()));
    }
    match config.ssl_mode {
        SslMode::Disable => opts,
        SslMode::Prefer | SslMode::Require => opts.ssl_opts(
            SslOpts::default().with_danger_accept_invalid_certs(config.accept_invalid_certs),
        ),
        SslMode::VerifyFull => opts.ssl_opts(SslOpts::default()),
    }
}

fn closed() -> DriverError {
    // 08003 = connection_does_not_exist
    DriverError::new(Unsupported("connection already closed")).with_sqlstate("08003")
}

impl NativeConnection for MySqlConnection {
    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        let runtime = &self.runtime;
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        runtime.block_on(conn.query_drop(sql)).map_err(mysql_error)?;
        Ok(conn.affected_rows())
    }

    fn query(&mut self, sql: &str) -> DriverResult<Statement> {
        let runtime = &self.runtime;
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let rows: Vec<mysql_async::Row> = runtime.block_on(conn.query(sql)).map_err(mysql_error)?;
        Ok(Statement::new(rows.iter().map(convert_row).collect()))
    }
}

impl Drop for MySqlConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                warn!(error = %e, "mysql disconnect failed");
            }
        }
    }
}

fn mysql_error(err: mysql_async::Error) -> DriverError {
    match &err {
        mysql_async::Error::Server(server) => {
            let (code, state, message) =
                (server.code, server.state.clone(), server.message.clone());
            let mut driver_err = DriverError::new(err)
                .with_sqlstate(state)
                .with_vendor_code(i64::from(code));
            driver_err.message = message;
            driver_err
        }
        // 08001 = unable to establish connection
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => {
            DriverError::new(err).with_sqlstate("08001")
        }
        _ => DriverError::new(err),
    }
}

fn convert_row(row: &mysql_async::Row) -> Row {
    let names = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let values = (0..row.len())
        .map(|i| row.as_ref(i).map(convert_value).unwrap_or(Value::Null))
        .collect();
    Row::new(names, values)
}

fn convert_value(value: &mysql_async::Value) -> Value {
    use mysql_async::Value as My;
    match value {
        My::NULL => Value::Null,
        My::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => Value::Bytes(bytes.clone()),
        },
        My::Int(i) => Value::Int(*i),
        My::UInt(u) => Value::UInt(*u),
        My::Float(f) => Value::Float(f64::from(*f)),
        My::Double(d) => Value::Float(*d),
        My::Date(y, m, d, h, i, s, us) => {
            let date = NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*m), u32::from(*d));
            match date {
                Some(date) if (*h, *i, *s, *us) == (0, 0, 0, 0) => Value::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(u32::from(*h), u32::from(*i), u32::from(*s), *us)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null),
                // zero dates such as 0000-00-00
                None => Value::Text(format!("{:04}-{:02}-{:02}", y, m, d)),
            }
        }
        My::Time(negative, days, h, i, s, us) => {
            let time = if !negative && *days == 0 {
                NaiveTime::from_hms_micro_opt(u32::from(*h), u32::from(*i), u32::from(*s), *us)
            } else {
                None
            };
            time.map(Value::Time).unwrap_or_else(|| {
                let hours = u32::from(*h) + days * 24;
                let sign = if *negative { "-" } else { "" };
                Value::Text(format!("{}{:02}:{:02}:{:02}", sign, hours, i, s))
            })
        }
    }
}
