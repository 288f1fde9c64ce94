use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_native_tls::MakeTlsConnector;
use rust_decimal::Decimal;
use futures::StreamExt;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, RowStream};
use tracing::{debug, warn};

use super::{block_on_runtime, DriverResult, NativeConnection, RowSource, Statement};
use crate::config::{InstanceConfig, SslMode};
use crate::error::{BoxError, DriverError};
use crate::value::{Row, Value};

const DEFAULT_PORT: u16 = 5432;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct PostgresConnection {
    runtime: Rc<Runtime>,
    client: Client,
}

pub fn connect(config: &InstanceConfig) -> DriverResult<Box<dyn NativeConnection>> {
    let runtime = block_on_runtime()?;
    let client = runtime.block_on(create_client(config))?;
    debug!(target = %config.display_string(), "postgres connection established");
    Ok(Box::new(PostgresConnection {
        runtime: Rc::new(runtime),
        client,
    }))
}

impl NativeConnection for PostgresConnection {
    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        self.runtime
            .block_on(self.client.execute(sql, &[]))
            .map_err(pg_error)
    }

    fn query(&mut self, sql: &str) -> DriverResult<Statement> {
        let stream = self
            .runtime
            .block_on(self.client.query_raw(sql, std::iter::empty::<&dyn ToSql>()))
            .map_err(pg_error)?;
        Ok(Statement::streaming(PgRows {
            runtime: self.runtime.clone(),
            stream: Box::pin(stream),
        }))
    }

    fn batch(&mut self, sql: &str) -> DriverResult<()> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .map_err(pg_error)
    }
}

/// An open portal; each fetch waits for the next row from the server.
struct PgRows {
    runtime: Rc<Runtime>,
    stream: Pin<Box<RowStream>>,
}

impl RowSource for PgRows {
    fn next_row(&mut self) -> DriverResult<Option<Row>> {
        match self.runtime.block_on(self.stream.next()) {
            Some(row) => row.map(|r| Some(convert_row(&r))).map_err(pg_error),
            None => Ok(None),
        }
    }
}

fn connection_string(config: &InstanceConfig) -> String {
    let sslmode = match config.ssl_mode {
        SslMode::Disable => "disable",
        SslMode::Prefer => "prefer",
        SslMode::Require | SslMode::VerifyFull => "require",
    };
    format!(
        "host={} port={} dbname={} user={} password={} sslmode={} connect_timeout=10",
        quote_conn_value(&config.host),
        config.port.unwrap_or(DEFAULT_PORT),
        quote_conn_value(&config.dbname),
        quote_conn_value(&config.user),
        quote_conn_value(&config.passwd),
        sslmode
    )
}

/// Quote a value for use in a libpq key=value connection string.
fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

async fn create_client(config: &InstanceConfig) -> DriverResult<Client> {
    let conn_string = connection_string(config);

    let client = match config.ssl_mode {
        SslMode::Disable => {
            let (client, connection) =
                tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, NoTls))
                    .await
                    .map_err(DriverError::new)?
                    .map_err(pg_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection closed");
                }
            });
            client
        }
        mode => {
            let tls = build_tls_connector(config, mode == SslMode::VerifyFull)?;
            let (client, connection) =
                tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, tls))
                    .await
                    .map_err(DriverError::new)?
                    .map_err(pg_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection closed");
                }
            });
            client
        }
    };

    Ok(client)
}

fn build_tls_connector(config: &InstanceConfig, strict_verify: bool) -> DriverResult<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.accept_invalid_certs && !strict_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path).map_err(DriverError::new)?;
        let cert = native_tls::Certificate::from_pem(&pem).map_err(DriverError::new)?;
        builder.add_root_certificate(cert);
    }

    let connector = builder.build().map_err(DriverError::new)?;
    Ok(MakeTlsConnector::new(connector))
}

fn pg_error(err: tokio_postgres::Error) -> DriverError {
    let state = err.code().map(|c| c.code().to_string());
    let message = err
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| err.to_string());
    let closed = err.is_closed();
    let mut driver_err = DriverError::new(err);
    driver_err.message = message;
    match state {
        Some(state) => driver_err.with_sqlstate(state),
        // 08006 = connection_failure
        None if closed => driver_err.with_sqlstate("08006"),
        None => driver_err,
    }
}

fn convert_row(row: &tokio_postgres::Row) -> Row {
    let columns = row.columns();
    let names = columns.iter().map(|c| c.name().to_string()).collect();
    let values = columns
        .iter()
        .enumerate()
        .map(|(idx, col)| extract_value(row, idx, col.type_()))
        .collect();
    Row::new(names, values)
}

fn extract_value(row: &tokio_postgres::Row, idx: usize, pg_type: &Type) -> Value {
    fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> Option<T> {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx).map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx).map(Value::from),
        Type::INT4 => get::<i32>(row, idx).map(Value::from),
        Type::INT8 => get::<i64>(row, idx).map(Value::Int),
        Type::OID => get::<u32>(row, idx).map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx).map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx).map(Value::Float),
        Type::NUMERIC => numeric(row, idx),
        Type::TEXT | Type::VARCHAR | Type::NAME | Type::CHAR | Type::BPCHAR => {
            get::<String>(row, idx).map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        Type::DATE => get::<NaiveDate>(row, idx).map(Value::Date),
        Type::TIME => get::<NaiveTime>(row, idx).map(Value::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(Value::DateTime),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(|dt| Value::DateTime(dt.naive_utc())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx).map(Value::Json),
        _ => get::<PgRaw>(row, idx).map(|raw| match String::from_utf8(raw.0) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        }),
    };
    value.unwrap_or(Value::Null)
}

/// Wire bytes of a type with no dedicated decoding (enums, citext, ...).
struct PgRaw(Vec<u8>);

impl<'a> FromSql<'a> for PgRaw {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(PgRaw(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// NUMERIC as exact decimal text. Values `Decimal` cannot hold come back
/// as their special spelling, or NULL with a warning.
fn numeric(row: &tokio_postgres::Row, idx: usize) -> Option<Value> {
    match row.try_get::<_, Option<Decimal>>(idx) {
        Ok(value) => value.map(|d| Value::Text(d.to_string())),
        Err(e) => match row.try_get::<_, Option<PgRaw>>(idx).ok().flatten() {
            Some(raw) => special_numeric(&raw.0).map(Value::from).or_else(|| {
                warn!(column = idx, error = %e, "numeric out of range");
                None
            }),
            None => None,
        },
    }
}

/// NaN and the infinities are flagged in the sign word of the header.
fn special_numeric(raw: &[u8]) -> Option<&'static str> {
    match raw.get(4..6)? {
        [0xC0, 0x00] => Some("NaN"),
        [0xD0, 0x00] => Some("Infinity"),
        [0xF0, 0x00] => Some("-Infinity"),
        _ => None,
    }
}
