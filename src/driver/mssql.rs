use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::{block_on_runtime, DriverResult, NativeConnection, Statement};
use crate::config::{InstanceConfig, SslMode};
use crate::error::DriverError;
use crate::value::{Row, Value};

const DEFAULT_PORT: u16 = 1433;

type MsClient = Client<Compat<TcpStream>>;

pub struct MsSqlConnection {
    runtime: Runtime,
    client: MsClient,
}

pub fn connect(config: &InstanceConfig) -> DriverResult<Box<dyn NativeConnection>> {
    let runtime = block_on_runtime()?;
    let client = runtime.block_on(create_client(config))?;
    debug!(target = %config.display_string(), "sql server connection established");
    Ok(Box::new(MsSqlConnection { runtime, client }))
}

async fn create_client(config: &InstanceConfig) -> DriverResult<MsClient> {
    let mut ms = Config::new();
    ms.host(&config.host);
    ms.port(config.port.unwrap_or(DEFAULT_PORT));
    if !config.dbname.is_empty() {
        ms.database(&config.dbname);
    }
    ms.authentication(AuthMethod::sql_server(&config.user, &config.passwd));
    ms.encryption(match config.ssl_mode {
        SslMode::Disable => EncryptionLevel::NotSupported,
        SslMode::Prefer => EncryptionLevel::Off,
        SslMode::Require | SslMode::VerifyFull => EncryptionLevel::Required,
    });
    if let Some(ca_path) = &config.ca_cert_path {
        ms.trust_cert_ca(ca_path);
    } else if config.accept_invalid_certs && config.ssl_mode != SslMode::VerifyFull {
        ms.trust_cert();
    }

    let tcp = TcpStream::connect(ms.get_addr())
        .await
        .map_err(|e| DriverError::new(e).with_sqlstate("08001"))?;
    tcp.set_nodelay(true)
        .map_err(|e| DriverError::new(e).with_sqlstate("08001"))?;
    Client::connect(ms, tcp.compat_write())
        .await
        .map_err(mssql_error)
}

impl NativeConnection for MsSqlConnection {
    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        let client = &mut self.client;
        self.runtime
            .block_on(async move { client.execute(sql, &[]).await.map(|r| r.total()) })
            .map_err(mssql_error)
    }

    fn query(&mut self, sql: &str) -> DriverResult<Statement> {
        let client = &mut self.client;
        let rows = self
            .runtime
            .block_on(async move { client.simple_query(sql).await?.into_first_result().await })
            .map_err(mssql_error)?;
        Ok(Statement::new(rows.into_iter().map(convert_row).collect()))
    }

    fn batch(&mut self, sql: &str) -> DriverResult<()> {
        let client = &mut self.client;
        self.runtime
            .block_on(async move { client.simple_query(sql).await?.into_results().await })
            .map(|_| ())
            .map_err(mssql_error)
    }
}

fn mssql_error(err: tiberius::error::Error) -> DriverError {
    match &err {
        tiberius::error::Error::Server(token) => {
            let code = token.code();
            let message = token.message().to_string();
            let mut driver_err = DriverError::new(err).with_vendor_code(i64::from(code));
            driver_err.message = message;
            match sqlstate_for(code) {
                Some(state) => driver_err.with_sqlstate(state),
                None => driver_err,
            }
        }
        tiberius::error::Error::Io { .. }
        | tiberius::error::Error::Tls(_)
        | tiberius::error::Error::Routing { .. } => DriverError::new(err).with_sqlstate("08001"),
        _ => DriverError::new(err),
    }
}

/// SQL Server reports only native error numbers; map the common ones to
/// their SQLSTATE class.
fn sqlstate_for(code: u32) -> Option<&'static str> {
    let state = match code {
        102 | 105 | 156 | 170 => "42000",
        207 => "42S22",
        208 => "42S02",
        209 => "42702",
        515 | 547 | 2601 | 2627 => "23000",
        8134 => "22012",
        1205 => "40001",
        3902 | 3903 => "25000",
        _ => return None,
    };
    Some(state)
}

fn convert_row(row: tiberius::Row) -> Row {
    let names = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = row.into_iter().map(|cell| convert_cell(&cell)).collect();
    Row::new(names, values)
}

fn convert_cell(cell: &ColumnData<'static>) -> Value {
    let value = match cell {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(Value::from),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::Text(s.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::Text(g.to_string())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| Value::Text(n.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(cell).ok().flatten().map(Value::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(cell).ok().flatten().map(Value::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(cell).ok().flatten().map(Value::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(cell)
            .ok()
            .flatten()
            .map(|dt| Value::DateTime(dt.naive_utc())),
        other => Some(Value::Text(format!("{:?}", other))),
    };
    value.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_convert_cells() {
        assert_eq!(convert_cell(&ColumnData::I32(Some(7))), Value::Int(7));
        assert_eq!(convert_cell(&ColumnData::I32(None)), Value::Null);
        assert_eq!(convert_cell(&ColumnData::Bit(Some(true))), Value::Bool(true));
        assert_eq!(
            convert_cell(&ColumnData::String(Some(Cow::Owned("ann".to_string())))),
            Value::Text("ann".into())
        );
    }

    #[test]
    fn test_native_codes_map_to_sqlstate() {
        assert_eq!(sqlstate_for(208), Some("42S02"));
        assert_eq!(sqlstate_for(2627), Some("23000"));
        assert_eq!(sqlstate_for(50000), None);
    }
}
