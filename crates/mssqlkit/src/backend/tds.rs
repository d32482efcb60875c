//! Live server connections over TDS using `tiberius`.
//!
//! The driver is async; [`TdsConnection`] owns a current-thread runtime and
//! blocks on it so the rest of the crate stays synchronous. Calls are
//! serialised through a mutex around the single client.

use crate::backend::{Connection, Row, Value};
use crate::error::{Error, Result};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tiberius::{AuthMethod, Client, ColumnData, Config, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Where and how to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectSettings {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// SQL authentication user
    pub username: String,
    /// SQL authentication password
    pub password: String,
    /// Accept the server certificate without validation
    pub trust_cert: bool,
}

impl ConnectSettings {
    /// Settings for `host` on the default port.
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            username: username.to_string(),
            password: password.to_string(),
            trust_cert: false,
        }
    }
}

impl fmt::Debug for ConnectSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

/// A blocking connection to a live SQL Server instance.
pub struct TdsConnection {
    runtime: Runtime,
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl TdsConnection {
    /// Open a connection to the `master` database.
    pub fn connect(settings: &ConnectSettings) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Connection {
                message: format!("failed to start runtime: {e}"),
            })?;

        let mut config = Config::new();
        config.host(&settings.host);
        config.port(settings.port);
        config.database("master");
        config.application_name(env!("CARGO_PKG_NAME"));
        config.authentication(AuthMethod::sql_server(&settings.username, &settings.password));
        if settings.trust_cert {
            config.trust_cert();
        }

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| Error::Connection {
                    message: format!("{}:{}: {e}", settings.host, settings.port),
                })?;
            tcp.set_nodelay(true).map_err(|e| Error::Connection {
                message: e.to_string(),
            })?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(Error::from)
        })?;

        log::debug!("Connected to {}:{}", settings.host, settings.port);
        Ok(Self {
            runtime,
            client: Mutex::new(client),
        })
    }
}

impl Connection for TdsConnection {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let rows = self.runtime.block_on(async {
            client.query(sql, &params).await?.into_first_result().await
        })?;

        Ok(rows
            .into_iter()
            .map(|row| Row::new(row.into_iter().map(convert_value).collect()))
            .collect())
    }

    fn execute(&self, sql: &str) -> Result<()> {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        self.runtime
            .block_on(async { client.simple_query(sql).await?.into_results().await })?;
        Ok(())
    }
}

fn convert_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I16(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I32(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I64(v) => v.map_or(Value::Null, Value::Int),
        ColumnData::Bit(v) => v.map_or(Value::Null, |b| Value::Int(i64::from(b))),
        ColumnData::String(v) => v.map_or(Value::Null, |s| Value::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map_or(Value::Null, |b| Value::Bytes(b.into_owned())),
        // Not read by any catalog query; keep something printable.
        other => Value::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value(ColumnData::I16(Some(57))), Value::Int(57));
        assert_eq!(convert_value(ColumnData::I32(None)), Value::Null);
        assert_eq!(
            convert_value(ColumnData::String(Some(Cow::Borrowed("MULTI_USER")))),
            Value::Text("MULTI_USER".to_string())
        );
        assert_eq!(
            convert_value(ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            Value::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_settings_debug_hides_password() {
        let settings = ConnectSettings::new("db01", "sa", "hunter2");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert_eq!(settings.port, DEFAULT_PORT);
    }
}
