//! Connection abstraction for SQL Server.
//!
//! The [`Connection`] trait is the only thing the managers talk to, allowing
//! for different implementations:
//! - [`tds::TdsConnection`] for a live server (feature `tds`)
//! - [`memory::MemoryServer`] for tests and offline planning

pub mod memory;
#[cfg(feature = "tds")]
pub mod tds;

use crate::error::{Error, Result};

/// A synchronous handle to a SQL Server instance.
pub trait Connection: Send + Sync {
    /// Run a catalog read. `params` bind to `@P1..@Pn` in order.
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>>;

    /// Run a statement that returns no rows.
    fn execute(&self, sql: &str) -> Result<()>;
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL `NULL`
    Null,
    /// Any integer column
    Int(i64),
    /// Character data
    Text(String),
    /// Binary data (`varbinary`)
    Bytes(Vec<u8>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A result row with positional access.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Build a row from column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, idx: usize, query: &'static str) -> Result<&Value> {
        self.values.get(idx).ok_or_else(|| Error::Decode {
            query,
            message: format!("missing column {idx}"),
        })
    }

    /// Non-null text column.
    pub fn text(&self, idx: usize, query: &'static str) -> Result<String> {
        match self.get(idx, query)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(decode_mismatch(query, idx, "text", other)),
        }
    }

    /// Nullable text column.
    pub fn opt_text(&self, idx: usize, query: &'static str) -> Result<Option<String>> {
        match self.get(idx, query)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(decode_mismatch(query, idx, "text", other)),
        }
    }

    /// Non-null integer column.
    pub fn int(&self, idx: usize, query: &'static str) -> Result<i64> {
        match self.get(idx, query)? {
            Value::Int(n) => Ok(*n),
            other => Err(decode_mismatch(query, idx, "integer", other)),
        }
    }

    /// Non-null binary column.
    pub fn bytes(&self, idx: usize, query: &'static str) -> Result<Vec<u8>> {
        match self.get(idx, query)? {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(decode_mismatch(query, idx, "binary", other)),
        }
    }
}

fn decode_mismatch(query: &'static str, idx: usize, expected: &str, found: &Value) -> Error {
    Error::Decode {
        query,
        message: format!("column {idx}: expected {expected}, found {found:?}"),
    }
}
