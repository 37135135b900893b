//! Query execution boundary.
//!
//! The ingestion engine talks to storage only through [`QueryExecutor`].
//! Constraint failures are classified from SQLite extended result codes.

use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} constraint violated ({message})")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    #[error("store failure: {0}")]
    Other(String),
}

impl StoreError {
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            StoreError::Constraint { kind, .. } => Some(*kind),
            StoreError::Other(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, msg) = &e {
            if inner.code == ErrorCode::ConstraintViolation {
                let kind = match inner.extended_code {
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Some(ConstraintKind::Unique)
                    }
                    ffi::SQLITE_CONSTRAINT_NOTNULL => Some(ConstraintKind::NotNull),
                    ffi::SQLITE_CONSTRAINT_CHECK => Some(ConstraintKind::Check),
                    _ => None,
                };
                if let Some(kind) = kind {
                    return StoreError::Constraint {
                        kind,
                        message: msg.clone().unwrap_or_else(|| e.to_string()),
                    };
                }
            }
        }
        StoreError::Other(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executed {
    pub affected: usize,
    pub last_insert_id: i64,
}

pub type Row = Vec<Value>;

pub trait QueryExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Executed, StoreError>;
    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;
}

impl QueryExecutor for Connection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Executed, StoreError> {
        let affected = Connection::execute(self, sql, params_from_iter(params.iter()))?;
        Ok(Executed {
            affected,
            last_insert_id: self.last_insert_rowid(),
        })
    }

    fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |r| {
                (0..width)
                    .map(|i| r.get::<_, Value>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub fn value_i64(v: Option<&Value>) -> Option<i64> {
    match v {
        Some(Value::Integer(i)) => Some(*i),
        _ => None,
    }
}

pub fn value_text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::Text(s)) => Some(s.clone()),
        _ => None,
    }
}

pub fn opt_text(v: Option<String>) -> Value {
    v.map(Value::Text).unwrap_or(Value::Null)
}
