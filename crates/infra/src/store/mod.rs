//! Row-filtered store client.
//!
//! The backend executes single-table statements and applies its own row-level
//! authorization filter to every write. A write the filter rejects is not an
//! error: it simply matches zero rows. Every write therefore reports the number
//! of rows it touched, and callers are expected to check it.
//!
//! ## Backends
//!
//! - [`InMemoryBackend`]: tests/dev. Emulates row policies, foreign-key
//!   cascades and atomic stored procedures; supports fault injection.
//! - [`PostgrestStore`]: a PostgREST-compatible HTTP API (production).

pub mod filter;
pub mod memory;
pub mod postgrest;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use filter::{Condition, Direction, Filter, Order};
pub use memory::{Actor, InMemoryBackend, InMemorySession, StoreOp, TableSpec, WritePolicy};
pub use postgrest::PostgrestStore;

/// One row, keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// Rows returned by an insert (the persisted representation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub rows: Vec<Row>,
}

/// Result of a filtered update.
///
/// `affected == 0` means the filter matched nothing the caller may modify; the
/// backend does not say which.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub rows: Vec<Row>,
    pub affected: u64,
}

/// Result of a filtered delete (exact count).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub affected: u64,
}

/// Store operation error.
///
/// These are **infrastructure errors** as reported by the backend. The managers
/// classify them into [`crate::CollabError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The table has not been provisioned.
    #[error("relation \"{0}\" does not exist")]
    UndefinedTable(String),

    /// The stored procedure has not been provisioned.
    #[error("procedure \"{0}\" does not exist")]
    UndefinedProcedure(String),

    /// Unique/foreign-key/check constraint violation.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// An insert was refused by the row-level policy.
    #[error("row-level policy rejected the write: {0}")]
    PolicyViolation(String),

    /// Any other error reported by the backend.
    #[error("backend error {code}: {message}")]
    Backend { code: String, message: String },

    /// The request never produced a backend response (network, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response could not be mapped onto the expected shape.
    #[error("malformed payload: {0}")]
    Decode(String),
}

impl StoreError {
    /// The feature's tables or procedures are not there yet.
    pub fn is_schema_missing(&self) -> bool {
        matches!(
            self,
            StoreError::UndefinedTable(_) | StoreError::UndefinedProcedure(_)
        )
    }
}

/// Single-statement, row-filtered store.
///
/// Each method is one round-trip and atomic on its own; nothing spans calls.
/// Implementations must report exact affected-row counts for updates and
/// deletes.
#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError>;

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn delete(&self, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError>;

    /// Invoke a stored procedure. The procedure runs atomically on the backend.
    async fn call_procedure(&self, name: &str, args: JsonValue) -> Result<JsonValue, StoreError>;
}

#[async_trait::async_trait]
impl<S> RowStore for Arc<S>
where
    S: RowStore + ?Sized,
{
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        (**self).select(table, filter).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError> {
        (**self).insert(table, rows).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError> {
        (**self).update(table, patch, filter).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError> {
        (**self).delete(table, filter).await
    }

    async fn call_procedure(&self, name: &str, args: JsonValue) -> Result<JsonValue, StoreError> {
        (**self).call_procedure(name, args).await
    }
}

/// Serialize a typed record into a row. The value must serialize to an object.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Decode(format!("expected an object, got {other}"))),
        Err(e) => Err(StoreError::Decode(format!("row serialization failed: {e}"))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(JsonValue::Object(row))
        .map_err(|e| StoreError::Decode(format!("failed to deserialize row: {e}")))
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(from_row).collect()
}

/// Unwrap a procedure result that may come back as a bare value or as a
/// single-element array (set-returning functions).
pub fn single_value(value: JsonValue) -> Result<JsonValue, StoreError> {
    match value {
        JsonValue::Array(mut items) => match items.len() {
            1 => Ok(items.remove(0)),
            n => Err(StoreError::Decode(format!("expected one result, got {n}"))),
        },
        other => Ok(other),
    }
}
