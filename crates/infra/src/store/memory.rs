//! In-memory row-filtered store for tests/dev.
//!
//! Emulates the parts of a hosted relational backend the managers depend on:
//!
//! - per-table write policies evaluated against the session's actor (writes
//!   that fail the policy match zero rows; inserts that fail it are rejected)
//! - unique columns and `ON DELETE CASCADE` foreign keys
//! - stored procedures executed under the backend lock, so each call is atomic
//!   with respect to every other statement
//! - one-shot fault injection per operation and table/procedure
//!
//! Reads are not filtered.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use wayfare_core::UserId;

use super::{
    DeleteOutcome, Filter, InsertOutcome, Row, RowStore, StoreError, UpdateOutcome,
};

/// Who a session acts as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(UserId),
    /// Bypasses write policies (service key, migrations, test seeding).
    Service,
}

/// Which rows an actor may write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePolicy {
    /// Any actor, including anonymous ones.
    Open,
    /// `row[column]` must equal the acting user.
    OwnerColumn(String),
    /// The parent row referenced by `row[fk_column]` must be owned by the acting user.
    ParentOwner {
        fk_column: String,
        parent_table: String,
        owner_column: String,
    },
}

/// Table definition (the in-memory equivalent of a migration).
#[derive(Debug, Clone)]
pub struct TableSpec {
    name: String,
    policy: WritePolicy,
    unique: Vec<String>,
    cascades: Vec<(String, String)>,
}

impl TableSpec {
    /// New open table with a unique `id` column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: WritePolicy::Open,
            unique: vec!["id".to_string()],
            cascades: Vec::new(),
        }
    }

    pub fn policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Deleting a row of this table deletes `child_table` rows whose
    /// `fk_column` references it.
    pub fn cascade_to(mut self, child_table: impl Into<String>, fk_column: impl Into<String>) -> Self {
        self.cascades.push((child_table.into(), fk_column.into()));
        self
    }
}

/// Operation kinds, used to target injected faults.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
    Procedure,
}

/// Stored procedure body. Runs with exclusive access to every table.
pub type ProcedureFn = fn(&mut TableSet, &JsonValue, DateTime<Utc>) -> Result<JsonValue, StoreError>;

#[derive(Debug)]
struct Table {
    spec: TableSpec,
    rows: Vec<Row>,
}

/// All provisioned tables.
#[derive(Debug, Default)]
pub struct TableSet {
    tables: HashMap<String, Table>,
}

impl TableSet {
    pub fn rows(&self, table: &str) -> Result<&[Row], StoreError> {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .ok_or_else(|| StoreError::UndefinedTable(table.to_string()))
    }

    pub fn rows_mut(&mut self, table: &str) -> Result<&mut Vec<Row>, StoreError> {
        self.tables
            .get_mut(table)
            .map(|t| &mut t.rows)
            .ok_or_else(|| StoreError::UndefinedTable(table.to_string()))
    }

    fn spec(&self, table: &str) -> Result<&TableSpec, StoreError> {
        self.tables
            .get(table)
            .map(|t| &t.spec)
            .ok_or_else(|| StoreError::UndefinedTable(table.to_string()))
    }

    fn can_write(&self, policy: &WritePolicy, row: &Row, actor: Actor) -> bool {
        let user = match actor {
            Actor::Service => return true,
            Actor::Anonymous => return *policy == WritePolicy::Open,
            Actor::User(user) => user.to_string(),
        };

        match policy {
            WritePolicy::Open => true,
            WritePolicy::OwnerColumn(column) => column_text(row, column).as_deref() == Some(user.as_str()),
            WritePolicy::ParentOwner {
                fk_column,
                parent_table,
                owner_column,
            } => {
                let Some(parent_id) = column_text(row, fk_column) else {
                    return false;
                };
                let Ok(parents) = self.rows(parent_table) else {
                    return false;
                };
                parents.iter().any(|p| {
                    column_text(p, "id").as_deref() == Some(parent_id.as_str())
                        && column_text(p, owner_column).as_deref() == Some(user.as_str())
                })
            }
        }
    }

    /// Indices of rows matching `filter` that `actor` may write.
    fn writable(&self, table: &str, filter: &Filter, actor: Actor) -> Result<Vec<usize>, StoreError> {
        let spec = self.spec(table)?;
        Ok(self
            .rows(table)?
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.matches(row) && self.can_write(&spec.policy, row, actor))
            .map(|(idx, _)| idx)
            .collect())
    }

    /// Remove the given rows and everything that cascades from them.
    fn remove_rows(&mut self, table: &str, indices: &[usize]) -> Result<u64, StoreError> {
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let rows = self.rows_mut(table)?;

        let mut removed_ids = Vec::with_capacity(doomed.len());
        let mut idx = 0usize;
        rows.retain(|row| {
            let keep = !doomed.contains(&idx);
            if !keep {
                if let Some(id) = column_text(row, "id") {
                    removed_ids.push(id);
                }
            }
            idx += 1;
            keep
        });

        let cascades = self.spec(table)?.cascades.clone();
        for (child, fk) in cascades {
            let child_indices: Vec<usize> = self
                .rows(&child)?
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    column_text(row, &fk).is_some_and(|parent| removed_ids.contains(&parent))
                })
                .map(|(idx, _)| idx)
                .collect();
            if !child_indices.is_empty() {
                self.remove_rows(&child, &child_indices)?;
            }
        }

        Ok(doomed.len() as u64)
    }
}

#[derive(Debug)]
struct Fault {
    op: StoreOp,
    target: String,
    error: StoreError,
}

#[derive(Debug, Default)]
struct BackendState {
    tables: TableSet,
    procedures: HashMap<String, ProcedureFn>,
    faults: Vec<Fault>,
}

impl BackendState {
    fn take_fault(&mut self, op: StoreOp, target: &str) -> Result<(), StoreError> {
        match self
            .faults
            .iter()
            .position(|f| f.op == op && f.target == target)
        {
            Some(pos) => Err(self.faults.remove(pos).error),
            None => Ok(()),
        }
    }
}

/// Shared in-memory backend. Hand out [`InMemorySession`]s to act on it.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Provision (or re-provision, dropping existing rows) a table.
    pub fn create_table(&self, spec: TableSpec) {
        let mut state = self.lock();
        state.tables.tables.insert(
            spec.name.clone(),
            Table {
                spec,
                rows: Vec::new(),
            },
        );
    }

    pub fn register_procedure(&self, name: impl Into<String>, body: ProcedureFn) {
        self.lock().procedures.insert(name.into(), body);
    }

    /// Make the next `op` against `target` (table or procedure name) fail with `error`.
    pub fn fail_next(&self, op: StoreOp, target: impl Into<String>, error: StoreError) {
        self.lock().faults.push(Fault {
            op,
            target: target.into(),
            error,
        });
    }

    pub fn session(self: &Arc<Self>, actor: Actor) -> InMemorySession {
        InMemorySession {
            backend: Arc::clone(self),
            actor,
        }
    }

    pub fn as_user(self: &Arc<Self>, user: UserId) -> InMemorySession {
        self.session(Actor::User(user))
    }

    pub fn service(self: &Arc<Self>) -> InMemorySession {
        self.session(Actor::Service)
    }

    fn exec_select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let mut state = self.lock();
        state.take_fault(StoreOp::Select, table)?;

        let mut rows: Vec<Row> = state
            .tables
            .rows(table)?
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        filter.sort(&mut rows);
        Ok(rows)
    }

    fn exec_insert(&self, actor: Actor, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.take_fault(StoreOp::Insert, table)?;

        let tables = &state.tables;
        let spec = tables.spec(table)?;
        let existing = tables.rows(table)?;

        for row in &rows {
            if !tables.can_write(&spec.policy, row, actor) {
                return Err(StoreError::PolicyViolation(format!(
                    "new row violates row-level security policy for table \"{table}\""
                )));
            }
        }

        for column in &spec.unique {
            let mut seen: HashSet<String> = existing
                .iter()
                .filter_map(|r| column_text(r, column))
                .collect();
            for row in &rows {
                if let Some(value) = column_text(row, column) {
                    if !seen.insert(value.clone()) {
                        return Err(StoreError::Constraint(format!(
                            "duplicate key value violates unique constraint \"{table}_{column}_key\" ({column}={value})"
                        )));
                    }
                }
            }
        }

        state.tables.rows_mut(table)?.extend(rows.iter().cloned());
        Ok(InsertOutcome { rows })
    }

    fn exec_update(
        &self,
        actor: Actor,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.lock();
        state.take_fault(StoreOp::Update, table)?;

        let targets = state.tables.writable(table, filter, actor)?;
        let rows = state.tables.rows_mut(table)?;

        let mut updated = Vec::with_capacity(targets.len());
        for idx in targets {
            let row = &mut rows[idx];
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }

        Ok(UpdateOutcome {
            affected: updated.len() as u64,
            rows: updated,
        })
    }

    fn exec_delete(&self, actor: Actor, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.lock();
        state.take_fault(StoreOp::Delete, table)?;

        let targets = state.tables.writable(table, filter, actor)?;
        let affected = state.tables.remove_rows(table, &targets)?;
        Ok(DeleteOutcome { affected })
    }

    fn exec_procedure(&self, name: &str, args: &JsonValue) -> Result<JsonValue, StoreError> {
        let mut state = self.lock();
        state.take_fault(StoreOp::Procedure, name)?;

        let body = *state
            .procedures
            .get(name)
            .ok_or_else(|| StoreError::UndefinedProcedure(name.to_string()))?;
        body(&mut state.tables, args, Utc::now())
    }
}

/// A connection to an [`InMemoryBackend`] acting as one [`Actor`].
#[derive(Debug, Clone)]
pub struct InMemorySession {
    backend: Arc<InMemoryBackend>,
    actor: Actor,
}

#[async_trait::async_trait]
impl RowStore for InMemorySession {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.backend.exec_select(table, filter)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError> {
        self.backend.exec_insert(self.actor, table, rows)
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError> {
        self.backend.exec_update(self.actor, table, patch, filter)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError> {
        self.backend.exec_delete(self.actor, table, filter)
    }

    async fn call_procedure(&self, name: &str, args: JsonValue) -> Result<JsonValue, StoreError> {
        self.backend.exec_procedure(name, &args)
    }
}

fn column_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
