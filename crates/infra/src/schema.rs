//! Table and procedure names, and the in-memory provisioning of both.
//!
//! The hosted backend is provisioned by migrations outside this repository.
//! The in-memory backend gets the equivalent here: owner-based write policies,
//! the expense → split cascade, and the two invite-token procedures.

use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};

use wayfare_invites::{InviteToken, TokenVerification};

use crate::store::memory::TableSet;
use crate::store::{InMemoryBackend, StoreError, TableSpec, WritePolicy, from_row, to_row};

pub const EXPENSES: &str = "expenses";
pub const EXPENSE_SPLITS: &str = "expense_splits";
pub const INVITE_TOKENS: &str = "invite_tokens";

pub const VERIFY_INVITE_TOKEN: &str = "verify_invite_token";
pub const USE_INVITE_TOKEN: &str = "use_invite_token";

/// Argument name both invite procedures take.
pub const TOKEN_ARG: &str = "p_token";

/// Provision every table and procedure.
pub fn provision(backend: &InMemoryBackend) {
    provision_expenses(backend);
    provision_invites(backend);
}

/// Expenses are writable by their creator; splits by the creator of their expense.
pub fn provision_expenses(backend: &InMemoryBackend) {
    backend.create_table(
        TableSpec::new(EXPENSES)
            .policy(WritePolicy::OwnerColumn("created_by".into()))
            .cascade_to(EXPENSE_SPLITS, "expense_id"),
    );
    backend.create_table(TableSpec::new(EXPENSE_SPLITS).policy(WritePolicy::ParentOwner {
        fk_column: "expense_id".into(),
        parent_table: EXPENSES.into(),
        owner_column: "created_by".into(),
    }));
}

/// Invite tokens are writable by their creator; redemption goes through the procedures.
pub fn provision_invites(backend: &InMemoryBackend) {
    backend.create_table(
        TableSpec::new(INVITE_TOKENS)
            .policy(WritePolicy::OwnerColumn("created_by".into()))
            .unique("token"),
    );
    backend.register_procedure(VERIFY_INVITE_TOKEN, verify_invite_token);
    backend.register_procedure(USE_INVITE_TOKEN, use_invite_token);
}

fn token_arg(args: &JsonValue) -> Result<&str, StoreError> {
    args.get(TOKEN_ARG)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| StoreError::Backend {
            code: "42883".to_string(),
            message: format!("missing argument {TOKEN_ARG}"),
        })
}

fn find_token(tables: &TableSet, token: &str) -> Result<Option<(usize, InviteToken)>, StoreError> {
    let rows = tables.rows(INVITE_TOKENS)?;
    match rows
        .iter()
        .position(|r| r.get("token").and_then(JsonValue::as_str) == Some(token))
    {
        Some(idx) => Ok(Some((idx, from_row(rows[idx].clone())?))),
        None => Ok(None),
    }
}

fn verify_invite_token(
    tables: &mut TableSet,
    args: &JsonValue,
    now: DateTime<Utc>,
) -> Result<JsonValue, StoreError> {
    let token = token_arg(args)?;
    let found = find_token(tables, token)?;
    let verification = TokenVerification::evaluate(found.as_ref().map(|(_, t)| t), now);
    Ok(JsonValue::Object(to_row(&verification)?))
}

fn use_invite_token(
    tables: &mut TableSet,
    args: &JsonValue,
    now: DateTime<Utc>,
) -> Result<JsonValue, StoreError> {
    let token = token_arg(args)?;
    let Some((idx, mut invite)) = find_token(tables, token)? else {
        return Ok(json!(false));
    };

    if invite.redeem(now).is_err() {
        return Ok(json!(false));
    }

    let rows = tables.rows_mut(INVITE_TOKENS)?;
    rows[idx].insert("use_count".to_string(), json!(invite.use_count));
    Ok(json!(true))
}
