//! Error taxonomy shared by the expense ledger, the invite tokens and the facade.

use thiserror::Error;

use wayfare_core::{DomainError, ExpenseId};

use crate::store::StoreError;

pub type CollabResult<T> = Result<T, CollabError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollabError {
    /// Input rejected before any write was issued.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation needs an acting identity and there is none.
    #[error("no signed-in user")]
    Unauthenticated,

    /// A filtered write touched zero rows. The row is missing or the identity
    /// may not modify it; the backend does not say which.
    #[error("{entity} {id} was not modified (missing or not permitted)")]
    NoRowsAffected { entity: &'static str, id: String },

    /// Writing splits failed.
    ///
    /// During creation the expense was rolled back. During an update the
    /// expense has no splits until the replacement is retried.
    #[error("failed to write splits for expense {expense_id}: {source}")]
    SplitInsertFailed {
        expense_id: ExpenseId,
        #[source]
        source: StoreError,
    },

    /// Removing the old splits failed. The old splits are intact, but the
    /// expense patch (amount included) is already applied.
    #[error("failed to remove splits of expense {expense_id}: {source}")]
    SplitDeleteFailed {
        expense_id: ExpenseId,
        #[source]
        source: StoreError,
    },

    /// Split insert failed and rolling the expense back failed too.
    #[error(
        "expense {expense_id} was left without splits: split insert failed ({insert_error}), rollback failed ({rollback_error})"
    )]
    OrphanedExpense {
        expense_id: ExpenseId,
        insert_error: StoreError,
        rollback_error: String,
    },

    /// Tables or procedures the feature needs are not provisioned.
    #[error("storage is not set up: {0}")]
    SchemaMissing(String),

    #[error(transparent)]
    Store(StoreError),
}

/// What the user is told, independent of the failure's technical detail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserFacing {
    InvalidInput,
    SignInRequired,
    PermissionDenied,
    SetupRequired,
    RetryOrContactSupport,
}

impl UserFacing {
    pub fn message(&self) -> &'static str {
        match self {
            UserFacing::InvalidInput => "Please check the values you entered.",
            UserFacing::SignInRequired => "Please sign in to continue.",
            UserFacing::PermissionDenied => "You do not have permission to change this.",
            UserFacing::SetupRequired => {
                "This feature is not set up yet. Ask the administrator to apply the latest database migrations."
            }
            UserFacing::RetryOrContactSupport => {
                "Something went wrong. Please try again, or contact support if it keeps happening."
            }
        }
    }
}

impl CollabError {
    pub fn no_rows(entity: &'static str, id: impl ToString) -> Self {
        CollabError::NoRowsAffected {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            CollabError::Validation(_) => "validation",
            CollabError::Unauthenticated => "unauthenticated",
            CollabError::NoRowsAffected { .. } => "no_rows_affected",
            CollabError::SplitInsertFailed { .. } => "split_insert_failed",
            CollabError::SplitDeleteFailed { .. } => "split_delete_failed",
            CollabError::OrphanedExpense { .. } => "orphaned_expense",
            CollabError::SchemaMissing(_) => "schema_missing",
            CollabError::Store(_) => "store",
        }
    }

    pub fn user_facing(&self) -> UserFacing {
        match self {
            CollabError::Validation(_) => UserFacing::InvalidInput,
            CollabError::Unauthenticated => UserFacing::SignInRequired,
            CollabError::NoRowsAffected { .. } => UserFacing::PermissionDenied,
            CollabError::SchemaMissing(_) => UserFacing::SetupRequired,
            CollabError::SplitInsertFailed { .. }
            | CollabError::SplitDeleteFailed { .. }
            | CollabError::OrphanedExpense { .. }
            | CollabError::Store(_) => UserFacing::RetryOrContactSupport,
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// A failed split delete leaves the old splits intact but the patch already
    /// applied, so repeating the whole update converges; a failed split insert
    /// after an update is fixed by repeating the replacement. Orphans need
    /// reconciliation, not a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollabError::SplitInsertFailed { .. } | CollabError::SplitDeleteFailed { .. } => true,
            CollabError::Store(e) => matches!(e, StoreError::Transport(_) | StoreError::Backend { .. }),
            _ => false,
        }
    }
}

impl From<StoreError> for CollabError {
    fn from(value: StoreError) -> Self {
        if value.is_schema_missing() {
            CollabError::SchemaMissing(value.to_string())
        } else {
            CollabError::Store(value)
        }
    }
}

impl From<DomainError> for CollabError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => CollabError::Validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_relations_classify_as_schema_missing() {
        let err: CollabError = StoreError::UndefinedTable("invite_tokens".into()).into();
        assert_eq!(err.kind(), "schema_missing");
        assert_eq!(err.user_facing(), UserFacing::SetupRequired);

        let err: CollabError = StoreError::UndefinedProcedure("use_invite_token".into()).into();
        assert!(matches!(err, CollabError::SchemaMissing(_)));

        let err: CollabError = StoreError::Transport("timeout".into()).into();
        assert!(matches!(err, CollabError::Store(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn domain_errors_become_validation() {
        let err: CollabError = DomainError::invariant("split total 100 does not match amount 300").into();
        assert_eq!(
            err,
            CollabError::Validation("split total 100 does not match amount 300".into())
        );
        assert_eq!(err.user_facing(), UserFacing::InvalidInput);
    }

    #[test]
    fn zero_row_writes_read_as_permission_denied() {
        let err = CollabError::no_rows("expense", "abc");
        assert_eq!(err.kind(), "no_rows_affected");
        assert_eq!(err.user_facing(), UserFacing::PermissionDenied);
        assert!(!err.is_retryable());
    }

    #[test]
    fn orphans_are_not_retryable() {
        let err = CollabError::OrphanedExpense {
            expense_id: ExpenseId::new(),
            insert_error: StoreError::Constraint("dup".into()),
            rollback_error: "0 rows deleted".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.user_facing(), UserFacing::RetryOrContactSupport);
    }
}
