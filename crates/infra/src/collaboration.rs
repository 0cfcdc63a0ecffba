//! Trip collaboration facade.
//!
//! One entry point over the expense ledger and the invite tokens, built from
//! an explicit store handle and identity resolver. Callers get a single error
//! type ([`CollabError`]) for every operation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use wayfare_auth::IdentityResolver;
use wayfare_core::{ExpenseId, InviteTokenId, TripId, UserId};
use wayfare_invites::{InviteKind, InviteToken, TokenVerification};
use wayfare_ledger::{
    ExpenseCategory, ExpensePatch, ExpenseWithSplits, NewExpense, NewSplit, TripExpenses,
};

use crate::error::{CollabError, CollabResult};
use crate::expense_ledger::ExpenseLedger;
use crate::invite_tokens::InviteTokens;
use crate::store::RowStore;

/// Expense fields supplied by the caller; the creator is taken from the
/// resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub title: String,
    pub amount: i64,
    pub category: ExpenseCategory,
    pub payer_id: UserId,
    pub expense_date: NaiveDate,
}

impl ExpenseDraft {
    fn into_new_expense(self, trip_id: TripId, created_by: UserId) -> NewExpense {
        NewExpense {
            trip_id,
            title: self.title,
            amount: self.amount,
            category: self.category,
            payer_id: self.payer_id,
            expense_date: self.expense_date,
            created_by,
        }
    }
}

pub struct TripCollaboration<S, I> {
    ledger: ExpenseLedger<S, I>,
    invites: InviteTokens<S, I>,
    identity: I,
}

impl<S, I> TripCollaboration<S, I>
where
    S: RowStore + Clone,
    I: IdentityResolver + Clone,
{
    pub fn new(store: S, identity: I) -> Self {
        Self {
            ledger: ExpenseLedger::new(store.clone(), identity.clone()),
            invites: InviteTokens::new(store, identity.clone()),
            identity,
        }
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.identity.current()
    }

    pub async fn fetch_expenses(&self, trip_id: TripId) -> CollabResult<TripExpenses> {
        self.ledger.fetch_expenses(trip_id).await
    }

    pub async fn create_expense(
        &self,
        trip_id: TripId,
        draft: ExpenseDraft,
        splits: Vec<NewSplit>,
    ) -> CollabResult<ExpenseWithSplits> {
        let created_by = self.current_user().ok_or(CollabError::Unauthenticated)?;
        self.ledger
            .create_expense(draft.into_new_expense(trip_id, created_by), splits)
            .await
    }

    pub async fn update_expense(
        &self,
        expense_id: ExpenseId,
        patch: ExpensePatch,
        new_splits: Option<Vec<NewSplit>>,
    ) -> CollabResult<ExpenseWithSplits> {
        self.ledger.update_expense(expense_id, patch, new_splits).await
    }

    pub async fn delete_expense(&self, expense_id: ExpenseId) -> CollabResult<()> {
        self.ledger.delete_expense(expense_id).await
    }

    pub async fn create_invite_token(
        &self,
        trip_id: TripId,
        kind: InviteKind,
        expires_in_days: Option<u32>,
        max_uses: Option<u32>,
    ) -> CollabResult<InviteToken> {
        self.invites
            .create_invite_token(trip_id, kind, expires_in_days, max_uses)
            .await
    }

    pub async fn verify_invite_token(&self, token: &str) -> CollabResult<TokenVerification> {
        self.invites.verify_invite_token(token).await
    }

    pub async fn use_invite_token(&self, token: &str) -> CollabResult<bool> {
        self.invites.use_invite_token(token).await
    }

    pub async fn get_invite_tokens(&self, trip_id: TripId) -> CollabResult<Vec<InviteToken>> {
        self.invites.get_invite_tokens(trip_id).await
    }

    pub async fn deactivate_invite_token(&self, token_id: InviteTokenId) -> CollabResult<()> {
        self.invites.deactivate_invite_token(token_id).await
    }
}
