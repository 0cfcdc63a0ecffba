//! Expense ledger manager.
//!
//! Keeps an expense and its split set consistent across two tables on a store
//! that is atomic only per statement. Every multi-step write follows the same
//! shape:
//!
//! ```text
//! validate (no IO)
//!   ↓
//! write the expense row ── zero rows ──▶ NoRowsAffected
//!   ↓
//! write the split rows ─── failure ───▶ compensate (create) or report (update)
//! ```
//!
//! Compensation runs once. When it fails the expense id is logged at `error`
//! level for out-of-band reconciliation and returned in
//! [`CollabError::OrphanedExpense`].

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use wayfare_auth::IdentityResolver;
use wayfare_core::{ExpenseId, TripId, collect_ids};
use wayfare_ledger::{
    Expense, ExpensePatch, ExpenseSplit, ExpenseWithSplits, NewExpense, NewSplit, TripExpenses,
    validate_splits,
};

use crate::error::{CollabError, CollabResult};
use crate::schema::{EXPENSE_SPLITS, EXPENSES};
use crate::store::{DeleteOutcome, Direction, Filter, Row, RowStore, StoreError, from_row, from_rows, to_row};

const ENTITY: &str = "expense";

pub struct ExpenseLedger<S, I> {
    store: S,
    identity: I,
}

impl<S, I> ExpenseLedger<S, I>
where
    S: RowStore,
    I: IdentityResolver,
{
    pub fn new(store: S, identity: I) -> Self {
        Self { store, identity }
    }

    /// All expenses of a trip (newest expense date first) and their splits.
    #[instrument(skip(self), fields(trip_id = %trip_id), err)]
    pub async fn fetch_expenses(&self, trip_id: TripId) -> CollabResult<TripExpenses> {
        let rows = self
            .store
            .select(
                EXPENSES,
                &Filter::new()
                    .eq("trip_id", trip_id)
                    .order_by("expense_date", Direction::Desc),
            )
            .await?;
        let expenses: Vec<Expense> = from_rows(rows)?;

        if expenses.is_empty() {
            return Ok(TripExpenses::default());
        }

        let ids = collect_ids(&expenses);
        let rows = self
            .store
            .select(EXPENSE_SPLITS, &Filter::new().in_list("expense_id", ids))
            .await?;
        let splits: Vec<ExpenseSplit> = from_rows(rows)?;

        Ok(TripExpenses { expenses, splits })
    }

    /// Insert an expense together with its splits.
    ///
    /// If the splits cannot be written the expense is deleted again, so the
    /// caller sees either both or neither.
    #[instrument(
        skip(self, new_expense, splits),
        fields(trip_id = %new_expense.trip_id, split_count = splits.len()),
        err
    )]
    pub async fn create_expense(
        &self,
        new_expense: NewExpense,
        splits: Vec<NewSplit>,
    ) -> CollabResult<ExpenseWithSplits> {
        new_expense.validate()?;
        validate_splits(new_expense.amount, &splits)?;

        let expense = new_expense.into_expense(ExpenseId::new(), Utc::now());
        let expense_id = expense.id;
        let split_batch = split_rows(expense_id, splits)?;

        let inserted = self.store.insert(EXPENSES, vec![to_row(&expense)?]).await?;
        let expense: Expense = match inserted.rows.into_iter().next() {
            Some(row) => from_row(row)?,
            None => expense,
        };

        match self.store.insert(EXPENSE_SPLITS, split_batch).await {
            Ok(outcome) => {
                let splits: Vec<ExpenseSplit> = from_rows(outcome.rows)?;
                info!(expense_id = %expense_id, "expense created");
                Ok(ExpenseWithSplits { expense, splits })
            }
            Err(insert_error) => Err(self.roll_back_expense(expense_id, insert_error).await),
        }
    }

    async fn roll_back_expense(&self, expense_id: ExpenseId, insert_error: StoreError) -> CollabError {
        warn!(expense_id = %expense_id, error = %insert_error, "split insert failed; deleting expense");

        let rollback_error = match self.store.delete(EXPENSES, &Filter::by_id(expense_id)).await {
            Ok(DeleteOutcome { affected }) if affected > 0 => {
                return CollabError::SplitInsertFailed {
                    expense_id,
                    source: insert_error,
                };
            }
            Ok(_) => "rollback deleted no rows".to_string(),
            Err(e) => e.to_string(),
        };

        error!(
            expense_id = %expense_id,
            insert_error = %insert_error,
            rollback_error = %rollback_error,
            "orphaned expense requires reconciliation"
        );
        CollabError::OrphanedExpense {
            expense_id,
            insert_error,
            rollback_error,
        }
    }

    /// Apply a patch and optionally replace the whole split set.
    ///
    /// Changing the amount requires a replacement split set. Concurrent
    /// replacements on the same expense are not serialized; the last insert wins.
    #[instrument(
        skip(self, patch, new_splits),
        fields(expense_id = %expense_id, replaces_splits = new_splits.is_some()),
        err
    )]
    pub async fn update_expense(
        &self,
        expense_id: ExpenseId,
        patch: ExpensePatch,
        new_splits: Option<Vec<NewSplit>>,
    ) -> CollabResult<ExpenseWithSplits> {
        let user = self.identity.current().ok_or(CollabError::Unauthenticated)?;

        patch.validate()?;
        if patch.changes_amount() && new_splits.is_none() {
            return Err(CollabError::Validation(
                "changing the amount requires a replacement split set".to_string(),
            ));
        }
        if let Some(splits) = &new_splits {
            let amount = match patch.amount {
                Some(amount) => amount,
                None => self.load_expense(expense_id).await?.amount,
            };
            validate_splits(amount, splits)?;
        }

        let mut row: Row = to_row(&patch.normalized())?;
        row.insert("updated_by".to_string(), json!(user));
        row.insert("updated_at".to_string(), json!(Utc::now()));

        let outcome = self
            .store
            .update(EXPENSES, row, &Filter::by_id(expense_id))
            .await?;
        if outcome.affected == 0 {
            warn!(expense_id = %expense_id, user_id = %user, "expense update matched no rows");
            return Err(CollabError::no_rows(ENTITY, expense_id));
        }
        let expense: Expense = match outcome.rows.into_iter().next() {
            Some(row) => from_row(row)?,
            None => self.load_expense(expense_id).await?,
        };

        let splits = match new_splits {
            Some(splits) => self.replace_splits(expense_id, splits).await?,
            None => self.load_splits(expense_id).await?,
        };

        Ok(ExpenseWithSplits { expense, splits })
    }

    async fn replace_splits(
        &self,
        expense_id: ExpenseId,
        splits: Vec<NewSplit>,
    ) -> CollabResult<Vec<ExpenseSplit>> {
        let rows = split_rows(expense_id, splits)?;

        self.store
            .delete(EXPENSE_SPLITS, &Filter::new().eq("expense_id", expense_id))
            .await
            .map_err(|source| CollabError::SplitDeleteFailed { expense_id, source })?;

        let inserted = self.store.insert(EXPENSE_SPLITS, rows).await.map_err(|source| {
            warn!(expense_id = %expense_id, error = %source, "expense left without splits");
            CollabError::SplitInsertFailed { expense_id, source }
        })?;

        Ok(from_rows(inserted.rows)?)
    }

    /// Delete an expense. Its splits go with it (store-side cascade).
    #[instrument(skip(self), fields(expense_id = %expense_id), err)]
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> CollabResult<()> {
        let outcome = self
            .store
            .delete(EXPENSES, &Filter::by_id(expense_id))
            .await?;
        if outcome.affected == 0 {
            warn!(expense_id = %expense_id, "expense delete matched no rows");
            return Err(CollabError::no_rows(ENTITY, expense_id));
        }
        Ok(())
    }

    async fn load_expense(&self, expense_id: ExpenseId) -> CollabResult<Expense> {
        let row = self
            .store
            .select(EXPENSES, &Filter::by_id(expense_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CollabError::no_rows(ENTITY, expense_id))?;
        Ok(from_row(row)?)
    }

    async fn load_splits(&self, expense_id: ExpenseId) -> CollabResult<Vec<ExpenseSplit>> {
        let rows = self
            .store
            .select(EXPENSE_SPLITS, &Filter::new().eq("expense_id", expense_id))
            .await?;
        Ok(from_rows(rows)?)
    }
}

fn split_rows(expense_id: ExpenseId, splits: Vec<NewSplit>) -> Result<Vec<Row>, StoreError> {
    splits
        .into_iter()
        .map(|s| to_row(&s.into_split(expense_id)))
        .collect()
}
