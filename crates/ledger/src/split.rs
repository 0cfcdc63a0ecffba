use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use wayfare_core::{DomainError, DomainResult, Entity, ExpenseId, SplitId, UserId};

use crate::expense::Expense;

/// A stored split: the share of one expense owed by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSplit {
    pub id: SplitId,
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    /// Non-negative amount in minor units.
    pub amount: i64,
}

impl Entity for ExpenseSplit {
    type Id = SplitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for one split of a new or replaced split set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSplit {
    pub user_id: UserId,
    pub amount: i64,
}

impl NewSplit {
    pub fn new(user_id: UserId, amount: i64) -> Self {
        Self { user_id, amount }
    }

    pub fn into_split(self, expense_id: ExpenseId) -> ExpenseSplit {
        ExpenseSplit {
            id: SplitId::new(),
            expense_id,
            user_id: self.user_id,
            amount: self.amount,
        }
    }
}

/// Validate a split set against the expense amount it divides.
///
/// A set is valid when it is non-empty, every share is non-negative, each
/// member appears once and the shares add up to `amount` exactly.
pub fn validate_splits(amount: i64, splits: &[NewSplit]) -> DomainResult<()> {
    if splits.is_empty() {
        return Err(DomainError::validation("an expense needs at least one split"));
    }

    let mut members = HashSet::with_capacity(splits.len());
    let mut total: i128 = 0;

    for split in splits {
        if split.user_id.is_nil() {
            return Err(DomainError::invalid_id("split user_id is required"));
        }
        if split.amount < 0 {
            return Err(DomainError::validation("split amount must not be negative"));
        }
        if !members.insert(split.user_id) {
            return Err(DomainError::validation(format!(
                "member {} appears in more than one split",
                split.user_id
            )));
        }
        total += split.amount as i128;
    }

    if total != amount as i128 {
        return Err(DomainError::invariant(format!(
            "splits must sum to the expense amount (expected {amount}, got {total})"
        )));
    }

    Ok(())
}

/// Divide `amount` evenly across `members`.
///
/// The remainder is handed out one minor unit at a time from the front of the
/// list, so the result always satisfies [`validate_splits`] for non-empty,
/// duplicate-free member lists and non-negative amounts.
pub fn split_evenly(amount: i64, members: &[UserId]) -> Vec<NewSplit> {
    if members.is_empty() {
        return Vec::new();
    }

    let n = members.len() as i64;
    let base = amount / n;
    let remainder = amount % n;

    members
        .iter()
        .enumerate()
        .map(|(idx, user_id)| {
            let extra = if (idx as i64) < remainder { 1 } else { 0 };
            NewSplit::new(*user_id, base + extra)
        })
        .collect()
}

/// An expense together with its complete split set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseWithSplits {
    pub expense: Expense,
    pub splits: Vec<ExpenseSplit>,
}

impl ExpenseWithSplits {
    pub fn split_total(&self) -> i128 {
        self.splits.iter().map(|s| s.amount as i128).sum()
    }

    pub fn is_balanced(&self) -> bool {
        !self.splits.is_empty() && self.split_total() == self.expense.amount as i128
    }
}

/// All expenses of one trip plus every split belonging to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripExpenses {
    pub expenses: Vec<Expense>,
    pub splits: Vec<ExpenseSplit>,
}

impl TripExpenses {
    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    pub fn splits_for(&self, expense_id: ExpenseId) -> impl Iterator<Item = &ExpenseSplit> {
        self.splits.iter().filter(move |s| s.expense_id == expense_id)
    }

    /// Expenses whose split set is missing or does not add up.
    ///
    /// A non-empty result points at a partially applied write (e.g. a split
    /// replacement that failed halfway) that needs a retry or reconciliation.
    pub fn unbalanced(&self) -> Vec<ExpenseId> {
        self.expenses
            .iter()
            .filter(|e| {
                let mut count = 0usize;
                let total: i128 = self
                    .splits_for(e.id)
                    .inspect(|_| count += 1)
                    .map(|s| s.amount as i128)
                    .sum();
                count == 0 || total != e.amount as i128
            })
            .map(|e| e.id)
            .collect()
    }

    /// Group into one [`ExpenseWithSplits`] per expense, preserving expense order.
    pub fn grouped(&self) -> Vec<ExpenseWithSplits> {
        self.expenses
            .iter()
            .map(|e| ExpenseWithSplits {
                expense: e.clone(),
                splits: self.splits_for(e.id).cloned().collect(),
            })
            .collect()
    }
}
