//! Expense ledger domain (expenses + per-member splits).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod expense;
pub mod split;

pub use expense::{Expense, ExpenseCategory, ExpensePatch, NewExpense};
pub use split::{
    ExpenseSplit, ExpenseWithSplits, NewSplit, TripExpenses, split_evenly, validate_splits,
};
