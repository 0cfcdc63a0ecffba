//! Infrastructure layer: the row-filtered store client, its backends, and the
//! managers that keep trip expenses and invite tokens consistent on top of it.

pub mod collaboration;
pub mod config;
pub mod error;
pub mod expense_ledger;
pub mod invite_tokens;
pub mod schema;
pub mod store;

mod integration_tests;

pub use collaboration::{ExpenseDraft, TripCollaboration};
pub use config::{ConfigError, PostgrestSettings, StoreConfig};
pub use error::{CollabError, CollabResult, UserFacing};
pub use expense_ledger::ExpenseLedger;
pub use invite_tokens::InviteTokens;
pub use store::{
    DeleteOutcome, Filter, InMemoryBackend, InMemorySession, InsertOutcome, PostgrestStore, Row,
    RowStore, StoreError, UpdateOutcome,
};
