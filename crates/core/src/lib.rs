//! `wayfare-core` — shared building blocks for the trip collaboration core.
//!
//! This crate contains **pure domain** primitives (no storage or transport concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, collect_ids};
pub use error::{DomainError, DomainResult};
pub use id::{ExpenseId, InviteTokenId, SplitId, TripId, UserId};
