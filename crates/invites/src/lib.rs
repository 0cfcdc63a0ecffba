//! Invite token domain: capability tokens that grant trip membership.
//!
//! Pure domain logic only. The usability predicate defined here is what the
//! store-side redemption procedures evaluate; clients never run it themselves
//! before redeeming.

pub mod code;
pub mod token;

pub use code::{TOKEN_ALPHABET, TOKEN_LENGTH, generate_token, generate_token_with, is_well_formed};
pub use token::{
    InvalidReason, InviteKind, InviteToken, MAX_EXPIRES_IN_DAYS, NewInviteToken, TokenVerification,
};
