//! `wayfare-auth` — acting identity and access-token claims.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod identity;

pub use claims::{AccessClaims, AccessTokenVerifier, ClaimsError, Hs256Verifier, validate_claims};
pub use identity::{IdentityResolver, StaticIdentity};
