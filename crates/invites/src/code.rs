//! Capability string generation.

use rand::Rng;
use rand::rngs::OsRng;

/// 32 symbols: upper-case letters without `I`/`O`, digits without `0`/`1`.
pub const TOKEN_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of every issued token.
pub const TOKEN_LENGTH: usize = 32;

/// Generate a token from the operating system CSPRNG.
pub fn generate_token() -> String {
    generate_token_with(&mut OsRng, TOKEN_LENGTH)
}

/// Generate a `len`-character token, each symbol drawn uniformly from
/// [`TOKEN_ALPHABET`].
pub fn generate_token_with<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Cheap shape check used before hitting the store with a user-typed token.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}
