//! Short codes used to join a family group.

use rand::Rng;

pub const JOIN_CODE_LENGTH: usize = 6;

/// Probes against the backend before settling on a code.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Uppercase letters and digits without the look-alikes 0/O and 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random join code.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LENGTH)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Codes are typed by hand; compare them trimmed and uppercased.
pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether `code` (after normalising) has the join-code shape.
pub fn is_valid(code: &str) -> bool {
    let code = normalize(code);
    code.len() == JOIN_CODE_LENGTH && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
