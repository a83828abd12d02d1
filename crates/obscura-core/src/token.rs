//! Upload-token and image-id generation.

use rand::rngs::OsRng;
use rand::Rng;

/// Length of upload-link tokens and image ids.
pub const TOKEN_LENGTH: usize = 48;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random token of `len` letters. Tokens double as URL path
/// segments and object-store file names, so the alphabet stays strictly
/// alphabetic. Randomness comes from the operating system.
pub fn generate_token(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
