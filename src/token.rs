//! Session token generation.

use rand::Rng;

/// Token alphabet: 64 symbols, all safe in form bodies and URLs.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Token length; 16 symbols of 6 bits each.
pub const TOKEN_LEN: usize = 16;

/// Generate a fresh random session token.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = generate();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_tokens_differ() {
        let tokens: HashSet<String> = (0..256).map(|_| generate()).collect();
        assert_eq!(tokens.len(), 256);
    }
}
