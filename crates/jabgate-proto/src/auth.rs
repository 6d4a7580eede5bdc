//! Credential encoding for the provider token mechanism.
//!
//! The token mechanism carries the same `authzid NUL authcid NUL secret`
//! layout as SASL PLAIN, with the account's OAuth-style token as the secret.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Mechanism name advertised in the `<auth>` element.
pub const TOKEN_MECHANISM: &str = "X-GOOGLE-TOKEN";

/// Encode an account identifier and secret as the auth payload.
///
/// # Example
///
/// ```
/// use jabgate_proto::auth::encode_token;
///
/// assert_eq!(encode_token("a@example.com", "S"), "AGFAZXhhbXBsZS5jb20AUw==");
/// ```
pub fn encode_token(account: &str, secret: &str) -> String {
    let payload = format!("\0{}\0{}", account, secret);
    BASE64.encode(payload.as_bytes())
}
