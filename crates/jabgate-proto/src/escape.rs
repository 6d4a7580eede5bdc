//! Escaping of character data placed into stanza markup.
//!
//! Every user-supplied string concatenated into an outbound stanza passes
//! through [`escape`]. A raw `<` in a message body would otherwise open a
//! new element on the wire and desynchronize the peer's framing.

use std::borrow::Cow;

use crate::error::Result;

/// Replace every `&`, `<`, `>`, `'` and `"` with its predefined entity.
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
///
/// # Example
///
/// ```
/// use jabgate_proto::escape;
///
/// assert_eq!(escape("a < b & 'c'"), "a &lt; b &amp; &apos;c&apos;");
/// assert_eq!(escape("plain"), "plain");
/// ```
pub fn escape(input: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(input)
}

/// Resolve predefined entities and numeric character references.
///
/// Unknown entities and references without a closing `;` are errors.
pub fn unescape(input: &str) -> Result<Cow<'_, str>> {
    Ok(quick_xml::escape::unescape(input)?)
}
