//! Helpers for Jabber identifiers.
//!
//! Only the two projections the gateway needs are provided: the bare form
//! (`local@domain`) used as the roster key, and the domain used to address
//! the stream header.

/// Strip the resource part: `b@example.com/phone` becomes `b@example.com`.
pub fn bare(jid: &str) -> &str {
    jid.split_once('/').map_or(jid, |(bare, _)| bare)
}

/// Domain of an account identifier, i.e. everything after the first `@`.
///
/// Returns `None` when there is no `@` or nothing follows it.
pub fn domain_of(account: &str) -> Option<&str> {
    let (_, rest) = account.split_once('@')?;
    let domain = bare(rest);
    (!domain.is_empty()).then_some(domain)
}
