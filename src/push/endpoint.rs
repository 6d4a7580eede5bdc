//! Push endpoint validation.

use regex::Regex;
use std::sync::OnceLock;

const ENDPOINT_PATTERN: &str = r"^(https?)://([a-z0-9.-]+)(?::([0-9]+))?(/.*)?$";

static ENDPOINT: OnceLock<Option<Regex>> = OnceLock::new();

/// Whether `url` has the form `scheme://host[:port][/path]` with an
/// `http` or `https` scheme, a lowercase host and a port that fits in 16 bits.
pub fn is_valid_endpoint(url: &str) -> bool {
    let Some(re) = ENDPOINT.get_or_init(|| Regex::new(ENDPOINT_PATTERN).ok()).as_ref() else {
        return false;
    };
    let Some(caps) = re.captures(url) else {
        return false;
    };
    caps.get(3).is_none_or(|port| port.as_str().parse::<u16>().is_ok())
}
