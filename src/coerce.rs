//! Normalization of version range strings into concrete query versions.
//!
//! The registry's manifest endpoint accepts either a concrete version or a
//! dist-tag, never a range. Before an edge can be fetched, its range string
//! has to be squeezed into one of those two shapes.

use crate::registry::LATEST_TAG;
use semver::Version;

/// Normalize a range string into a version the registry can be queried with.
///
/// A single leading `^` or `~` is stripped. If the remainder is a valid
/// concrete semver it is returned unchanged. Otherwise a best-effort coercion
/// is attempted (first contiguous `N[.N[.N]]` run, zero-filled), and if that
/// also fails the literal `latest` tag is returned.
pub(crate) fn coerce(range: &str) -> String {
    let trimmed = range.trim();
    let stripped = trimmed
        .strip_prefix(['^', '~'])
        .unwrap_or(trimmed);

    if Version::parse(stripped).is_ok() {
        return stripped.to_string();
    }

    coerce_loose(stripped).unwrap_or_else(|| LATEST_TAG.to_string())
}

/// Best-effort coercion of a non-semver string into `MAJOR.MINOR.PATCH`.
///
/// Scans for the first digit, then collects up to three dot-separated numeric
/// components, zero-filling the missing ones. `1.x` becomes `1.0.0`,
/// `>=2.1 <3` becomes `2.1.0`, `1.2.3.4` truncates to `1.2.3`.
fn coerce_loose(input: &str) -> Option<String> {
    let start = input.find(|c: char| c.is_ascii_digit())?;

    let mut parts: Vec<u64> = Vec::with_capacity(3);
    let mut current = String::new();
    for ch in input[start..].chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else if ch == '.' && !current.is_empty() && parts.len() < 2 {
            parts.push(current.parse().ok()?);
            current.clear();
        } else {
            break;
        }
    }
    if !current.is_empty() {
        parts.push(current.parse().ok()?);
    }

    let major = *parts.first()?;
    let minor = parts.get(1).copied().unwrap_or(0);
    let patch = parts.get(2).copied().unwrap_or(0);
    Some(format!("{major}.{minor}.{patch}"))
}
