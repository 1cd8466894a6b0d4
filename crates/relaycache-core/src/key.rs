//! Cache key normalization.
//!
//! A cache key may arrive bare (`foo`) or already namespaced (`ns:foo`).
//! Normalization strips whatever namespace the key carries (only the first
//! `:`-separated segment) and applies the caller's prefix, so that several
//! logical caches can share one backend without colliding.
//!
//! ```
//! use relaycache_core::normalize;
//!
//! assert_eq!(normalize("foo", "api"), "api:foo");
//! assert_eq!(normalize("other:foo", "api"), "api:foo");
//! assert_eq!(normalize("api:foo", ""), "foo");
//! ```

/// Separator between the namespace and the bare key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Returns the key with its first namespace segment removed.
///
/// Keys without a separator are already bare and are returned unchanged.
#[inline]
pub fn bare_key(key: &str) -> &str {
    match key.split_once(NAMESPACE_SEPARATOR) {
        Some((_, rest)) => rest,
        None => key,
    }
}

/// Normalizes a cache key against a namespace prefix.
///
/// An empty prefix means "no namespace" and yields the bare key.
pub fn normalize(key: &str, prefix: &str) -> String {
    let bare = bare_key(key);

    if prefix.is_empty() {
        bare.to_string()
    } else {
        format!("{prefix}{NAMESPACE_SEPARATOR}{bare}")
    }
}

/// Normalizes every key independently, preserving order.
pub fn normalize_multi<S: AsRef<str>>(keys: &[S], prefix: &str) -> Vec<String> {
    keys.iter()
        .map(|key| normalize(key.as_ref(), prefix))
        .collect()
}
