//! Flat `namespace:key` addressing.
//!
//! Every template entry is referenced by its serialized address. [`join`] is
//! the canonical form; [`split`] is total and falls back to
//! [`DEFAULT_NAMESPACE`] / [`DEFAULT_KEY`] for missing parts.

/// Namespace used when an address has no `namespace:` prefix.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Key used when an address has an empty key portion.
pub const DEFAULT_KEY: &str = "default";

/// Suffix marking a data namespace (single JSON blob).
pub const DATA_SUFFIX: &str = ".json";

/// Entry key holding the blob of a data namespace.
pub const DATA_CONTENT_KEY: &str = "content";

/// Split an address at the first `:`.
///
/// ```
/// use confd_core::address::split;
///
/// assert_eq!(split("ns1:testkey"), ("ns1".to_string(), "testkey".to_string()));
/// assert_eq!(split("testkey"), ("default".to_string(), "testkey".to_string()));
/// ```
pub fn split(address: &str) -> (String, String) {
    let (namespace, key) = match address.split_once(':') {
        Some((ns, key)) if !ns.is_empty() => (ns, key),
        Some((_, key)) => (DEFAULT_NAMESPACE, key),
        None => (DEFAULT_NAMESPACE, address),
    };
    let key = if key.is_empty() { DEFAULT_KEY } else { key };
    (namespace.to_owned(), key.to_owned())
}

/// Join a namespace and key into the serialized address.
pub fn join(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Canonical form of a user-supplied address: `join(split(address))`.
pub fn canonical(address: &str) -> String {
    let (namespace, key) = split(address);
    join(&namespace, &key)
}

/// `true` when `namespace` holds a single JSON blob rather than templates.
pub fn is_data_namespace(namespace: &str) -> bool {
    namespace.ends_with(DATA_SUFFIX)
}

/// Name under which a data namespace is exposed to templates.
///
/// `config.json` → `config`. Template namespaces are returned unchanged.
pub fn data_set_name(namespace: &str) -> &str {
    namespace.strip_suffix(DATA_SUFFIX).unwrap_or(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ns1:testkey", "ns1", "testkey")]
    #[case("ns1:", "ns1", "default")]
    #[case(":testkey", "default", "testkey")]
    #[case("testkey", "default", "testkey")]
    #[case("", "default", "default")]
    #[case(":", "default", "default")]
    #[case("ns:a:b", "ns", "a:b")]
    fn split_applies_defaults(#[case] input: &str, #[case] ns: &str, #[case] key: &str) {
        assert_eq!(split(input), (ns.to_string(), key.to_string()));
    }

    #[rstest]
    #[case("ns1", "testkey")]
    #[case("config.json", "content")]
    #[case("default", "nginx.conf")]
    fn split_inverts_join(#[case] ns: &str, #[case] key: &str) {
        assert_eq!(split(&join(ns, key)), (ns.to_string(), key.to_string()));
    }

    #[test]
    fn canonical_fills_missing_namespace() {
        assert_eq!(canonical("testkey"), "default:testkey");
        assert_eq!(canonical("app:"), "app:default");
        assert_eq!(canonical("app:site.conf"), "app:site.conf");
    }

    #[test]
    fn data_namespace_detection() {
        assert!(is_data_namespace("config.json"));
        assert!(!is_data_namespace("application"));
        assert!(!is_data_namespace("json"));
        assert_eq!(data_set_name("config.json"), "config");
        assert_eq!(data_set_name("a.b.json"), "a.b");
        assert_eq!(data_set_name("app"), "app");
    }
}
