//! Key hooks supplied by each entity type.

/// Maps keys to canonical cache-slot strings and derives keys from values.
///
/// One `KeySpace` is injected into each [`KeyValueCache`](super::KeyValueCache). Two
/// keys address the same slot exactly when their canonical strings are equal; object
/// identity and `PartialEq` on the key type play no part.
///
/// # Contract
///
/// - [`canonical`](Self::canonical) must be pure and deterministic, and must not map
///   two distinct keys of this entity type to the same string.
/// - [`extract_key`](Self::extract_key) returns `None` only for values that violate the
///   entity's invariants; the operation that produced such a value fails with
///   [`CacheError::MissingKey`](crate::CacheError::MissingKey).
pub trait KeySpace: Send + Sync + 'static {
    type Key;
    type Value;

    /// Canonical string for `key`.
    fn canonical(&self, key: &Self::Key) -> String;

    /// Key of the entity a freshly received `value` describes.
    fn extract_key(&self, value: &Self::Value) -> Option<Self::Key>;
}
