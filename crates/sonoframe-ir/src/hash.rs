//! Content hashing and hash-keyed memoization.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

/// SHA-256 digest of some canonical content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash the canonical JSON form of `value`.
    ///
    /// Maps must be ordered (`BTreeMap`) for the digest to be stable.
    pub fn of_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        let mut hasher = ContentHasher::new();
        hasher.update_bytes(&bytes);
        Ok(hasher.finish())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex digest.
    pub fn hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 8 hex characters, used in artifact names.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Incremental hasher for heterogeneous content.
///
/// Every `update_*` call is length- or tag-prefixed so that adjacent fields
/// cannot alias each other.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Start an empty digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes.
    pub fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Feed a string.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.update_bytes(s.as_bytes())
    }

    /// Feed a float by bit pattern.
    pub fn update_f64(&mut self, v: f64) -> &mut Self {
        self.inner.update([b'f']);
        self.inner.update(v.to_bits().to_le_bytes());
        self
    }

    /// Feed a flag.
    pub fn update_bool(&mut self, b: bool) -> &mut Self {
        self.inner.update([b'b', b as u8]);
        self
    }

    /// Feed an optional block of floats; `None` and empty differ.
    pub fn update_floats(&mut self, values: Option<&[f64]>) -> &mut Self {
        match values {
            None => self.inner.update([b'n']),
            Some(values) => {
                self.inner.update([b's']);
                self.inner.update((values.len() as u64).to_le_bytes());
                for v in values {
                    self.inner.update(v.to_bits().to_le_bytes());
                }
            }
        }
        self
    }

    /// Feed the canonical JSON form of `value`.
    ///
    /// A value JSON cannot represent (a map with non-string keys) feeds the
    /// serializer's error text under its own tag instead.
    pub fn update_json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.inner.update([b'j']);
                self.update_bytes(&bytes)
            }
            Err(e) => {
                warn!(error = %e, "value has no JSON form; hashing the error");
                self.inner.update([b'e']);
                self.update_str(&e.to_string())
            }
        }
    }

    /// Finish the digest.
    pub fn finish(self) -> ContentHash {
        ContentHash(self.inner.finalize().into())
    }
}

/// A single cached value tagged with the hash of the inputs it was derived from.
///
/// Asking for the value under a different hash drops the stale one and
/// recomputes.
#[derive(Debug, Clone)]
pub struct Memo<T> {
    key: Option<ContentHash>,
    value: Option<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self { key: None, value: None }
    }
}

impl<T> Memo<T> {
    /// Empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, if current.
    pub fn get(&self, key: &ContentHash) -> Option<&T> {
        if self.key.as_ref() == Some(key) {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Latest value regardless of key.
    pub fn latest(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Hash the current value was computed under.
    pub fn key(&self) -> Option<&ContentHash> {
        self.key.as_ref()
    }

    /// True if a value is cached for `key`.
    pub fn is_current(&self, key: &ContentHash) -> bool {
        self.get(key).is_some()
    }

    /// Return the cached value for `key`, computing it first when stale.
    pub fn get_or_compute(&mut self, key: ContentHash, compute: impl FnOnce() -> T) -> &T {
        if self.key != Some(key) {
            self.value = None;
        }
        self.key = Some(key);
        self.value.get_or_insert_with(compute)
    }

    /// Fallible [`Memo::get_or_compute`]. A failed computation leaves the memo empty.
    pub fn try_get_or_compute<E>(
        &mut self,
        key: ContentHash,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<&T, E> {
        let cached = if self.key == Some(key) { self.value.take() } else { None };
        self.key = None;
        self.value = None;
        let value = match cached {
            Some(v) => v,
            None => compute()?,
        };
        self.key = Some(key);
        Ok(self.value.insert(value))
    }

    /// Store a value computed elsewhere.
    pub fn set(&mut self, key: ContentHash, value: T) {
        self.key = Some(key);
        self.value = Some(value);
    }

    /// Drop the cached value.
    pub fn clear(&mut self) {
        self.key = None;
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_short_hash_is_eight_hex_chars() {
        let h = ContentHash::of_json(&BTreeMap::from([("a", 1.0)])).unwrap();
        assert_eq!(h.short().len(), 8);
        assert!(h.hex().starts_with(&h.short()));
        assert!(h.short().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_map_order_does_not_matter() {
        let mut a = BTreeMap::new();
        a.insert("x", 1.0);
        a.insert("y", 2.0);
        let mut b = BTreeMap::new();
        b.insert("y", 2.0);
        b.insert("x", 1.0);
        assert_eq!(ContentHash::of_json(&a).unwrap(), ContentHash::of_json(&b).unwrap());
    }

    #[test]
    fn test_hasher_fields_do_not_alias() {
        let mut a = ContentHasher::new();
        a.update_str("ab").update_str("c");
        let mut b = ContentHasher::new();
        b.update_str("a").update_str("bc");
        assert_ne!(a.finish(), b.finish());

        let mut c = ContentHasher::new();
        c.update_floats(None);
        let mut d = ContentHasher::new();
        d.update_floats(Some(&[]));
        assert_ne!(c.finish(), d.finish());
    }

    #[test]
    fn test_update_json_without_json_form() {
        let valid = BTreeMap::from([("k", 1.0)]);
        let mut a = ContentHasher::new();
        a.update_json(&valid);
        let mut b = ContentHasher::new();
        b.update_json(&valid);
        assert_eq!(a.finish(), b.finish());

        // Tuple keys are rejected by serde_json; the digest is still stable.
        let odd = BTreeMap::from([((1, 2), 1.0)]);
        let mut c = ContentHasher::new();
        c.update_json(&odd);
        let mut d = ContentHasher::new();
        d.update_json(&odd);
        let (c, d) = (c.finish(), d.finish());
        assert_eq!(c, d);
        let mut e = ContentHasher::new();
        e.update_json(&valid);
        assert_ne!(c, e.finish());
    }

    #[test]
    fn test_memo_recomputes_only_on_new_key() {
        let k1 = ContentHash::of_json("one").unwrap();
        let k2 = ContentHash::of_json("two").unwrap();
        let mut memo = Memo::new();
        let mut calls = 0;
        assert_eq!(*memo.get_or_compute(k1, || { calls += 1; 10 }), 10);
        assert_eq!(*memo.get_or_compute(k1, || { calls += 1; 20 }), 10);
        assert_eq!(calls, 1);
        assert_eq!(*memo.get_or_compute(k2, || { calls += 1; 30 }), 30);
        assert_eq!(calls, 2);
        assert!(memo.get(&k1).is_none());
        memo.clear();
        assert!(memo.latest().is_none());
    }

    #[test]
    fn test_memo_failed_compute_leaves_empty() {
        let k = ContentHash::of_json(&1).unwrap();
        let mut memo: Memo<u32> = Memo::new();
        let r: Result<&u32, &str> = memo.try_get_or_compute(k, || Err("boom"));
        assert!(r.is_err());
        assert!(memo.key().is_none());
        assert_eq!(*memo.try_get_or_compute::<&str>(k, || Ok(3)).unwrap(), 3);
        assert_eq!(*memo.try_get_or_compute::<&str>(k, || Ok(4)).unwrap(), 3);
    }
}
