use crate::record::InstanceId;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    instance: InstanceId,
    field: String,
    plaintext: String,
}

/// Ciphertexts seen during the current flush cycle, keyed by what they
/// decrypted to.
///
/// Entries are grouped by root record type, then keyed by instance, field path
/// and decrypted text. An encrypt pass that finds its canonical plaintext here
/// writes back the original ciphertext instead of calling the encryptor again.
#[derive(Default)]
pub struct DecryptionCache {
    entries: HashMap<String, HashMap<CacheKey, String>>,
}

impl DecryptionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers that `ciphertext` (marker included) decrypted to `plaintext`.
    pub fn insert(
        &mut self,
        root_type: &str,
        instance: InstanceId,
        field: &str,
        plaintext: String,
        ciphertext: String,
    ) {
        let key = CacheKey {
            instance,
            field: field.to_string(),
            plaintext,
        };
        self.entries
            .entry(root_type.to_string())
            .or_default()
            .insert(key, ciphertext);
    }

    /// The ciphertext `plaintext` was decrypted from, if seen this cycle.
    pub fn get(
        &self,
        root_type: &str,
        instance: InstanceId,
        field: &str,
        plaintext: &str,
    ) -> Option<&str> {
        let bucket = self.entries.get(root_type)?;
        let key = CacheKey {
            instance,
            field: field.to_string(),
            plaintext: plaintext.to_string(),
        };
        bucket.get(&key).map(String::as_str)
    }

    /// True if any entry exists for `root_type`.
    pub fn has_type(&self, root_type: &str) -> bool {
        self.entries
            .get(root_type)
            .is_some_and(|bucket| !bucket.is_empty())
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// Never print cached plaintext.
impl fmt::Debug for DecryptionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("DecryptionCache")
            .field("types", &types)
            .field("entries", &self.len())
            .finish()
    }
}
