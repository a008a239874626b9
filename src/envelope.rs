//! The envelope committed to the store for each id
//!
//! An envelope maps a region name to the base64 ciphertext of one data key
//! encrypted under that region's master key. Envelopes are written whole
//! (one entry per configured region) in a single conditional insert and are
//! never mutated afterwards.

use std::collections::hash_map;
use std::collections::HashMap;

/// Per-region ciphertexts of a single data key, stored together under one id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    keys: HashMap<String, String>,
}

impl Envelope {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the base64 ciphertext for a region.
    pub fn insert(&mut self, region: impl Into<String>, ciphertext: impl Into<String>) {
        self.keys.insert(region.into(), ciphertext.into());
    }

    /// Returns the base64 ciphertext for a region, if present.
    pub fn get(&self, region: &str) -> Option<&str> {
        self.keys.get(region).map(String::as_str)
    }

    /// Number of regional ciphertexts in the envelope.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the envelope holds no ciphertexts.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over (region, base64 ciphertext) pairs.
    pub fn iter(&self) -> hash_map::Iter<'_, String, String> {
        self.keys.iter()
    }
}

impl FromIterator<(String, String)> for Envelope {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
