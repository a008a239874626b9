use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// An in-memory implementation of the Store trait
///
/// Useful for testing and local development; envelopes are lost when the
/// process terminates.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    envelopes: RwLock<HashMap<String, Envelope>>,
}

impl InMemoryStore {
    /// Creates a new, empty InMemoryStore
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_encrypted_data_keys(&self, id: &str) -> Result<Option<Envelope>> {
        let envelopes = self.envelopes.read().unwrap();
        Ok(envelopes.get(id).cloned())
    }

    async fn put_encrypted_data_keys_if_absent(
        &self,
        id: &str,
        envelope: &Envelope,
    ) -> Result<()> {
        let mut envelopes = self.envelopes.write().unwrap();

        if envelopes.contains_key(id) {
            return Err(Error::IdAlreadyExists(id.to_string()));
        }

        envelopes.insert(id.to_string(), envelope.clone());
        Ok(())
    }
}
