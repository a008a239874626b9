//! # rkms
//!
//! A redundant key-management service. For any caller-supplied id, `rkms`
//! returns the same 256-bit plaintext data encryption key forever, backed by
//! N independent regional KMS master keys and a single strongly consistent
//! key/value store. The key stays recoverable as long as any one region and
//! the store survive.
//!
//! On the first request for an id, a data key is generated in the first
//! reachable region, encrypted under every other region's master key, and
//! the full set of ciphertexts is committed to the store in one conditional
//! insert. Every later request decrypts the stored envelope in whichever
//! region answers first.
//!
//! ## Basic usage
//!
//! ```rust,no_run
//! use rkms::cancel::CancelToken;
//! use rkms::kms::AwsKmsClient;
//! use rkms::resolver::Rkms;
//! use rkms::store::DynamoDbStore;
//! use rkms::KmsClient;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> rkms::Result<()> {
//! let regions = vec![
//!     "us-west-2".to_string(),
//!     "us-east-1".to_string(),
//!     "eu-west-1".to_string(),
//! ];
//!
//! let mut key_ids = HashMap::new();
//! let mut clients: HashMap<String, Arc<dyn KmsClient>> = HashMap::new();
//! for region in &regions {
//!     key_ids.insert(region.clone(), format!("alias/rkms-{}", region));
//!     clients.insert(region.clone(), Arc::new(AwsKmsClient::from_env(region).await));
//! }
//!
//! let store = Arc::new(DynamoDbStore::from_env("us-west-2", "rkms-keys").await);
//! let rkms = Rkms::new(regions, key_ids, clients, store, 32)?;
//!
//! let ctx = CancelToken::new();
//! let key = rkms.get_plaintext_data_key(&ctx, "user-123").await?;
//! println!("data key: {}", key);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod envelope;
pub mod error;
pub mod kms;
pub mod resolver;
pub mod server;
pub mod store;


pub use crate::cancel::CancelToken;
pub use crate::envelope::Envelope;
pub use crate::error::{Error, Result};
pub use crate::kms::GeneratedDataKey;
pub use crate::resolver::{Rkms, MAX_GET_PLAINTEXT_DATA_KEY_TRIES, MIN_REGIONS};

use async_trait::async_trait;
use std::fmt;

/// Default size of generated data keys in bytes (a 256-bit key)
pub const DEFAULT_DATA_KEY_SIZE_IN_BYTES: usize = 32;

/// A single region's key management service
///
/// One implementation exists per configured region. All payloads are raw
/// bytes; base64 is applied only at the store and response boundaries.
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// Generates a new data key of `num_bytes` under the master key `key_id`,
    /// returning both the plaintext and this region's ciphertext of it
    async fn generate_data_key(&self, key_id: &str, num_bytes: usize) -> Result<GeneratedDataKey>;

    /// Encrypts a data key under the master key `key_id`
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts a ciphertext produced by this region
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Strongly consistent key/value store holding one envelope per id
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Strongly consistent read of the envelope stored for `id`
    async fn get_encrypted_data_keys(&self, id: &str) -> Result<Option<Envelope>>;

    /// Atomically stores `envelope` under `id` if, and only if, no envelope
    /// exists yet; a lost race is reported as [`Error::IdAlreadyExists`]
    async fn put_encrypted_data_keys_if_absent(&self, id: &str, envelope: &Envelope)
        -> Result<()>;
}
