//! The resolution engine
//!
//! [`Rkms`] maps an id to its plaintext data key. A stored envelope is
//! decrypted by racing every region and taking the first answer; a missing
//! envelope is filled by generating a key in the first reachable region,
//! encrypting it in all the others, and committing the complete set with a
//! conditional insert. Losing that insert means another request created the
//! key concurrently, so the resolver simply looks the envelope up again.

use crate::cancel::CancelToken;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::kms::GeneratedDataKey;
use crate::{KmsClient, Store};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use zeroize::{Zeroize, Zeroizing};

/// Maximum number of attempts to resolve a data key within one request.
/// Only a lost conditional write triggers another attempt; under a store
/// with a conforming put-if-absent the second attempt already succeeds.
pub const MAX_GET_PLAINTEXT_DATA_KEY_TRIES: usize = 3;

/// Minimum number of regions required for redundancy
pub const MIN_REGIONS: usize = 3;

/// One region's KMS handle: name, master key id, and client
#[derive(Clone)]
struct RegionalKms {
    region: String,
    key_id: String,
    client: Arc<dyn KmsClient>,
}

impl fmt::Debug for RegionalKms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionalKms")
            .field("region", &self.region)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl RegionalKms {
    async fn generate_data_key(&self, num_bytes: usize) -> Result<GeneratedDataKey> {
        self.client.generate_data_key(&self.key_id, num_bytes).await
    }

    async fn encrypt_key(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.client.encrypt(&self.key_id, plaintext).await
    }

    async fn decrypt_key(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.client.decrypt(ciphertext).await
    }
}

/// Redundant KMS resolver
///
/// Holds only immutable configuration; concurrent resolutions share one
/// instance without contention. The region order given at construction is
/// the order in which generation is attempted on a miss.
pub struct Rkms {
    regions: Vec<RegionalKms>,
    store: Arc<dyn Store>,
    data_key_size: usize,
}

impl fmt::Debug for Rkms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rkms")
            .field("regions", &self.regions)
            .field("store", &self.store)
            .field("data_key_size", &self.data_key_size)
            .finish()
    }
}

impl Rkms {
    /// Creates a resolver over the given regions.
    ///
    /// `regions` is ordered; `key_ids` and `clients` must cover exactly the
    /// same region names. Fewer than [`MIN_REGIONS`] regions, a missing key
    /// id, or a missing client is rejected.
    pub fn new(
        regions: Vec<String>,
        key_ids: HashMap<String, String>,
        clients: HashMap<String, Arc<dyn KmsClient>>,
        store: Arc<dyn Store>,
        data_key_size: usize,
    ) -> Result<Self> {
        if regions.len() < MIN_REGIONS {
            return Err(Error::InvalidArgument(format!(
                "at least {} regions are required, got {}",
                MIN_REGIONS,
                regions.len()
            )));
        }

        if data_key_size == 0 {
            return Err(Error::InvalidArgument(
                "data key size must be greater than zero".to_string(),
            ));
        }

        let mut regional = Vec::with_capacity(regions.len());
        for region in regions {
            let key_id = key_ids.get(&region).cloned().ok_or_else(|| {
                Error::InvalidArgument(format!("no key id configured for region {}", region))
            })?;
            let client = clients.get(&region).cloned().ok_or_else(|| {
                Error::InvalidArgument(format!("no KMS client configured for region {}", region))
            })?;

            regional.push(RegionalKms {
                region,
                key_id,
                client,
            });
        }

        Ok(Self {
            regions: regional,
            store,
            data_key_size,
        })
    }

    /// Returns the plaintext data key for `id`, base64 encoded.
    ///
    /// The first call for an id creates its key; every later call returns
    /// byte-identical plaintext. Cancelling `ctx` aborts the resolution at
    /// the next suspension point with [`Error::Cancelled`].
    pub async fn get_plaintext_data_key(&self, ctx: &CancelToken, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(Error::InvalidArgument("id must not be empty".to_string()));
        }

        let mut last_conflict = None;
        for _ in 0..MAX_GET_PLAINTEXT_DATA_KEY_TRIES {
            match self.resolve_once(ctx, id).await {
                Ok(plaintext) => {
                    // The wrapper wipes the plaintext when it drops here.
                    return Ok(STANDARD.encode(plaintext.as_slice()));
                }
                Err(err @ Error::IdAlreadyExists(_)) => {
                    log::debug!(
                        "conditional write for {} lost to a concurrent request, retrying lookup",
                        id
                    );
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        // Reachable only with a store that keeps reporting a conflict while
        // a strongly consistent read sees nothing for the id.
        let last_conflict = last_conflict
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no conditional write was attempted".to_string());
        Err(Error::Internal(format!(
            "exhausted {} attempts to resolve a data key for {}: {}",
            MAX_GET_PLAINTEXT_DATA_KEY_TRIES, id, last_conflict
        )))
    }

    /// One pass of the resolution state machine: lookup, then either
    /// decrypt the stored envelope or create and commit a new one.
    async fn resolve_once(&self, ctx: &CancelToken, id: &str) -> Result<Zeroizing<Vec<u8>>> {
        let existing = self
            .race(ctx, self.store.get_encrypted_data_keys(id))
            .await?;

        if let Some(envelope) = existing {
            return self.decrypt_first_success(ctx, &envelope).await;
        }

        log::debug!("no envelope stored for {}, creating a new data key", id);

        let (origin, data_key) = self.generate_in_first_region(ctx).await?;
        let envelope = self
            .encrypt_in_remaining_regions(ctx, origin, &data_key)
            .await?;

        self.race(
            ctx,
            self.store.put_encrypted_data_keys_if_absent(id, &envelope),
        )
        .await?;

        Ok(Zeroizing::new(data_key.plaintext))
    }

    /// Races every region to decrypt its envelope entry and returns the
    /// first plaintext, cancelling the losers. Plaintexts cross the result
    /// channel wrapped in [`Zeroizing`], so a loser's decrypted key is
    /// wiped when the drained channel drops.
    async fn decrypt_first_success(
        &self,
        ctx: &CancelToken,
        envelope: &Envelope,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::channel(self.regions.len());

        let mut last_err = None;
        let mut outstanding = 0;
        for regional in &self.regions {
            let Some(encoded) = envelope.get(&regional.region) else {
                log::debug!("no encrypted data key for region {}", regional.region);
                last_err = Some(Error::Kms(format!(
                    "no encrypted data key for region {}",
                    regional.region
                )));
                continue;
            };

            outstanding += 1;
            let regional = regional.clone();
            let encoded = encoded.to_string();
            let cancel = cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = match STANDARD.decode(&encoded) {
                    Ok(ciphertext) => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return,
                            result = regional.decrypt_key(&ciphertext) => result,
                        }
                    }
                    Err(e) => Err(Error::Kms(format!(
                        "invalid base64 ciphertext for region {}: {}",
                        regional.region, e
                    ))),
                };

                let _ = tx.send((regional.region, result.map(Zeroizing::new))).await;
            });
        }
        drop(tx);

        while outstanding > 0 {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    cancel.cancel();
                    return Err(Error::Cancelled);
                }
                message = rx.recv() => match message {
                    Some((_, Ok(plaintext))) => {
                        cancel.cancel();
                        return Ok(plaintext);
                    }
                    Some((region, Err(e))) => {
                        log::debug!("failed to decrypt data key in region {}: {}", region, e);
                        last_err = Some(e);
                        outstanding -= 1;
                    }
                    None => break,
                }
            }
        }

        let last_err = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "envelope holds no encrypted data keys".to_string());
        Err(Error::DecryptExhausted(last_err))
    }

    /// Generates a new data key in the first region that can, in configured
    /// order, and returns that origin region's index along with the key.
    async fn generate_in_first_region(
        &self,
        ctx: &CancelToken,
    ) -> Result<(usize, GeneratedDataKey)> {
        let mut last_err = None;
        for (index, regional) in self.regions.iter().enumerate() {
            match self
                .race(ctx, regional.generate_data_key(self.data_key_size))
                .await
            {
                Ok(data_key) => return Ok((index, data_key)),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    log::debug!(
                        "error generating data key in region {}, trying next region: {}",
                        regional.region,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        let last_err = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no regions configured".to_string());
        Err(Error::GenerateExhausted(last_err))
    }

    /// Encrypts the new data key in every region except the origin,
    /// concurrently, and assembles the complete envelope. Any regional
    /// failure aborts the attempt: a partial envelope is never committed.
    async fn encrypt_in_remaining_regions(
        &self,
        ctx: &CancelToken,
        origin: usize,
        data_key: &GeneratedDataKey,
    ) -> Result<Envelope> {
        let mut envelope = Envelope::new();
        envelope.insert(
            self.regions[origin].region.clone(),
            STANDARD.encode(&data_key.ciphertext),
        );

        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::channel(self.regions.len());

        let mut outstanding = 0;
        for (index, regional) in self.regions.iter().enumerate() {
            if index == origin {
                continue;
            }

            outstanding += 1;
            let regional = regional.clone();
            let mut plaintext = data_key.plaintext.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = regional.encrypt_key(&plaintext) => Some(result),
                };
                plaintext.zeroize();

                if let Some(result) = result {
                    let _ = tx.send((regional.region, result)).await;
                }
            });
        }
        drop(tx);

        while outstanding > 0 {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    cancel.cancel();
                    return Err(Error::Cancelled);
                }
                message = rx.recv() => match message {
                    Some((region, Ok(ciphertext))) => {
                        envelope.insert(region, STANDARD.encode(&ciphertext));
                        outstanding -= 1;
                    }
                    Some((region, Err(e))) => {
                        cancel.cancel();
                        return Err(Error::EncryptFailed(format!(
                            "failed to encrypt data key in region {}: {}",
                            region, e
                        )));
                    }
                    None => break,
                }
            }
        }

        Ok(envelope)
    }

    /// Races a store or KMS call against the caller's cancellation token.
    async fn race<T>(
        &self,
        ctx: &CancelToken,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            result = operation => result,
        }
    }
}
