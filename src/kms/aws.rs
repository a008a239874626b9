use crate::error::{Error, Result};
use crate::kms::GeneratedDataKey;
use crate::KmsClient;
use async_trait::async_trait;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client as AwsSdkKmsClient;

/// AWS KMS implementation of the [`KmsClient`] trait for a single region
pub struct AwsKmsClient {
    /// AWS SDK KMS client
    client: AwsSdkKmsClient,

    /// AWS region for this client
    region: String,
}

impl AwsKmsClient {
    /// Creates a new AwsKmsClient from an existing SDK client
    pub fn new(client: AwsSdkKmsClient, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Creates a client for `region` from the default environment
    /// configuration chain (credentials, profile, etc.)
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::from_env()
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::new(AwsSdkKmsClient::new(&config), region)
    }

    /// Returns the region for this client
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl KmsClient for AwsKmsClient {
    async fn generate_data_key(&self, key_id: &str, num_bytes: usize) -> Result<GeneratedDataKey> {
        let result = self
            .client
            .generate_data_key()
            .key_id(key_id)
            .number_of_bytes(num_bytes as i32)
            .send()
            .await
            .map_err(|e| {
                Error::Kms(format!(
                    "KMS generate data key error in region {}: {}",
                    self.region, e
                ))
            })?;

        let plaintext = result
            .plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("no plaintext returned from KMS".into()))?;
        let ciphertext = result
            .ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("no ciphertext blob returned from KMS".into()))?;

        Ok(GeneratedDataKey {
            plaintext,
            ciphertext,
        })
    }

    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(Blob::new(plaintext.to_vec()))
            .send()
            .await
            .map_err(|e| {
                Error::Kms(format!(
                    "KMS encrypt error in region {}: {}",
                    self.region, e
                ))
            })?;

        result
            .ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("no ciphertext blob returned from KMS".into()))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        // The key id is deliberately omitted: symmetric ciphertexts carry a
        // reference to the master key that produced them.
        let result = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext.to_vec()))
            .send()
            .await
            .map_err(|e| {
                Error::Kms(format!(
                    "KMS decrypt error in region {}: {}",
                    self.region, e
                ))
            })?;

        result
            .plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("no plaintext returned from KMS".into()))
    }
}
