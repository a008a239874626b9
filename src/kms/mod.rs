//! Key management service clients
//!
//! One [`KmsClient`](crate::KmsClient) instance serves one region. The AWS
//! implementation lives in [`aws`]; tests substitute their own mock
//! implementations of the same trait.

mod aws;

pub use aws::AwsKmsClient;

/// Result of generating a new data key in one region
#[derive(Clone, Debug)]
pub struct GeneratedDataKey {
    /// The plaintext data key
    pub plaintext: Vec<u8>,

    /// The generating region's ciphertext of the data key
    pub ciphertext: Vec<u8>,
}
