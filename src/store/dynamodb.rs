use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::Store;
use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as AwsDynamoDbClient;
use std::collections::HashMap;

// DynamoDB attribute names
const PARTITION_KEY: &str = "id";
const KEYS_ATTRIBUTE: &str = "keys";

/// DynamoDB implementation of the Store trait
///
/// Each item is `{ id: S, keys: M { <region>: S <base64 ciphertext> } }`.
/// Reads are strongly consistent and writes are conditional on the id not
/// existing, which is what makes the commit race between concurrent
/// resolutions safe.
pub struct DynamoDbStore {
    /// AWS SDK DynamoDB client
    client: AwsDynamoDbClient,

    /// Table holding one item per id
    table_name: String,
}

impl std::fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoDbStore {
    /// Creates a new DynamoDbStore from an existing SDK client
    pub fn new(client: AwsDynamoDbClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a store for `region` and `table_name` from the default
    /// environment configuration chain
    pub async fn from_env(region: &str, table_name: impl Into<String>) -> Self {
        let config = aws_config::from_env()
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self::new(AwsDynamoDbClient::new(&config), table_name)
    }

    /// Returns the table name for this store
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Converts a DynamoDB item to an Envelope
    fn decode_item(item: &HashMap<String, AttributeValue>) -> Result<Envelope> {
        let keys = item
            .get(KEYS_ATTRIBUTE)
            .and_then(|av| av.as_m().ok())
            .ok_or_else(|| Error::Store("missing or invalid keys attribute".into()))?;

        let mut envelope = Envelope::new();
        for (region, value) in keys {
            let ciphertext = value.as_s().map_err(|_| {
                Error::Store(format!("ciphertext for region {} is not a string", region))
            })?;
            envelope.insert(region.clone(), ciphertext.clone());
        }

        Ok(envelope)
    }

    /// Converts an Envelope to a DynamoDB item
    fn encode_item(id: &str, envelope: &Envelope) -> HashMap<String, AttributeValue> {
        let keys = envelope
            .iter()
            .map(|(region, ciphertext)| (region.clone(), AttributeValue::S(ciphertext.clone())))
            .collect();

        let mut item = HashMap::new();
        item.insert(PARTITION_KEY.to_string(), AttributeValue::S(id.to_string()));
        item.insert(KEYS_ATTRIBUTE.to_string(), AttributeValue::M(keys));
        item
    }
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn get_encrypted_data_keys(&self, id: &str) -> Result<Option<Envelope>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Error::Store(format!("DynamoDB get_item error: {}", e)))?;

        match result.item() {
            Some(item) => Ok(Some(Self::decode_item(item)?)),
            None => Ok(None),
        }
    }

    async fn put_encrypted_data_keys_if_absent(
        &self,
        id: &str,
        envelope: &Envelope,
    ) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::encode_item(id, envelope)))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| {
                // A conditional check failure is the contended-insert signal;
                // anything else, including transport failures that never
                // reached the service, is a store error.
                let conflict = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if conflict {
                    Error::IdAlreadyExists(id.to_string())
                } else {
                    Error::Store(format!("DynamoDB put_item error: {}", e))
                }
            })?;

        Ok(())
    }
}
