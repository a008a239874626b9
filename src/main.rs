//! Service entry point: load configuration, wire the regional KMS clients
//! and the DynamoDB store, and serve the key endpoint.

use rkms::config::Config;
use rkms::kms::AwsKmsClient;
use rkms::resolver::Rkms;
use rkms::store::DynamoDbStore;
use rkms::{server, KmsClient, Result};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("rkms: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path =
        std::env::var("RKMS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logger.level.as_str()),
    )
    .init();

    log::info!(
        "loaded configuration from {} ({} regions, table {})",
        config_path,
        config.kms.regions.len(),
        config.dynamodb.table_name
    );

    let mut clients: HashMap<String, Arc<dyn KmsClient>> = HashMap::new();
    for region in &config.kms.regions {
        clients.insert(region.clone(), Arc::new(AwsKmsClient::from_env(region).await));
    }

    let store = Arc::new(
        DynamoDbStore::from_env(&config.dynamodb.region, config.dynamodb.table_name.clone()).await,
    );

    let rkms = Arc::new(Rkms::new(
        config.kms.regions.clone(),
        config.kms.key_ids.clone(),
        clients,
        store,
        config.kms.data_key_size_in_bytes,
    )?);

    server::serve(rkms, &config.server).await
}
