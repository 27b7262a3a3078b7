use anyhow::Result;
use bytes::Bytes;
use futures::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dog_datastore::prelude::*;
use dog_datastore::{shutdown_signal, S3Backend, S3Config};

/// Opens the configured datastore, holds the repo lock until a termination
/// signal arrives, then releases it.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DatastoreConfig::from_env();
    let backend = S3Backend::connect(S3Config::from_env()).await;
    let store = BlobDatastore::new(backend, config);
    store.open().await?;

    let handle = store.repo_lock().lock("/").await?;

    let key = Key::new("/repo-lock/heartbeat");
    store.put(&key, Bytes::from_static(b"alive")).await?;

    let mut keys = store
        .query(Query::new().with_prefix("/repo-lock").keys_only())
        .await?;
    while let Some(entry) = keys.next().await {
        info!("Found {}", entry?.key);
    }

    info!("Holding repo lock, press Ctrl-C to release");
    handle.release_on(shutdown_signal()).await;

    store.close().await?;
    Ok(())
}
