mod app;
mod blob;
mod config;
mod db;
mod dispatch;
mod error;
mod handlers;
mod images;
mod models;
mod recorder;
mod state;
mod storage;
mod tabular;

use ingest_common::{bind_listener, env_opt, env_or, init_tracing, shutdown_signal};
use std::sync::Arc;
use tokio_postgres::NoTls;

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::config::{storage_config_from_env, IngestConfig, MEMORY_URL_TEMPLATE};
use crate::db::PostgresTabularStore;
use crate::state::AppState;
use crate::storage::{StorageClient, StorageConfig};
use crate::tabular::{MemoryTabularStore, TabularStore};

#[tokio::main]
async fn main() {
    let guards = init_tracing("ingest-service");

    let result = run().await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "ingest service stopped");
    }
    // Flush the file writer before exiting.
    drop(guards);
    if result.is_err() {
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let port = env_or("PORT", 8080u16);
    let max_body_bytes = env_or("MAX_BODY_BYTES", 20 * 1024 * 1024usize);

    let storage = storage_config_from_env();
    let default_url_template = storage
        .as_ref()
        .map(StorageConfig::default_url_template)
        .unwrap_or_else(|| MEMORY_URL_TEMPLATE.to_string());
    let config = IngestConfig::from_env(&default_url_template);
    let blobs = build_blob_store(storage, &config.folder_id).await;
    let tabular = build_tabular_store(&config.document_id).await?;

    tracing::info!(
        document_id = config.document_id.as_str(),
        folder_id = config.folder_id.as_str(),
        store_timeout_ms = config.store_timeout.as_millis() as u64,
        "ingest service configured"
    );

    let state = AppState::new(config, tabular, blobs);
    let app = app::build_router(state, max_body_bytes);
    let listener = bind_listener(port)
        .await
        .map_err(|err| format!("bind port {port} failed: {err}"))?;
    tracing::info!(port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("serve failed: {err}"))
}

async fn build_tabular_store(document_id: &str) -> Result<Arc<dyn TabularStore>, String> {
    let Some(database_url) = env_opt("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, evaluations are kept in memory only");
        return Ok(Arc::new(MemoryTabularStore::with_document(document_id)));
    };

    let (db, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(|err| format!("connect db failed: {err}"))?;
    tokio::spawn(async move {
        // Drive the connection in the background.
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection error");
        }
    });

    let store = PostgresTabularStore::new(db);
    store.ensure_schema(document_id).await?;
    Ok(Arc::new(store))
}

async fn build_blob_store(storage: Option<StorageConfig>, folder_id: &str) -> Arc<dyn BlobStore> {
    match storage {
        Some(storage) => Arc::new(StorageClient::new(storage).await),
        None => {
            tracing::warn!("MINIO_* not set, screenshots are kept in memory only");
            Arc::new(MemoryBlobStore::with_folder(folder_id))
        }
    }
}
