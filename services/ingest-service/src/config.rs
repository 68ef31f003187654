use ingest_common::{env_opt, env_or, env_string};
use std::time::Duration;

use crate::storage::StorageConfig;

pub const MEMORY_URL_TEMPLATE: &str = "memory://blobs/{id}";

/// Deployment identifiers and limits handed to the handlers at startup.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub document_id: String,
    pub folder_id: String,
    pub url_template: String,
    pub store_timeout: Duration,
    /// Human-facing link to the evaluations sheet, if one is published.
    pub sheets_public_url: Option<String>,
}

impl IngestConfig {
    /// `default_url_template` depends on which blob backend is active.
    pub fn from_env(default_url_template: &str) -> Self {
        Self {
            document_id: env_string("SHEETS_DOCUMENT_ID", "evaluations"),
            folder_id: env_string("BLOB_FOLDER_ID", "screenshots"),
            url_template: env_string("BLOB_PUBLIC_URL_TEMPLATE", default_url_template),
            store_timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 10_000u64)),
            sheets_public_url: env_opt("SHEETS_PUBLIC_URL"),
        }
    }
}

/// S3 settings, or `None` when the credentials are not configured.
pub fn storage_config_from_env() -> Option<StorageConfig> {
    Some(StorageConfig {
        endpoint: env_opt("MINIO_ENDPOINT")?,
        access_key: env_opt("MINIO_ACCESS_KEY")?,
        secret_key: env_opt("MINIO_SECRET_KEY")?,
        bucket: env_string("MINIO_BUCKET", "evaluation-screenshots"),
        region: env_string("MINIO_REGION", "us-east-1"),
        force_path_style: env_opt("MINIO_FORCE_PATH_STYLE")
            .map(|value| value != "0")
            .unwrap_or(true),
    })
}

#[cfg(test)]
impl IngestConfig {
    pub fn for_tests() -> Self {
        Self {
            document_id: "doc-test".to_string(),
            folder_id: "folder-test".to_string(),
            url_template: "https://drive.google.com/uc?id={id}".to_string(),
            store_timeout: Duration::from_millis(500),
            sheets_public_url: Some(
                "https://docs.google.com/spreadsheets/d/doc-test/edit".to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_template_falls_back_to_backend_default() {
        std::env::remove_var("BLOB_PUBLIC_URL_TEMPLATE");
        let config = IngestConfig::from_env(MEMORY_URL_TEMPLATE);
        assert_eq!(config.url_template, MEMORY_URL_TEMPLATE);
    }
}
