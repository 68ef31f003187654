use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use uuid::Uuid;

use crate::blob::{BlobStore, NewBlob};

/// Blob store on S3-compatible object storage. Folders are key prefixes in
/// a single bucket and blob ids are full object keys.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
}

impl StorageConfig {
    /// Default public URL for objects when no template is configured.
    pub fn default_url_template(&self) -> String {
        format!("{}/{}/{{id}}", self.endpoint.trim_end_matches('/'), self.bucket)
    }
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "evaluation-ingest",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        }
    }

    async fn head_bucket(&self) -> Result<(), String> {
        self.client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .map_err(|err| format!("bucket {} unreachable: {err}", self.bucket))?;
        Ok(())
    }
}

fn object_key(folder_id: &str, name: &str) -> String {
    format!(
        "{}/{}/{}",
        folder_id.trim_matches('/'),
        Uuid::new_v4().simple(),
        name
    )
}

#[async_trait]
impl BlobStore for StorageClient {
    async fn resolve_folder(&self, _folder_id: &str) -> Result<(), String> {
        // Prefixes exist implicitly once the bucket does.
        self.head_bucket().await
    }

    async fn create_blob(&self, folder_id: &str, blob: NewBlob) -> Result<String, String> {
        let key = object_key(folder_id, &blob.name);
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .content_type(blob.content_type)
            .body(ByteStream::from(blob.bytes))
            .send()
            .await
            .map_err(|err| format!("put object failed: {err}"))?;
        Ok(key)
    }

    async fn share_public_read(&self, blob_id: &str) -> Result<(), String> {
        self.client
            .put_object_acl()
            .bucket(self.bucket.as_str())
            .key(blob_id)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|err| format!("put object acl failed: {err}"))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), String> {
        self.head_bucket().await
    }
}
