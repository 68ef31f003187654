use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

pub struct NewBlob {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object store with folders, store-assigned ids and link sharing.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn resolve_folder(&self, folder_id: &str) -> Result<(), String>;

    /// Persists the blob under `folder_id` and returns the id the store
    /// assigned to it.
    async fn create_blob(&self, folder_id: &str, blob: NewBlob) -> Result<String, String>;

    /// Anyone holding the link may read; nobody gains write access.
    async fn share_public_read(&self, blob_id: &str) -> Result<(), String>;

    async fn ping(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub folder_id: String,
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub public: bool,
}

#[derive(Default)]
struct MemoryBlobs {
    folders: HashSet<String>,
    blobs: HashMap<String, StoredBlob>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<MemoryBlobs>,
}

impl MemoryBlobStore {
    pub fn with_folder(folder_id: &str) -> Self {
        let mut blobs = MemoryBlobs::default();
        blobs.folders.insert(folder_id.to_string());
        Self {
            inner: Mutex::new(blobs),
        }
    }

    #[cfg(test)]
    pub async fn blob(&self, blob_id: &str) -> Option<StoredBlob> {
        self.inner.lock().await.blobs.get(blob_id).cloned()
    }

    #[cfg(test)]
    pub async fn blob_count(&self) -> usize {
        self.inner.lock().await.blobs.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn resolve_folder(&self, folder_id: &str) -> Result<(), String> {
        if self.inner.lock().await.folders.contains(folder_id) {
            Ok(())
        } else {
            Err(format!("folder {folder_id} not found"))
        }
    }

    async fn create_blob(&self, folder_id: &str, blob: NewBlob) -> Result<String, String> {
        let mut inner = self.inner.lock().await;
        if !inner.folders.contains(folder_id) {
            return Err(format!("folder {folder_id} not found"));
        }
        inner.next_id += 1;
        let blob_id = format!("blob-{:06}", inner.next_id);
        inner.blobs.insert(
            blob_id.clone(),
            StoredBlob {
                folder_id: folder_id.to_string(),
                name: blob.name,
                content_type: blob.content_type,
                bytes: blob.bytes,
                public: false,
            },
        );
        Ok(blob_id)
    }

    async fn share_public_read(&self, blob_id: &str) -> Result<(), String> {
        let mut inner = self.inner.lock().await;
        let blob = inner
            .blobs
            .get_mut(blob_id)
            .ok_or_else(|| format!("blob {blob_id} not found"))?;
        if !blob.public {
            blob.public = true;
            tracing::debug!(
                blob_id,
                folder_id = blob.folder_id.as_str(),
                name = blob.name.as_str(),
                content_type = blob.content_type.as_str(),
                size = blob.bytes.len(),
                "in-memory blob shared"
            );
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Renders a retrieval URL by substituting `{id}` in `template`.
pub fn public_url(template: &str, blob_id: &str) -> String {
    template.replace("{id}", blob_id)
}
