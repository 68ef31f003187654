use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::blob::{public_url, NewBlob};
use crate::error::IngestError;
use crate::models::{ImageUploadPayload, ImageUploaded};
use crate::state::AppState;

const BASE64_MARKER: &str = ";base64,";

/// A `data:<mime>;base64,<payload>` string split into its parts. The payload
/// has had whitespace stripped but is not yet decoded.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub payload: String,
}

impl DataUri {
    pub fn parse(value: &str) -> Result<Self, IngestError> {
        let invalid = |reason: &str| {
            IngestError::Validation(format!(
                "image_base64 must look like data:<mime-type>;base64,<payload> ({reason})"
            ))
        };

        let rest = value
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing data: prefix"))?;
        let (header, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| invalid("missing ;base64, marker"))?;

        // Parameters such as `;charset=` may precede the marker.
        let mime_type = header.split(';').next().unwrap_or_default().trim();
        if !is_mime_type(mime_type) {
            return Err(invalid("mime type is empty or malformed"));
        }

        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if payload.is_empty() {
            return Err(invalid("payload is empty"));
        }
        if !payload
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        {
            return Err(invalid("payload contains non-base64 characters"));
        }

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            payload,
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, IngestError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|err| IngestError::Decode(format!("image payload is not valid base64: {err}")))
    }

    pub fn file_name(&self) -> String {
        format!("screenshot.{}", extension_for(&self.mime_type))
    }
}

fn is_mime_type(value: &str) -> bool {
    let token = |part: &str| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&^_.+-".contains(&b))
    };
    matches!(value.split_once('/'), Some((kind, subtype)) if token(kind) && token(subtype))
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

pub async fn ingest_image(
    state: &AppState,
    payload: ImageUploadPayload,
) -> Result<ImageUploaded, IngestError> {
    let data_uri = payload
        .image_base64
        .ok_or_else(|| IngestError::Validation("image_base64 must be a data URI string".to_string()))
        .and_then(|value| DataUri::parse(&value))?;
    let bytes = data_uri.decode()?;
    let size = bytes.len();
    let folder_id = state.config.folder_id.as_str();
    let store = state.blobs.as_ref();

    state
        .store_call("resolve folder", store.resolve_folder(folder_id))
        .await?;

    let blob = NewBlob {
        name: data_uri.file_name(),
        content_type: data_uri.mime_type.clone(),
        bytes,
    };
    let blob_id = state
        .store_call("create blob", store.create_blob(folder_id, blob))
        .await?;

    // No rollback: a blob whose sharing fails stays private in the folder.
    state
        .store_call("share blob", store.share_public_read(&blob_id))
        .await?;

    let url = public_url(&state.config.url_template, &blob_id);
    tracing::info!(
        blob_id = blob_id.as_str(),
        mime_type = data_uri.mime_type.as_str(),
        size,
        "image stored"
    );

    Ok(ImageUploaded { success: true, url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{BlobStore, MemoryBlobStore};
    use crate::config::IngestConfig;
    use crate::tabular::MemoryTabularStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Stores blobs in memory but refuses to share them.
    struct PrivateOnly(Arc<MemoryBlobStore>);

    #[async_trait]
    impl BlobStore for PrivateOnly {
        async fn resolve_folder(&self, folder_id: &str) -> Result<(), String> {
            self.0.resolve_folder(folder_id).await
        }

        async fn create_blob(&self, folder_id: &str, blob: NewBlob) -> Result<String, String> {
            self.0.create_blob(folder_id, blob).await
        }

        async fn share_public_read(&self, _blob_id: &str) -> Result<(), String> {
            Err("acl denied".to_string())
        }

        async fn ping(&self) -> Result<(), String> {
            self.0.ping().await
        }
    }

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn png_data_uri() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(PNG_MAGIC))
    }

    fn setup() -> (AppState, Arc<MemoryBlobStore>) {
        let config = IngestConfig::for_tests();
        let blobs = Arc::new(MemoryBlobStore::with_folder(&config.folder_id));
        let state = AppState::new(config, Arc::new(MemoryTabularStore::default()), blobs.clone());
        (state, blobs)
    }

    #[test]
    fn parses_mime_and_strips_whitespace() {
        let uri = DataUri::parse("data:image/JPEG;base64,iVBO\nRw0K").unwrap();
        assert_eq!(uri.mime_type, "image/jpeg");
        assert_eq!(uri.payload, "iVBORw0K");
        assert_eq!(uri.file_name(), "screenshot.jpg");
    }

    #[test]
    fn accepts_mime_parameters() {
        let uri = DataUri::parse("data:image/svg+xml;charset=utf-8;base64,PHN2Zy8+").unwrap();
        assert_eq!(uri.mime_type, "image/svg+xml");
        assert_eq!(uri.decode().unwrap(), b"<svg/>");
    }

    #[test]
    fn rejects_strings_outside_the_pattern() {
        for value in [
            "iVBORw0KGgo=",
            "data:;base64,iVBORw0KGgo=",
            "data:image/png,iVBORw0KGgo=",
            "data:image/png;base64,",
            "data:image/png;base64,not*base64",
            "data:png;base64,iVBORw0KGgo=",
        ] {
            let err = DataUri::parse(value).unwrap_err();
            assert_eq!(err.kind(), "validation_error", "{value}");
        }
    }

    #[test]
    fn bad_padding_is_a_decode_error() {
        let uri = DataUri::parse("data:image/png;base64,A").unwrap();
        assert_eq!(uri.decode().unwrap_err().kind(), "decode_error");
    }

    #[test]
    fn unknown_mime_gets_neutral_extension() {
        assert_eq!(extension_for("application/pdf"), "bin");
        assert_eq!(extension_for("image/webp"), "webp");
    }

    #[tokio::test]
    async fn stores_public_blob_and_returns_its_url() {
        let (state, blobs) = setup();
        let uploaded = ingest_image(
            &state,
            ImageUploadPayload {
                image_base64: Some(png_data_uri()),
            },
        )
        .await
        .unwrap();

        assert!(uploaded.success);
        assert_eq!(uploaded.url, "https://drive.google.com/uc?id=blob-000001");
        let stored = blobs.blob("blob-000001").await.unwrap();
        assert_eq!(stored.bytes, PNG_MAGIC);
        assert_eq!(stored.name, "screenshot.png");
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.folder_id, "folder-test");
        assert!(stored.public);
    }

    #[tokio::test]
    async fn missing_folder_creates_nothing() {
        let config = IngestConfig::for_tests();
        let blobs = Arc::new(MemoryBlobStore::with_folder("other-folder"));
        let state = AppState::new(config, Arc::new(MemoryTabularStore::default()), blobs.clone());
        let err = ingest_image(
            &state,
            ImageUploadPayload {
                image_base64: Some(png_data_uri()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "store_unavailable");
        assert_eq!(blobs.blob_count().await, 0);
    }

    #[tokio::test]
    async fn null_image_is_a_validation_error() {
        let (state, _) = setup();
        let err = ingest_image(&state, ImageUploadPayload { image_base64: None })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn failed_share_keeps_private_blob() {
        let config = IngestConfig::for_tests();
        let blobs = Arc::new(MemoryBlobStore::with_folder(&config.folder_id));
        let state = AppState::new(
            config,
            Arc::new(MemoryTabularStore::default()),
            Arc::new(PrivateOnly(blobs.clone())),
        );
        let err = ingest_image(
            &state,
            ImageUploadPayload {
                image_base64: Some(png_data_uri()),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            IngestError::StoreUnavailable("share blob: acl denied".to_string())
        );
        assert_eq!(blobs.blob_count().await, 1);
        let stored = blobs.blob("blob-000001").await.unwrap();
        assert!(!stored.public);
        assert_eq!(stored.bytes, PNG_MAGIC);
    }
}
