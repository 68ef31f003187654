use std::{future::Future, sync::Arc};

use crate::blob::BlobStore;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::tabular::TabularStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IngestConfig>,
    pub tabular: Arc<dyn TabularStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(
        config: IngestConfig,
        tabular: Arc<dyn TabularStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            tabular,
            blobs,
        }
    }

    /// Runs one store call under the configured timeout. Store failures and
    /// timeouts both surface as `StoreUnavailable`.
    pub async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, IngestError>
    where
        F: Future<Output = Result<T, String>>,
    {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(IngestError::StoreUnavailable(format!("{operation}: {err}"))),
            Err(_) => Err(IngestError::StoreUnavailable(format!(
                "{operation} timed out after {}ms",
                self.config.store_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::tabular::MemoryTabularStore;
    use std::time::Duration;

    fn state() -> AppState {
        let mut config = IngestConfig::for_tests();
        config.store_timeout = Duration::from_millis(20);
        AppState::new(
            config,
            Arc::new(MemoryTabularStore::default()),
            Arc::new(MemoryBlobStore::default()),
        )
    }

    #[tokio::test]
    async fn stalled_store_call_times_out() {
        let err = state()
            .store_call("append row", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::StoreUnavailable("append row timed out after 20ms".to_string())
        );
    }

    #[tokio::test]
    async fn store_error_names_the_operation() {
        let err = state()
            .store_call("open document", async { Err::<(), _>("connection refused".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::StoreUnavailable("open document: connection refused".to_string())
        );
    }
}
