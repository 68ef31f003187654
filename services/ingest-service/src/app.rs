use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, healthz, ingest, readyz, sheet_url, status};
use crate::state::AppState;

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(status).post(ingest))
        .route("/v1/status", get(status))
        .route("/v1/ingest", post(ingest))
        .route("/v1/sheet-url", get(sheet_url))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        // Screenshots arrive inline as base64, well above axum's 2MB default.
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::config::IngestConfig;
    use crate::models::{Cell, SHEET_NAME};
    use crate::tabular::{MemoryTabularStore, TabularStore};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    /// A tabular store whose backend cannot be reached.
    struct OfflineSheets;

    #[async_trait]
    impl TabularStore for OfflineSheets {
        async fn open_document(&self, _: &str) -> Result<(), String> {
            Err("connection refused".to_string())
        }

        async fn find_sheet(&self, _: &str, _: &str) -> Result<bool, String> {
            Err("connection refused".to_string())
        }

        async fn create_sheet(&self, _: &str, _: &str, _: &[&str]) -> Result<bool, String> {
            Err("connection refused".to_string())
        }

        async fn append_row(&self, _: &str, _: &str, _: &[Cell]) -> Result<(), String> {
            Err("connection refused".to_string())
        }

        async fn ping(&self) -> Result<(), String> {
            Err("connection refused".to_string())
        }
    }

    fn offline_router() -> Router {
        let config = IngestConfig::for_tests();
        let blobs = Arc::new(MemoryBlobStore::with_folder(&config.folder_id));
        build_router(AppState::new(config, Arc::new(OfflineSheets), blobs), 1024)
    }

    fn router(max_body_bytes: usize) -> (Router, Arc<MemoryTabularStore>) {
        let config = IngestConfig::for_tests();
        let tabular = Arc::new(MemoryTabularStore::with_document(&config.document_id));
        let blobs = Arc::new(MemoryBlobStore::with_folder(&config.folder_id));
        let state = AppState::new(config, tabular.clone(), blobs);
        (build_router(state, max_body_bytes), tabular)
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn records_evaluation_over_http() {
        let (router, tabular) = router(1024 * 1024);
        let (status, body) = call(
            router,
            post("/", r#"{"url":"https://test.com","total_score":0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(tabular.rows("doc-test", SHEET_NAME).await.len(), 2);
    }

    #[tokio::test]
    async fn empty_body_still_answers_200() {
        let (router, _) = router(1024);
        let (status, body) = call(router, post("/v1/ingest", Body::empty())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "malformed_request");
        assert_eq!(body["error"], "malformed request: no request body received");
    }

    #[tokio::test]
    async fn oversized_body_is_reported_in_band() {
        let (router, _) = router(16);
        let payload = format!(r#"{{"url":"https://{}.com","total_score":1}}"#, "a".repeat(64));
        let (status, body) = call(router, post("/", payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "malformed_request");
    }

    #[tokio::test]
    async fn status_reports_time() {
        let (router, _) = router(1024);
        let request = Request::get("/").body(Body::empty()).unwrap();
        let (status, body) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn health_lists_each_store() {
        let (router, _) = router(1024);
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (_, body) = call(router, request).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["tabular_store"], true);
        assert_eq!(body["services"]["blob_store"], true);
    }

    #[tokio::test]
    async fn unreachable_store_fails_readiness() {
        let request = Request::get("/readyz").body(Body::empty()).unwrap();
        let (status, _) = call(offline_router(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let request = Request::get("/healthz").body(Body::empty()).unwrap();
        let (status, _) = call(offline_router(), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_degraded_when_a_store_is_down() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(offline_router(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["services"]["tabular_store"], false);
        assert_eq!(body["services"]["blob_store"], true);
    }

    #[tokio::test]
    async fn offline_store_is_reported_in_band() {
        let (status, body) = call(
            offline_router(),
            post("/", r#"{"url":"https://test.com","total_score":1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "store_unavailable");
    }

    #[tokio::test]
    async fn sheet_url_is_served_when_configured() {
        let (router, _) = router(1024);
        let request = Request::get("/v1/sheet-url").body(Body::empty()).unwrap();
        let (status, body) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["sheets_url"],
            "https://docs.google.com/spreadsheets/d/doc-test/edit"
        );
    }

    #[tokio::test]
    async fn sheet_url_is_not_found_when_unset() {
        let config = IngestConfig {
            sheets_public_url: None,
            ..IngestConfig::for_tests()
        };
        let tabular = Arc::new(MemoryTabularStore::with_document(&config.document_id));
        let blobs = Arc::new(MemoryBlobStore::with_folder(&config.folder_id));
        let router = build_router(AppState::new(config, tabular, blobs), 1024);
        let request = Request::get("/v1/sheet-url").body(Body::empty()).unwrap();
        let (status, body) = call(router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "sheet URL not configured");
    }
}
