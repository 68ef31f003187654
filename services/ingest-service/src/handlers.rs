use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};

use crate::dispatch::{dispatch, failure};
use crate::error::IngestError;
use crate::models::{
    timestamp_now, HealthResponse, IngestResponse, MessageResponse, ServiceHealth,
    SheetUrlResponse, StatusResponse,
};
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    let services = check_stores(&state).await;
    if services.tabular_store && services.blob_store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = check_stores(&state).await;
    let status = if services.tabular_store && services.blob_store {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse { status, services })
}

pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        timestamp: timestamp_now(),
    })
}

pub async fn sheet_url(
    State(state): State<AppState>,
) -> Result<Json<SheetUrlResponse>, (StatusCode, Json<MessageResponse>)> {
    match &state.config.sheets_public_url {
        Some(url) => Ok(Json(SheetUrlResponse {
            sheets_url: url.clone(),
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(MessageResponse {
                message: "sheet URL not configured",
            }),
        )),
    }
}

/// Always answers 200; the outcome lives in the body's `success` flag.
pub async fn ingest(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<IngestResponse>) {
    let response = match body {
        Ok(bytes) => {
            let body = (!bytes.is_empty()).then_some(bytes.as_ref());
            dispatch(&state, body).await
        }
        Err(rejection) => failure(&IngestError::MalformedRequest(format!(
            "request body could not be read: {}",
            rejection.body_text()
        ))),
    };
    (StatusCode::OK, Json(response))
}

async fn check_stores(state: &AppState) -> ServiceHealth {
    let tabular = state.store_call("ping tabular store", state.tabular.ping());
    let blobs = state.store_call("ping blob store", state.blobs.ping());
    let (tabular, blobs) = tokio::join!(tabular, blobs);
    for err in [&tabular, &blobs].into_iter().filter_map(|result| result.as_ref().err()) {
        tracing::warn!(error = %err, "store ping failed");
    }
    ServiceHealth {
        tabular_store: tabular.is_ok(),
        blob_store: blobs.is_ok(),
    }
}
