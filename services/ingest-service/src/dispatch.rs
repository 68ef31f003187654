use serde_json::{Map, Value};

use crate::error::IngestError;
use crate::images::ingest_image;
use crate::models::{timestamp_now, FailureResponse, IngestRequest, IngestResponse};
use crate::recorder::record_evaluation;
use crate::state::AppState;

const IMAGE_FIELD: &str = "image_base64";
const KIND_FIELD: &str = "kind";

/// Runs one inbound body through classification and its handler. Never
/// fails: every error becomes a `{success: false}` response.
pub async fn dispatch(state: &AppState, body: Option<&[u8]>) -> IngestResponse {
    match route(state, body).await {
        Ok(response) => response,
        Err(err) => failure(&err),
    }
}

async fn route(state: &AppState, body: Option<&[u8]>) -> Result<IngestResponse, IngestError> {
    let text = read_body(body)?;
    let value: Value = serde_json::from_str(text)
        .map_err(|err| IngestError::InvalidPayload(format!("body is not valid JSON: {err}")))?;
    let request = classify(value)?;
    tracing::info!(route = request.route(), "request dispatched");

    match request {
        IngestRequest::Evaluation(payload) => record_evaluation(state, payload)
            .await
            .map(IngestResponse::Recorded),
        IngestRequest::Image(payload) => ingest_image(state, payload)
            .await
            .map(IngestResponse::Uploaded),
    }
}

/// Separates "nothing arrived" from "arrived but unusable" before any JSON
/// parsing happens.
pub fn read_body(body: Option<&[u8]>) -> Result<&str, IngestError> {
    let bytes = body.ok_or_else(|| {
        IngestError::MalformedRequest("no request body received".to_string())
    })?;
    let text = std::str::from_utf8(bytes).map_err(|_| {
        IngestError::MalformedRequest("request body is not valid UTF-8".to_string())
    })?;
    if text.trim().is_empty() {
        return Err(IngestError::MalformedRequest(
            "request body is empty".to_string(),
        ));
    }
    Ok(text)
}

/// An explicit `kind` decides the route. Without one, the presence of an
/// `image_base64` key selects the image path.
pub fn classify(value: Value) -> Result<IngestRequest, IngestError> {
    let Value::Object(fields) = value else {
        return Err(IngestError::InvalidPayload(
            "body must be a JSON object".to_string(),
        ));
    };

    let is_image = match fields.get(KIND_FIELD) {
        None | Some(Value::Null) => fields.contains_key(IMAGE_FIELD),
        Some(Value::String(kind)) => match kind.as_str() {
            "image" => true,
            "evaluation" => false,
            other => {
                return Err(IngestError::InvalidPayload(format!(
                    "unknown kind \"{other}\", expected \"evaluation\" or \"image\""
                )))
            }
        },
        Some(_) => {
            return Err(IngestError::InvalidPayload(
                "kind must be a string".to_string(),
            ))
        }
    };

    if is_image {
        decode(fields, "image").map(IngestRequest::Image)
    } else {
        decode(fields, "evaluation").map(IngestRequest::Evaluation)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    fields: Map<String, Value>,
    label: &str,
) -> Result<T, IngestError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|err| IngestError::InvalidPayload(format!("{label} payload: {err}")))
}

pub fn failure(err: &IngestError) -> IngestResponse {
    if err.is_client_error() {
        tracing::warn!(kind = err.kind(), error = %err, "ingest request rejected");
    } else {
        tracing::error!(kind = err.kind(), error = %err, "ingest request failed");
    }
    IngestResponse::Failed(FailureResponse {
        success: false,
        error: err.to_string(),
        kind: err.kind(),
        timestamp: timestamp_now(),
    })
}
