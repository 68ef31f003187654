use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SHEET_NAME: &str = "Evaluaciones";

/// Positional columns of the evaluations sheet. Downstream readers index by
/// position, so this order never changes.
pub const SHEET_HEADER: [&str; 10] = [
    "Timestamp",
    "URL",
    "Puntaje Total",
    "Calificación",
    "Tipografía",
    "Color",
    "Layout",
    "Usabilidad",
    "Screenshot URL",
    "Recomendaciones",
];

pub const RECORDED_MESSAGE: &str = "Evaluación registrada exitosamente";

pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Deserialize)]
pub struct EvaluationPayload {
    pub timestamp: Option<String>,
    pub url: Option<String>,
    pub total_score: Option<f64>,
    pub grade: Option<String>,
    pub typography_score: Option<f64>,
    pub color_score: Option<f64>,
    pub layout_score: Option<f64>,
    pub usability_score: Option<f64>,
    pub screenshot_url: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ImageUploadPayload {
    pub image_base64: Option<String>,
}

/// A request after classification. Exactly one handler owns each variant.
#[derive(Debug)]
pub enum IngestRequest {
    Evaluation(EvaluationPayload),
    Image(ImageUploadPayload),
}

impl IngestRequest {
    pub fn route(&self) -> &'static str {
        match self {
            IngestRequest::Evaluation(_) => "evaluation",
            IngestRequest::Image(_) => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluationRecorded {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUploaded {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum IngestResponse {
    Recorded(EvaluationRecorded),
    Uploaded(ImageUploaded),
    Failed(FailureResponse),
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct SheetUrlResponse {
    pub sheets_url: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub tabular_store: bool,
    pub blob_store: bool,
}
