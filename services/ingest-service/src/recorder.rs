use crate::error::IngestError;
use crate::models::{
    timestamp_now, Cell, EvaluationPayload, EvaluationRecorded, RECORDED_MESSAGE, SHEET_HEADER,
    SHEET_NAME,
};
use crate::state::AppState;

/// One validated evaluation, with every optional field already defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub timestamp: String,
    pub url: String,
    pub total_score: f64,
    pub grade: String,
    pub typography_score: f64,
    pub color_score: f64,
    pub layout_score: f64,
    pub usability_score: f64,
    pub screenshot_url: String,
    pub recommendations: Vec<String>,
}

impl EvaluationRecord {
    pub fn from_payload(payload: EvaluationPayload) -> Result<Self, IngestError> {
        // Blank counts as missing, but the stored value is the one sent.
        let url = payload.url.filter(|url| !url.trim().is_empty());

        // Zero is a real score; only absence counts as missing.
        let (url, total_score) = match (url, payload.total_score) {
            (Some(url), Some(total_score)) => (url, total_score),
            (url, total_score) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push("url");
                }
                if total_score.is_none() {
                    missing.push("total_score");
                }
                return Err(IngestError::Validation(format!(
                    "missing required fields: {}",
                    missing.join(", ")
                )));
            }
        };

        Ok(Self {
            timestamp: payload
                .timestamp
                .filter(|timestamp| !timestamp.trim().is_empty())
                .unwrap_or_else(timestamp_now),
            url,
            total_score,
            grade: payload.grade.unwrap_or_default(),
            typography_score: payload.typography_score.unwrap_or(0.0),
            color_score: payload.color_score.unwrap_or(0.0),
            layout_score: payload.layout_score.unwrap_or(0.0),
            usability_score: payload.usability_score.unwrap_or(0.0),
            screenshot_url: payload.screenshot_url.unwrap_or_default(),
            recommendations: payload.recommendations.unwrap_or_default(),
        })
    }

    /// Cells in `SHEET_HEADER` order.
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.timestamp.as_str()),
            Cell::from(self.url.as_str()),
            Cell::from(self.total_score),
            Cell::from(self.grade.as_str()),
            Cell::from(self.typography_score),
            Cell::from(self.color_score),
            Cell::from(self.layout_score),
            Cell::from(self.usability_score),
            Cell::from(self.screenshot_url.as_str()),
            Cell::from(self.recommendations.join("; ")),
        ]
    }
}

pub async fn record_evaluation(
    state: &AppState,
    payload: EvaluationPayload,
) -> Result<EvaluationRecorded, IngestError> {
    let record = EvaluationRecord::from_payload(payload)?;
    let row = record.to_row();
    let document_id = state.config.document_id.as_str();
    let store = state.tabular.as_ref();

    state
        .store_call("open document", store.open_document(document_id))
        .await?;

    let exists = state
        .store_call("find sheet", store.find_sheet(document_id, SHEET_NAME))
        .await?;
    if !exists {
        let created = state
            .store_call(
                "create sheet",
                store.create_sheet(document_id, SHEET_NAME, &SHEET_HEADER),
            )
            .await?;
        if created {
            tracing::info!(document_id, sheet = SHEET_NAME, "sheet created with header row");
        }
    }

    // A failure here can leave a header-only sheet behind, which is fine.
    state
        .store_call("append row", store.append_row(document_id, SHEET_NAME, &row))
        .await?;

    tracing::info!(
        url = record.url.as_str(),
        total_score = record.total_score,
        grade = record.grade.as_str(),
        "evaluation recorded"
    );

    Ok(EvaluationRecorded {
        success: true,
        message: RECORDED_MESSAGE,
        timestamp: timestamp_now(),
    })
}
