use thiserror::Error;

/// Every way an ingest call can fail. All of them end up in the same
/// `{success: false, ...}` body; `kind()` is the machine-readable tag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedRequest(_) => "malformed_request",
            IngestError::InvalidPayload(_) => "invalid_payload",
            IngestError::Validation(_) => "validation_error",
            IngestError::Decode(_) => "decode_error",
            IngestError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Caller mistakes log at warn, store outages at error.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::IngestError;

    #[test]
    fn store_failures_are_not_client_errors() {
        let err = IngestError::StoreUnavailable("append row failed".to_string());
        assert_eq!(err.kind(), "store_unavailable");
        assert!(!err.is_client_error());
        assert!(IngestError::MalformedRequest("empty".to_string()).is_client_error());
    }

    #[test]
    fn message_carries_detail() {
        let err = IngestError::Validation("missing required fields: url".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: missing required fields: url"
        );
    }
}
