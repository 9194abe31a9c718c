//! Request and report envelopes exchanged with the scoring worker

use crate::error::ScoringError;
use crate::types::prediction::PredictionResult;
use crate::types::profile::ProfileAttributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scoring request received over NATS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Caller-supplied correlation id
    pub request_id: String,

    pub profile: ProfileAttributes,

    /// Models to query; the configured default set when absent
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

/// Failure category of a request that could not be scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportErrorKind {
    Schema,
    Ensemble,
    MalformedRequest,
    /// The worker failed while scoring; the request itself may be fine
    Internal,
}

/// Error payload in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: ReportErrorKind,
    /// Offending attribute for schema errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ReportError {
    /// Payload that could not be decoded as a [`ScoreRequest`]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ReportErrorKind::MalformedRequest,
            field: None,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ReportErrorKind::Internal,
            field: None,
            message: message.into(),
        }
    }
}

impl From<&ScoringError> for ReportError {
    fn from(err: &ScoringError) -> Self {
        match err {
            ScoringError::Schema(e) => ReportError {
                kind: ReportErrorKind::Schema,
                field: Some(e.field.clone()),
                message: e.to_string(),
            },
            ScoringError::Ensemble(e) => ReportError {
                kind: ReportErrorKind::Ensemble,
                field: None,
                message: e.to_string(),
            },
        }
    }
}

/// Scoring outcome published for each request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Unique report identifier
    pub report_id: String,

    /// Correlation id copied from the request
    pub request_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,

    /// Wall-clock processing time
    pub processing_time_us: u64,

    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl ScoreReport {
    /// Create a report for a successfully scored profile
    pub fn scored(request_id: String, result: PredictionResult) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            request_id,
            result: Some(result),
            error: None,
            processing_time_us: 0,
            timestamp: Utc::now(),
        }
    }

    /// Create a report for a request that failed
    pub fn failed(request_id: String, error: ReportError) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            request_id,
            result: None,
            error: Some(error),
            processing_time_us: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_processing_time(mut self, processing_time_us: u64) -> Self {
        self.processing_time_us = processing_time_us;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    #[test]
    fn test_request_without_models() {
        let json = r#"{"request_id": "r-1", "profile": {"name": "Ana", "followers_count": "12"}}"#;
        let request: ScoreRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.request_id, "r-1");
        assert!(request.models.is_none());
        assert_eq!(request.profile.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_failed_report_carries_field() {
        let err = ScoringError::Schema(SchemaError::new("listed_count", "expected a number"));
        let report = ScoreReport::failed("r-2".to_string(), ReportError::from(&err));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error"]["kind"], "schema");
        assert_eq!(json["error"]["field"], "listed_count");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_worker_failure_kinds() {
        let report = ScoreReport::failed(
            "r-3".to_string(),
            ReportError::internal("scoring task panicked"),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["request_id"], "r-3");
        assert_eq!(json["error"]["kind"], "internal");
        assert_eq!(json["error"]["message"], "scoring task panicked");
        assert!(json["error"].get("field").is_none());

        let malformed = ReportError::malformed("expected value at line 1 column 1");
        assert_eq!(malformed.kind, ReportErrorKind::MalformedRequest);
        assert_eq!(
            serde_json::to_value(malformed.kind).unwrap(),
            "malformed_request"
        );
    }
}
