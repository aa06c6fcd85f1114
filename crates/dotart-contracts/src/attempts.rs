use serde::{Deserialize, Serialize};

use crate::backends::BackendKind;

/// Outcome of one backend attempt. Never partially filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationAttemptResult {
    Success(Vec<u8>),
    Unsupported,
    Failure(String),
}

impl GenerationAttemptResult {
    pub fn status(&self) -> AttemptStatus {
        match self {
            Self::Success(_) => AttemptStatus::Success,
            Self::Unsupported => AttemptStatus::Unsupported,
            Self::Failure(_) => AttemptStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Unsupported,
    Failure,
    Skipped,
}

/// Ledger row for one backend in the chain; the raw image bytes are never
/// kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub backend: String,
    pub kind: BackendKind,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn from_result(
        backend: &str,
        kind: BackendKind,
        result: &GenerationAttemptResult,
        elapsed_ms: u64,
    ) -> Self {
        let reason = match result {
            GenerationAttemptResult::Failure(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            backend: backend.to_string(),
            kind,
            status: result.status(),
            reason,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{AttemptRecord, AttemptStatus, GenerationAttemptResult};
    use crate::backends::BackendKind;

    #[test]
    fn failure_reason_is_carried_into_record() {
        let result = GenerationAttemptResult::Failure("timed out".to_string());
        let record = AttemptRecord::from_result("titan", BackendKind::Variation, &result, 12);
        assert_eq!(record.status, AttemptStatus::Failure);
        assert_eq!(record.reason.as_deref(), Some("timed out"));
        assert!(!result.is_success());
    }

    #[test]
    fn record_serializes_without_image_bytes() -> anyhow::Result<()> {
        let result = GenerationAttemptResult::Success(vec![1, 2, 3]);
        let record = AttemptRecord::from_result("sdxl", BackendKind::Diffusion, &result, 40);
        let value: Value = serde_json::to_value(&record)?;
        assert_eq!(
            value,
            json!({
                "backend": "sdxl",
                "kind": "diffusion",
                "status": "success",
                "elapsed_ms": 40,
            })
        );
        Ok(())
    }
}
