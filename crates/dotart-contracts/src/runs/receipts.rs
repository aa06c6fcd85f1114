use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attempts::AttemptRecord;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPath {
    Backend,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReceipt {
    pub conversion_id: String,
    pub input_sha256: String,
    pub input_bytes: u64,
    pub declared_content_type: Option<String>,
    pub path: ConversionPath,
    pub backend: Option<String>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    pub output_bytes: u64,
    pub output_sha256: String,
    pub grid: (u32, u32),
    pub palette_size: u64,
}

pub fn write_receipt(
    path: &Path,
    receipt: &ConversionReceipt,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(receipt)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{write_receipt, ConversionPath, ConversionReceipt};
    use crate::attempts::{AttemptRecord, AttemptStatus};
    use crate::backends::BackendKind;

    #[test]
    fn write_receipt_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("receipts").join("conv.json");

        let receipt = ConversionReceipt {
            conversion_id: "conv-1".to_string(),
            input_sha256: "abc".to_string(),
            input_bytes: 1024,
            declared_content_type: Some("image/jpeg".to_string()),
            path: ConversionPath::Local,
            backend: None,
            attempts: vec![AttemptRecord {
                backend: "stability.stable-diffusion-xl-v1".to_string(),
                kind: BackendKind::Diffusion,
                status: AttemptStatus::Failure,
                reason: Some("AWS_BEARER_TOKEN_BEDROCK not set".to_string()),
                elapsed_ms: 0,
            }],
            output_bytes: 300,
            output_sha256: "def".to_string(),
            grid: (32, 32),
            palette_size: 9,
        };
        let mut extra = Map::new();
        extra.insert("source".to_string(), json!("cat.jpg"));
        write_receipt(&path, &receipt, Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["schema_version"], json!(1));
        assert_eq!(parsed["path"], json!("local"));
        assert_eq!(parsed["grid"], json!([32, 32]));
        assert_eq!(parsed["attempts"][0]["status"], json!("failure"));
        assert_eq!(parsed["source"], json!("cat.jpg"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());

        let roundtrip: ConversionReceipt = serde_json::from_value(parsed)?;
        assert_eq!(roundtrip.path, ConversionPath::Local);
        Ok(())
    }
}
