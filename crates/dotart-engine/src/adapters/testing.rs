use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use serde_json::Value;

use super::transport::BedrockTransport;

type CannedReply = std::result::Result<Value, String>;

/// In-process transport that replays canned replies per model id and records
/// every call.
pub(crate) struct RecordingTransport {
    default_reply: CannedReply,
    per_model: HashMap<String, CannedReply>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub fn responding(response: Value) -> Self {
        Self::with_default(Ok(response))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_default(Err(reason.into()))
    }

    fn with_default(default_reply: CannedReply) -> Self {
        Self {
            default_reply,
            per_model: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_for(mut self, model_id: &str, response: Value) -> Self {
        self.per_model.insert(model_id.to_string(), Ok(response));
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn called_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|(model, _)| model).collect()
    }
}

impl BedrockTransport for RecordingTransport {
    fn invoke(&self, model_id: &str, body: &Value) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((model_id.to_string(), body.clone()));
        }
        match self.per_model.get(model_id).unwrap_or(&self.default_reply) {
            Ok(value) => Ok(value.clone()),
            Err(reason) => bail!("{reason}"),
        }
    }
}

pub(crate) fn generation_input() -> crate::normalize::CanonicalImage {
    let raster = image::RgbImage::from_fn(512, 512, |x, y| {
        image::Rgb([(x / 2) as u8, (y / 2) as u8, ((x + y) / 4) as u8])
    });
    crate::normalize::CanonicalImage::from_raster(raster).expect("non-empty raster")
}

/// Base64 PNG standing in for a provider's generated image.
pub(crate) fn generated_png_base64(color: [u8; 3]) -> String {
    use base64::Engine as _;

    let image = image::RgbImage::from_pixel(512, 512, image::Rgb(color));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    crate::BASE64.encode(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RecordingTransport;
    use crate::adapters::BedrockTransport;

    #[test]
    fn recording_transport_replays_and_records() -> anyhow::Result<()> {
        let transport =
            RecordingTransport::failing("503 upstream").reply_for("m", json!({"ok": true}));
        let reply = transport.invoke("m", &json!({"a": 1}))?;
        assert_eq!(reply, json!({"ok": true}));
        assert!(transport.invoke("other", &json!({})).is_err());
        assert_eq!(
            transport.called_models(),
            vec!["m".to_string(), "other".to_string()]
        );
        assert_eq!(transport.calls()[0].1, json!({"a": 1}));
        Ok(())
    }
}
