use std::sync::Arc;

use anyhow::{bail, Result};
use dotart_contracts::attempts::GenerationAttemptResult;
use dotart_contracts::backends::BackendDescriptor;
use serde_json::{json, Value};

use super::{
    decode_image_field, into_attempt_result, request_image_base64, BedrockTransport,
    GenerationAdapter,
};
use crate::normalize::{CanonicalImage, GENERATION_SIZE};

pub const VARIATION_STYLE_PROMPT: &str =
    "pixel art, 8-bit style, animal crossing style, simple colors";

const VARIATION_COUNT: u32 = 1;

/// `IMAGE_VARIATION` task; reply in `images[0]`.
pub struct VariationAdapter {
    descriptor: BackendDescriptor,
    transport: Arc<dyn BedrockTransport>,
}

impl VariationAdapter {
    pub fn new(descriptor: BackendDescriptor, transport: Arc<dyn BedrockTransport>) -> Self {
        Self {
            descriptor,
            transport,
        }
    }

    fn request_body(&self, image_b64: &str) -> Value {
        json!({
            "taskType": "IMAGE_VARIATION",
            "imageVariationParams": {
                "text": VARIATION_STYLE_PROMPT,
                "images": [image_b64],
            },
            "imageGenerationConfig": {
                "numberOfImages": VARIATION_COUNT,
                "width": GENERATION_SIZE,
                "height": GENERATION_SIZE,
            },
        })
    }

    fn decode_response(&self, payload: &Value) -> Result<Vec<u8>> {
        if let Some(error) = payload
            .get("error")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            bail!("{} returned error: {error}", self.descriptor.id);
        }
        let first = payload
            .get("images")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first());
        decode_image_field(&self.descriptor.id, first)
    }

    fn generate(&self, image: &CanonicalImage) -> Result<Vec<u8>> {
        let body = self.request_body(&request_image_base64(image)?);
        let payload = self.transport.invoke(&self.descriptor.id, &body)?;
        self.decode_response(&payload)
    }
}

impl GenerationAdapter for VariationAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn attempt(&self, image: &CanonicalImage) -> GenerationAttemptResult {
        into_attempt_result(self.generate(image))
    }
}
