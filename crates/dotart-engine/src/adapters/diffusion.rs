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

pub const DIFFUSION_STYLE_PROMPT: &str = "pixel art, 8-bit retro game style, simple flat colors, \
     minimalist design, animal crossing style, cute cartoon";

#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionParams {
    pub image_strength: f64,
    pub cfg_scale: f64,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for DiffusionParams {
    fn default() -> Self {
        Self {
            image_strength: 0.7,
            cfg_scale: 10.0,
            steps: 30,
            width: GENERATION_SIZE,
            height: GENERATION_SIZE,
        }
    }
}

/// Image-to-image diffusion (`text_prompts` + `init_image`, reply in
/// `artifacts[0].base64`).
pub struct DiffusionAdapter {
    descriptor: BackendDescriptor,
    transport: Arc<dyn BedrockTransport>,
    params: DiffusionParams,
}

impl DiffusionAdapter {
    pub fn new(descriptor: BackendDescriptor, transport: Arc<dyn BedrockTransport>) -> Self {
        Self {
            descriptor,
            transport,
            params: DiffusionParams::default(),
        }
    }

    pub fn with_params(mut self, params: DiffusionParams) -> Self {
        self.params = params;
        self
    }

    fn request_body(&self, image_b64: &str) -> Value {
        json!({
            "text_prompts": [
                {"text": DIFFUSION_STYLE_PROMPT, "weight": 1.0}
            ],
            "init_image": image_b64,
            "init_image_mode": "IMAGE_STRENGTH",
            "image_strength": self.params.image_strength,
            "cfg_scale": self.params.cfg_scale,
            "steps": self.params.steps,
            "width": self.params.width,
            "height": self.params.height,
        })
    }

    fn decode_response(&self, payload: &Value) -> Result<Vec<u8>> {
        let artifact = payload
            .get("artifacts")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .ok_or_else(|| anyhow::anyhow!("{} response has no artifacts", self.descriptor.id))?;
        if let Some(reason) = artifact
            .get("finishReason")
            .and_then(Value::as_str)
            .filter(|reason| !reason.eq_ignore_ascii_case("SUCCESS"))
        {
            bail!("{} artifact finished with {reason}", self.descriptor.id);
        }
        decode_image_field(&self.descriptor.id, artifact.get("base64"))
    }

    fn generate(&self, image: &CanonicalImage) -> Result<Vec<u8>> {
        let body = self.request_body(&request_image_base64(image)?);
        let payload = self.transport.invoke(&self.descriptor.id, &body)?;
        self.decode_response(&payload)
    }
}

impl GenerationAdapter for DiffusionAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn attempt(&self, image: &CanonicalImage) -> GenerationAttemptResult {
        into_attempt_result(self.generate(image))
    }
}
