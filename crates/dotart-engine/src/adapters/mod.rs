//! Per-provider protocol adapters.
//!
//! Each adapter turns a canonical image into one provider-specific request and
//! the provider's reply into raw image bytes. Errors never escape an adapter:
//! they become [`GenerationAttemptResult::Failure`].

mod diffusion;
mod transport;
mod variation;
mod vision;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use dotart_contracts::attempts::GenerationAttemptResult;
use dotart_contracts::backends::{BackendDescriptor, BackendKind};
use serde_json::Value;

use crate::normalize::CanonicalImage;
use crate::{error_chain_text, BASE64};

pub use diffusion::{DiffusionAdapter, DiffusionParams, DIFFUSION_STYLE_PROMPT};
pub use transport::{
    list_foundation_models, BedrockTransport, FoundationModelSummary, HttpBedrockTransport,
};
pub use variation::{VariationAdapter, VARIATION_STYLE_PROMPT};
pub use vision::VisionDescriptionAdapter;

const FAILURE_REASON_MAX_CHARS: usize = 512;

pub trait GenerationAdapter: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;
    fn attempt(&self, image: &CanonicalImage) -> GenerationAttemptResult;
}

/// One adapter per descriptor kind; new provider kinds are new variants.
pub fn build_adapter(
    descriptor: BackendDescriptor,
    transport: Arc<dyn BedrockTransport>,
) -> Box<dyn GenerationAdapter> {
    match descriptor.kind {
        BackendKind::Diffusion => Box::new(DiffusionAdapter::new(descriptor, transport)),
        BackendKind::Variation => Box::new(VariationAdapter::new(descriptor, transport)),
        BackendKind::VisionDescription => Box::new(VisionDescriptionAdapter::new(descriptor)),
    }
}

pub(crate) fn request_image_base64(image: &CanonicalImage) -> Result<String> {
    let jpeg = image
        .to_request_jpeg()
        .context("failed encoding request image")?;
    Ok(BASE64.encode(jpeg))
}

pub(crate) fn decode_image_field(provider: &str, value: Option<&Value>) -> Result<Vec<u8>> {
    let encoded = value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{provider} response missing image bytes"))?;
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .with_context(|| format!("{provider} image base64 decode failed"))?;
    if bytes.is_empty() {
        bail!("{provider} returned an empty image");
    }
    Ok(bytes)
}

pub(crate) fn into_attempt_result(outcome: Result<Vec<u8>>) -> GenerationAttemptResult {
    match outcome {
        Ok(bytes) => GenerationAttemptResult::Success(bytes),
        Err(err) => {
            GenerationAttemptResult::Failure(error_chain_text(&err, FAILURE_REASON_MAX_CHARS))
        }
    }
}
