//! Photo to 32x32, 16-color pixel art.
//!
//! [`Orchestrator::convert_to_pixel_art`] tries each configured generation
//! backend in order and reduces the first generated image; when every backend
//! fails or cannot generate, the decoded photo is reduced locally instead.
//! [`local_generate`] is the same reduction without any backend.

pub mod adapters;
pub mod config;
mod error;
mod local;
pub mod median_cut;
mod normalize;
mod orchestrator;
mod reduce;

pub(crate) use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use config::EngineConfig;
pub use error::ConvertError;
pub use local::{local_generate, local_generate_canonical};
pub use normalize::{
    decode_rgb, normalize, resize_canonical, CanonicalImage, GENERATION_ALIGNMENT,
    GENERATION_SIZE,
};
pub use orchestrator::{ConversionOutcome, Orchestrator};
pub use reduce::{reduce, PixelArtFormat, PixelArtResult, GRID_SIZE, PALETTE_SIZE};

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
