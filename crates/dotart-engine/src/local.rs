use crate::error::ConvertError;
use crate::normalize::{decode_rgb, CanonicalImage};
use crate::reduce::{reduce, PixelArtResult};

/// Backend-free conversion: decode at source size, then reduce. Always
/// succeeds for a decodable image and is byte-deterministic.
pub fn local_generate(source: &[u8]) -> Result<PixelArtResult, ConvertError> {
    let canonical = decode_rgb(source)?;
    local_generate_canonical(&canonical)
}

pub fn local_generate_canonical(image: &CanonicalImage) -> Result<PixelArtResult, ConvertError> {
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        "local pixel art reduction"
    );
    reduce(image)
}
