use thiserror::Error;

/// The only failures that cross the conversion boundary. Backend failures are
/// recovered inside the fallback chain and never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Input is not a decodable raster image, or was declared as a non-image
    /// content type.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The reduced raster could not be serialized.
    #[error("failed to encode pixel art: {0}")]
    Encode(String),
}

impl ConvertError {
    pub fn is_invalid_image(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }
}
