use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::ConvertError;

/// Resolution requested from every generation backend.
pub const GENERATION_SIZE: u32 = 512;
/// Generation backends require dimensions that are multiples of this.
pub const GENERATION_ALIGNMENT: u32 = 64;

/// Quality used when a canonical image is embedded in a provider request.
const REQUEST_JPEG_QUALITY: u8 = 95;

/// Three-channel RGB raster with positive dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    raster: RgbImage,
}

impl CanonicalImage {
    pub fn from_raster(raster: RgbImage) -> Result<Self, ConvertError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(ConvertError::InvalidImage(
                "image has zero width or height".to_string(),
            ));
        }
        Ok(Self { raster })
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn is_aligned(&self, alignment: u32) -> bool {
        alignment > 0 && self.width() % alignment == 0 && self.height() % alignment == 0
    }

    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    /// JPEG bytes for embedding in a provider request body.
    pub fn to_request_jpeg(&self) -> anyhow::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, REQUEST_JPEG_QUALITY);
        encoder.encode_image(&self.raster)?;
        Ok(bytes)
    }
}

/// Decodes `source` and resizes it to exactly `width`x`height` with a Lanczos
/// filter.
pub fn normalize(source: &[u8], width: u32, height: u32) -> Result<CanonicalImage, ConvertError> {
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidImage(format!(
            "target size {width}x{height} must be positive"
        )));
    }
    let decoded = decode_rgb(source)?;
    Ok(resize_canonical(decoded, width, height))
}

/// Decodes `source` to RGB at its own size.
pub fn decode_rgb(source: &[u8]) -> Result<CanonicalImage, ConvertError> {
    let image = image::load_from_memory(source)
        .map_err(|err| ConvertError::InvalidImage(err.to_string()))?;
    CanonicalImage::from_raster(flatten_to_rgb(image))
}

pub fn resize_canonical(image: CanonicalImage, width: u32, height: u32) -> CanonicalImage {
    if image.dimensions() == (width, height) || width == 0 || height == 0 {
        return image;
    }
    let resized = image::imageops::resize(image.raster(), width, height, FilterType::Lanczos3);
    CanonicalImage { raster: resized }
}

fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    // Composite over white so transparent regions do not turn black.
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
