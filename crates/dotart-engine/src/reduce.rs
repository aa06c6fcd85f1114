use std::collections::HashSet;
use std::fmt;

use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

use crate::error::ConvertError;
use crate::median_cut::median_cut;
use crate::normalize::CanonicalImage;

/// Side length of the output grid.
pub const GRID_SIZE: u32 = 32;
/// Maximum number of distinct colors in the output.
pub const PALETTE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelArtFormat {
    Png,
}

impl PixelArtFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

impl fmt::Display for PixelArtFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoded pixel art. Decoding `bytes` yields a `GRID_SIZE`x`GRID_SIZE` RGB
/// raster with at most `PALETTE_SIZE` distinct colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArtResult {
    bytes: Vec<u8>,
    format: PixelArtFormat,
    palette_size: usize,
}

impl PixelArtResult {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> PixelArtFormat {
        self.format
    }

    pub fn grid(&self) -> (u32, u32) {
        (GRID_SIZE, GRID_SIZE)
    }

    pub fn palette_size(&self) -> usize {
        self.palette_size
    }
}

/// Nearest-neighbor downsample to the grid, median-cut to the palette, then
/// PNG-encode the materialized RGB raster.
pub fn reduce(image: &CanonicalImage) -> Result<PixelArtResult, ConvertError> {
    // Nearest keeps hard edges; a smoothing filter here blurs the blocks.
    let grid = image::imageops::resize(image.raster(), GRID_SIZE, GRID_SIZE, FilterType::Nearest);

    let pixels: Vec<Rgb<u8>> = grid.pixels().copied().collect();
    let quantized = median_cut(&pixels, PALETTE_SIZE);
    let mut art = RgbImage::new(GRID_SIZE, GRID_SIZE);
    for (idx, pixel) in art.pixels_mut().enumerate() {
        *pixel = quantized.color_at(idx);
    }

    let palette_size = distinct_colors(&art);
    let bytes = encode_png(&art)?;
    Ok(PixelArtResult {
        bytes,
        format: PixelArtFormat::Png,
        palette_size,
    })
}

pub(crate) fn distinct_colors(image: &RgbImage) -> usize {
    image
        .pixels()
        .map(|pixel| pixel.0)
        .collect::<HashSet<[u8; 3]>>()
        .len()
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ConvertError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|err| ConvertError::Encode(err.to_string()))?;
    Ok(bytes)
}
