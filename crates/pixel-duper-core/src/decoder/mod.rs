mod image_crate;

pub use image_crate::ImageCrateDecoder;

use crate::entity::{DefectKind, ImageFormat, ImageMetadata};
use crate::error::{Error, Result};
use crate::path::Path;
use crate::pixels::CanonicalPixelBuffer;
use std::fs::File;
use std::io::Read;
use tracing::trace;

/// Extensions the scanner hands to the decoders, upper-cased.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "BMP", "DIB", "GIF", "TIF", "TIFF", "JPG", "JPEG", "JFIF", "JPE", "PNG", "ICO", "TGA",
    "DDS", "WEBP", "PBM", "PGM", "PPM", "PNM", "QOI", "HDR", "EXR", "AVIF", "FF",
];

pub fn is_supported_extension(path: &Path) -> bool {
    let ext = path.extension();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(ext))
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub buffer: CanonicalPixelBuffer,
    pub format: ImageFormat,
    /// `DefectKind::None` unless the decoder noticed a structural problem.
    pub defect: DefectKind,
    pub metadata: Option<ImageMetadata>,
}

/// Turns raw file bytes into a canonical pixel buffer.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap sniff of the leading bytes.
    fn can_decode(&self, _bytes: &[u8]) -> bool {
        true
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;
}

/// Per-worker read buffer, created once per worker and reused for every
/// file that worker decodes.
#[derive(Debug, Default)]
pub struct DecodeScratch {
    buffer: Vec<u8>,
}

impl DecodeScratch {
    pub fn read_file(&mut self, path: &Path) -> std::io::Result<&[u8]> {
        self.buffer.clear();
        File::open(path.as_std_path())?.read_to_end(&mut self.buffer)?;
        Ok(&self.buffer)
    }
}

/// Ordered list of decoders; the first that succeeds wins.
pub struct DecoderChain {
    decoders: Vec<Box<dyn Decoder>>,
}

impl DecoderChain {
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    pub fn with(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoders.push(Box::new(decoder));
        self
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let mut last_error = None;
        for decoder in self.decoders.iter().filter(|d| d.can_decode(bytes)) {
            match decoder.decode(bytes) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    trace!("Decoder {} failed: {}", decoder.name(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Decode("no decoder recognised the data".into())))
    }

    pub fn decode_file(&self, scratch: &mut DecodeScratch, path: &Path) -> Result<DecodedImage> {
        let bytes = scratch.read_file(path)?;
        self.decode(bytes)
    }
}

impl Default for DecoderChain {
    fn default() -> Self {
        DecoderChain::empty().with(ImageCrateDecoder)
    }
}
