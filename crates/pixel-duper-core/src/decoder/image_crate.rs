use super::{DecodedImage, Decoder};
use crate::entity::{DefectKind, ImageFormat, ImageMetadata};
use crate::error::{Error, Result};
use crate::pixels::CanonicalPixelBuffer;

const JPEG_END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Decoder backed by the `image` crate. Produces a luma buffer.
pub struct ImageCrateDecoder;

impl Decoder for ImageCrateDecoder {
    fn name(&self) -> &'static str {
        "image"
    }

    fn can_decode(&self, bytes: &[u8]) -> bool {
        image::guess_format(bytes).is_ok()
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let source_format = image::guess_format(bytes)?;
        let format = map_format(source_format).ok_or_else(|| {
            Error::Decode(format!("unsupported container {:?}", source_format))
        })?;
        let img = image::load_from_memory_with_format(bytes, source_format)?;

        let mut metadata = ImageMetadata::default();
        metadata.insert("color_type", format!("{:?}", img.color()));
        metadata.insert("bits_per_pixel", img.color().bits_per_pixel().to_string());

        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        let defect = if format == ImageFormat::Jpeg && !has_jpeg_end_marker(bytes) {
            DefectKind::JpegEndMarkerIsAbsent
        } else {
            DefectKind::None
        };

        Ok(DecodedImage {
            buffer: CanonicalPixelBuffer::luma(width, height, luma.into_raw()),
            format,
            defect,
            metadata: Some(metadata),
        })
    }
}

/// Trailing zero padding after the marker is tolerated.
fn has_jpeg_end_marker(bytes: &[u8]) -> bool {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    bytes[..end].ends_with(&JPEG_END_MARKER)
}

fn map_format(format: image::ImageFormat) -> Option<ImageFormat> {
    let mapped = match format {
        image::ImageFormat::Png => ImageFormat::Png,
        image::ImageFormat::Jpeg => ImageFormat::Jpeg,
        image::ImageFormat::Gif => ImageFormat::Gif,
        image::ImageFormat::WebP => ImageFormat::WebP,
        image::ImageFormat::Pnm => ImageFormat::Pnm,
        image::ImageFormat::Tiff => ImageFormat::Tiff,
        image::ImageFormat::Tga => ImageFormat::Tga,
        image::ImageFormat::Dds => ImageFormat::Dds,
        image::ImageFormat::Bmp => ImageFormat::Bmp,
        image::ImageFormat::Ico => ImageFormat::Ico,
        image::ImageFormat::Hdr => ImageFormat::Hdr,
        image::ImageFormat::OpenExr => ImageFormat::OpenExr,
        image::ImageFormat::Farbfeld => ImageFormat::Farbfeld,
        image::ImageFormat::Avif => ImageFormat::Avif,
        image::ImageFormat::Qoi => ImageFormat::Qoi,
        _ => return None,
    };
    Some(mapped)
}
