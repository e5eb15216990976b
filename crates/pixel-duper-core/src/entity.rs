use crate::config::{CompareOptions, SearchScope};
use crate::decoder::DecodedImage;
use crate::hasher;
use crate::identity::FileIdentity;
use crate::path::Path;
use crate::pixels::{resample_luma, PixelFingerprint};
use crate::quality;

/// Score value for a blockiness or blurring measurement not taken yet.
pub const UNKNOWN_SCORE: f64 = -1.0;

/// Container format reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Not decoded yet.
    None,
    Bmp,
    Gif,
    Tiff,
    Jpeg,
    Png,
    Ico,
    Tga,
    Dds,
    WebP,
    Pnm,
    Qoi,
    Hdr,
    OpenExr,
    Avif,
    Farbfeld,
    /// No decoder could read the file.
    Unsupported,
}

impl ImageFormat {
    pub fn code(self) -> i32 {
        match self {
            ImageFormat::None => 0,
            ImageFormat::Bmp => 1,
            ImageFormat::Gif => 2,
            ImageFormat::Tiff => 3,
            ImageFormat::Jpeg => 4,
            ImageFormat::Png => 5,
            ImageFormat::Ico => 6,
            ImageFormat::Tga => 7,
            ImageFormat::Dds => 8,
            ImageFormat::WebP => 9,
            ImageFormat::Pnm => 10,
            ImageFormat::Qoi => 11,
            ImageFormat::Hdr => 12,
            ImageFormat::OpenExr => 13,
            ImageFormat::Avif => 14,
            ImageFormat::Farbfeld => 15,
            ImageFormat::Unsupported => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<ImageFormat> {
        let format = match code {
            0 => ImageFormat::None,
            1 => ImageFormat::Bmp,
            2 => ImageFormat::Gif,
            3 => ImageFormat::Tiff,
            4 => ImageFormat::Jpeg,
            5 => ImageFormat::Png,
            6 => ImageFormat::Ico,
            7 => ImageFormat::Tga,
            8 => ImageFormat::Dds,
            9 => ImageFormat::WebP,
            10 => ImageFormat::Pnm,
            11 => ImageFormat::Qoi,
            12 => ImageFormat::Hdr,
            13 => ImageFormat::OpenExr,
            14 => ImageFormat::Avif,
            15 => ImageFormat::Farbfeld,
            -1 => ImageFormat::Unsupported,
            _ => return None,
        };
        Some(format)
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::None => "none",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Ico => "ico",
            ImageFormat::Tga => "tga",
            ImageFormat::Dds => "dds",
            ImageFormat::WebP => "webp",
            ImageFormat::Pnm => "pnm",
            ImageFormat::Qoi => "qoi",
            ImageFormat::Hdr => "hdr",
            ImageFormat::OpenExr => "exr",
            ImageFormat::Avif => "avif",
            ImageFormat::Farbfeld => "farbfeld",
            ImageFormat::Unsupported => "unsupported",
        }
    }
}

/// Image quality problem found for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefectKind {
    /// Not checked yet.
    Undefined,
    None,
    /// The file could not be decoded.
    Unknown,
    JpegEndMarkerIsAbsent,
    Blockiness,
    Blurring,
}

impl DefectKind {
    pub fn code(self) -> i32 {
        match self {
            DefectKind::Undefined => 0,
            DefectKind::None => 1,
            DefectKind::Unknown => 2,
            DefectKind::JpegEndMarkerIsAbsent => 3,
            DefectKind::Blockiness => 4,
            DefectKind::Blurring => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<DefectKind> {
        let kind = match code {
            0 => DefectKind::Undefined,
            1 => DefectKind::None,
            2 => DefectKind::Unknown,
            3 => DefectKind::JpegEndMarkerIsAbsent,
            4 => DefectKind::Blockiness,
            5 => DefectKind::Blurring,
            _ => return None,
        };
        Some(kind)
    }

    /// Defects reported by the decoder rather than derived from scores.
    pub fn is_specific(self) -> bool {
        matches!(self, DefectKind::Unknown | DefectKind::JpegEndMarkerIsAbsent)
    }

    pub fn name(self) -> &'static str {
        match self {
            DefectKind::Undefined => "undefined",
            DefectKind::None => "none",
            DefectKind::Unknown => "unreadable",
            DefectKind::JpegEndMarkerIsAbsent => "jpeg end marker is absent",
            DefectKind::Blockiness => "blockiness",
            DefectKind::Blurring => "blurring",
        }
    }
}

/// Free-form key/value details reported by a decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub entries: Vec<(String, String)>,
}

impl ImageMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }
}

/// Everything known about one image file: its identity, decoded metadata,
/// quality scores and pixel fingerprints (at most one per grid side).
#[derive(Debug, Clone)]
pub struct FingerprintEntity {
    pub identity: FileIdentity,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub blockiness: f64,
    pub blurring: f64,
    /// Signed aspect code in `[-R, R]`; negative for landscape.
    pub ratio: i32,
    pub defect: DefectKind,
    /// Hash of the full luma plane.
    pub pixel_hash: u32,
    pub metadata: Option<ImageMetadata>,
    /// Lies under one of the valid roots.
    pub valid: bool,
    /// Index of the search root containing the file.
    pub root_index: Option<usize>,
    fingerprints: Vec<PixelFingerprint>,
}

impl FingerprintEntity {
    pub fn new(identity: FileIdentity) -> Self {
        Self {
            identity,
            format: ImageFormat::None,
            width: 0,
            height: 0,
            blockiness: UNKNOWN_SCORE,
            blurring: UNKNOWN_SCORE,
            ratio: 0,
            defect: DefectKind::Undefined,
            pixel_hash: 0,
            metadata: None,
            valid: false,
            root_index: None,
            fingerprints: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.identity.path()
    }

    pub fn fingerprints(&self) -> &[PixelFingerprint] {
        &self.fingerprints
    }

    /// Filled fingerprint with the given side.
    pub fn fingerprint(&self, side: usize) -> Option<&PixelFingerprint> {
        self.fingerprints
            .iter()
            .find(|fp| fp.side() == side && fp.filled())
    }

    /// Add a fingerprint, replacing any existing one with the same side.
    pub fn set_fingerprint(&mut self, fingerprint: PixelFingerprint) {
        match self
            .fingerprints
            .iter_mut()
            .find(|fp| fp.side() == fingerprint.side())
        {
            Some(existing) => *existing = fingerprint,
            None => self.fingerprints.push(fingerprint),
        }
    }

    pub fn needs_pixel_fill(&self, options: &CompareOptions) -> bool {
        if self.format == ImageFormat::Unsupported {
            return false;
        }
        if !(options.check_on_equality || options.check_on_defect) {
            return false;
        }
        self.fingerprint(options.reduced_image_size).is_none()
            || (options.check_on_blockiness && self.blockiness < 0.0)
            || (options.check_on_blurring && self.blurring < 0.0)
    }

    pub fn needs_defect_check(&self, options: &CompareOptions) -> bool {
        let unresolved = matches!(self.defect, DefectKind::Undefined | DefectKind::None);
        (options.check_on_defect && self.defect == DefectKind::Undefined)
            || (options.check_on_blockiness
                && unresolved
                && self.blockiness > options.blockiness_threshold)
            || (options.check_on_blurring
                && unresolved
                && self.blurring > options.blurring_threshold)
    }

    /// Strongest defect that applies under `options`.
    ///
    /// Decoded images outside the configured size range are never reported.
    /// Files that failed to decode have no dimensions and skip the size gate.
    pub fn classify_defect(&self, options: &CompareOptions) -> DefectKind {
        if self.format != ImageFormat::Unsupported {
            let range = options.minimal_image_size..=options.maximal_image_size;
            if !range.contains(&self.width) || !range.contains(&self.height) {
                return DefectKind::None;
            }
        }
        if options.check_on_defect && self.defect.is_specific() {
            return self.defect;
        }
        if options.check_on_blockiness
            && self.blockiness > options.blockiness_threshold
            && !(options.check_on_blockiness_only_not_jpeg && self.format == ImageFormat::Jpeg)
        {
            return DefectKind::Blockiness;
        }
        if options.check_on_blurring && self.blurring > options.blurring_threshold {
            return DefectKind::Blurring;
        }
        DefectKind::None
    }

    /// Recompute the aspect code and the scope membership flags.
    pub fn compute_derived(&mut self, options: &CompareOptions, scope: &SearchScope) {
        self.ratio = aspect_ratio_code(self.width, self.height, options.ratio_resolution);
        self.valid = scope.valid.is_has_sub_path(self.path());
        self.root_index = scope.search.index_of_sub_path(self.path());
    }

    /// Apply a decoded image: dimensions, format, decoder defect, pixel hash,
    /// quality scores and the fingerprint at the configured side.
    pub fn fill(&mut self, decoded: &DecodedImage, options: &CompareOptions) {
        let buffer = &decoded.buffer;
        if buffer.is_empty() {
            self.mark_undecodable();
            return;
        }
        let (width, height) = (buffer.width as usize, buffer.height as usize);
        let luma = buffer.to_luma();

        self.format = decoded.format;
        self.width = buffer.width;
        self.height = buffer.height;
        self.defect = decoded.defect;
        self.metadata = decoded.metadata.clone();
        self.pixel_hash = hasher::hash_data(&luma);
        if self.blockiness < 0.0 {
            self.blockiness = quality::blockiness(&luma, width, height);
        }
        if self.blurring < 0.0 {
            self.blurring = quality::blurring(&luma, width, height);
        }

        let side = options.reduced_image_size;
        let grid = resample_luma(&luma, width, height, side);
        let mut fingerprint = PixelFingerprint::new(side);
        fingerprint.fill(&grid, options.ignore_frame_width);
        self.set_fingerprint(fingerprint);
    }

    /// Record that no decoder could read the file.
    pub fn mark_undecodable(&mut self) {
        self.format = ImageFormat::Unsupported;
        self.defect = DefectKind::Unknown;
        self.width = 0;
        self.height = 0;
        self.fingerprints.clear();
    }

    /// Worth persisting: some pixel data or a defect verdict was computed.
    pub fn need_to_save(&self) -> bool {
        self.fingerprints.iter().any(|fp| fp.filled()) || self.defect != DefectKind::Undefined
    }

    /// Rotate 90° clockwise.
    pub fn turn(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.ratio = -self.ratio;
        for fp in &mut self.fingerprints {
            fp.turn();
        }
    }

    pub fn mirror(&mut self) {
        for fp in &mut self.fingerprints {
            fp.mirror();
        }
    }
}

/// `height > width ? height*R/width - R : R - width*R/height`
pub fn aspect_ratio_code(width: u32, height: u32, resolution: i32) -> i32 {
    if width == 0 || height == 0 {
        return 0;
    }
    let (w, h, r) = (width as i64, height as i64, resolution as i64);
    let code = if h > w { h * r / w - r } else { r - w * r / h };
    code as i32
}
