use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use image::{GrayImage, Luma};
use pixel_duper_core::decoder::{DecodedImage, Decoder, DecoderChain, ImageCrateDecoder};
use pixel_duper_core::entity::{DefectKind, ImageFormat};
use pixel_duper_core::error::Result;
use pixel_duper_core::identity::LocalFileSystem;
use pixel_duper_core::path::Path as PdPath;
use pixel_duper_core::pixels::CanonicalPixelBuffer;
use pixel_duper_core::store::FingerprintStore;
use pixel_duper_core::{AppConfig, CompareResult, Error, ScanEngine, SilentReporter};

const STOP_MARKER: &[u8] = b"STOP";

/// Decodes files starting with `STOP_MARKER` and raises the cancel flag
/// while doing so.
struct CancellingDecoder {
    cancel: Arc<AtomicBool>,
}

impl Decoder for CancellingDecoder {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    fn can_decode(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(STOP_MARKER)
    }

    fn decode(&self, _bytes: &[u8]) -> Result<DecodedImage> {
        self.cancel.store(true, Ordering::SeqCst);
        Ok(DecodedImage {
            buffer: CanonicalPixelBuffer::luma(64, 64, vec![128; 64 * 64]),
            format: ImageFormat::Png,
            defect: DefectKind::None,
            metadata: None,
        })
    }
}

/// Create a temp directory tree of small grayscale images.
/// Layout:
///   root/
///     gradient.png       (horizontal ramp)
///     gradient_copy.png  (same pixels)          ← duplicate of gradient.png
///     checker.png        (8px checkerboard)
///     broken.png         (not an image)
///     sub/
///       rotated.png      (gradient turned 90°)  ← duplicate only with transforms
fn create_test_tree(root: &Path) {
    fs::create_dir_all(root.join("sub")).unwrap();

    let gradient = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
    gradient.save(root.join("gradient.png")).unwrap();
    gradient.save(root.join("gradient_copy.png")).unwrap();
    image::imageops::rotate90(&gradient)
        .save(root.join("sub/rotated.png"))
        .unwrap();

    let checker = GrayImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Luma([40])
        } else {
            Luma([200])
        }
    });
    checker.save(root.join("checker.png")).unwrap();

    fs::write(root.join("broken.png"), b"this is not a png file").unwrap();
}

fn config_for(root: &Path, store: &Path) -> AppConfig {
    let mut config = AppConfig::new(vec![root.to_string_lossy().into_owned()]);
    config.store_path = store.to_string_lossy().into_owned();
    config
}

fn duplicate_names(results: &[CompareResult]) -> Vec<(String, String)> {
    let mut names: Vec<(String, String)> = results
        .iter()
        .filter_map(|r| match r {
            CompareResult::Duplicate { first, second, .. } => Some((
                first.path().name_with_extension().to_string(),
                second.path().name_with_extension().to_string(),
            )),
            _ => None,
        })
        .collect();
    names.sort();
    names
}

#[test]
fn test_full_scan_pipeline() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("state/test.store");

    let engine = ScanEngine::new(config_for(&root, &store));
    let cancel = AtomicBool::new(false);
    let result = engine.scan(&SilentReporter, &cancel).unwrap();

    assert_eq!(result.files_visited, 5);
    assert_eq!(result.decoded, 4);
    assert_eq!(result.failed, 1);
    assert_eq!(result.cache_hits, 0);
    assert!(!result.cancelled);
    assert_eq!(result.saved_records, Some(5));
    assert!(store.exists());

    assert_eq!(
        duplicate_names(&result.results),
        vec![("gradient.png".to_string(), "gradient_copy.png".to_string())]
    );
    assert_eq!(result.defect_count(), 1);
    let broken = result.results.iter().find_map(|r| match r {
        CompareResult::Defect { entity, defect } => Some((entity.path().name_with_extension().to_string(), *defect)),
        _ => None,
    });
    assert_eq!(broken, Some(("broken.png".to_string(), DefectKind::Unknown)));
}

#[test]
fn test_second_scan_is_served_from_store() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");
    let cancel = AtomicBool::new(false);

    let engine = ScanEngine::new(config_for(&root, &store));
    let first = engine.scan(&SilentReporter, &cancel).unwrap();
    let second = engine.scan(&SilentReporter, &cancel).unwrap();

    assert_eq!(second.cache_hits, 5);
    assert_eq!(second.decoded, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(second.saved_records, None);
    assert_eq!(
        duplicate_names(&second.results),
        duplicate_names(&first.results)
    );
    assert_eq!(engine.count_store().unwrap(), 5);
}

#[test]
fn test_changed_file_is_decoded_again() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");
    let cancel = AtomicBool::new(false);

    let engine = ScanEngine::new(config_for(&root, &store));
    engine.scan(&SilentReporter, &cancel).unwrap();

    let flat = GrayImage::from_fn(96, 96, |_, _| Luma([10]));
    flat.save(root.join("checker.png")).unwrap();

    let result = engine.scan(&SilentReporter, &cancel).unwrap();
    assert_eq!(result.decoded, 1);
    assert_eq!(result.cache_hits, 4);
    assert_eq!(result.saved_records, Some(5));
}

#[test]
fn test_transformed_matching_finds_rotated_copy() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");

    let mut config = config_for(&root, &store);
    config.compare.transformed_image = true;
    let result = ScanEngine::new(config)
        .scan(&SilentReporter, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(
        duplicate_names(&result.results),
        vec![
            ("gradient.png".to_string(), "gradient_copy.png".to_string()),
            ("gradient.png".to_string(), "rotated.png".to_string()),
            ("gradient_copy.png".to_string(), "rotated.png".to_string()),
        ]
    );
}

#[test]
fn test_corrupt_store_falls_back_to_empty() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");
    fs::write(&store, b"garbage that is not a store").unwrap();

    let engine = ScanEngine::new(config_for(&root, &store));
    let result = engine.scan(&SilentReporter, &AtomicBool::new(false)).unwrap();
    assert_eq!(result.decoded, 4);
    assert_eq!(engine.count_store().unwrap(), 5);
}

#[test]
fn test_cancelled_scan_skips_work() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");

    let engine = ScanEngine::new(config_for(&root, &store));
    let result = engine.scan(&SilentReporter, &AtomicBool::new(true)).unwrap();
    assert!(result.cancelled);
    assert!(result.results.is_empty());
    assert_eq!(result.decoded, 0);
    assert_eq!(result.saved_records, None);
    assert!(!store.exists());
}

#[test]
fn test_clear_store() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");

    let engine = ScanEngine::new(config_for(&root, &store));
    assert!(!engine.clear_store().unwrap());
    engine.scan(&SilentReporter, &AtomicBool::new(false)).unwrap();
    assert_eq!(engine.count_store().unwrap(), 5);

    assert!(engine.clear_store().unwrap());
    assert_eq!(engine.count_store().unwrap(), 0);
}

#[test]
fn test_cancel_mid_scan_keeps_finished_files() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    fs::create_dir_all(&root).unwrap();
    let image = GrayImage::from_fn(64, 64, |x, y| Luma([(x * 2 + y) as u8]));
    image.save(root.join("a.png")).unwrap();
    image.save(root.join("b.png")).unwrap();
    fs::write(root.join("stop.png"), b"STOP and cancel the scan").unwrap();
    image.save(root.join("z.png")).unwrap();
    let store = tmp.path().join("test.store");

    let cancel = Arc::new(AtomicBool::new(false));
    let decoders = DecoderChain::empty()
        .with(CancellingDecoder {
            cancel: Arc::clone(&cancel),
        })
        .with(ImageCrateDecoder);
    let engine = ScanEngine::new(config_for(&root, &store)).with_decoders(decoders);

    // One worker visits the files in path order.
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let result = pool.install(|| engine.scan(&SilentReporter, &cancel)).unwrap();

    assert!(result.cancelled);
    assert!(result.results.is_empty());
    assert_eq!(result.files_visited, 4);
    assert_eq!(result.decoded, 2);
    assert_eq!(result.saved_records, Some(2));

    let saved = FingerprintStore::new(0);
    assert_eq!(saved.load(&store, false, &LocalFileSystem).unwrap(), 2);
    assert!(saved.lookup(&PdPath::from_std(&root.join("a.png"))).is_some());
    assert!(saved.lookup(&PdPath::from_std(&root.join("b.png"))).is_some());
    assert!(saved.lookup(&PdPath::from_std(&root.join("stop.png"))).is_none());
    assert!(saved.lookup(&PdPath::from_std(&root.join("z.png"))).is_none());
}

#[cfg(unix)]
#[test]
fn test_non_unicode_file_names_are_scanned() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    fs::create_dir_all(&root).unwrap();
    let gradient = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
    gradient
        .save(root.join(OsStr::from_bytes(b"photo\xff.png")))
        .unwrap();
    gradient
        .save(root.join(OsStr::from_bytes(b"photo\xfe.png")))
        .unwrap();
    let store = tmp.path().join("test.store");

    let engine = ScanEngine::new(config_for(&root, &store));
    let result = engine.scan(&SilentReporter, &AtomicBool::new(false)).unwrap();
    assert_eq!(result.files_visited, 2);
    assert_eq!(result.decoded, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.defect_count(), 0);
    assert_eq!(result.duplicate_count(), 1);

    let second = engine.scan(&SilentReporter, &AtomicBool::new(false)).unwrap();
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.duplicate_count(), 1);
}

#[test]
fn test_undersized_fingerprint_grid_is_rejected() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let store = tmp.path().join("test.store");

    let mut config = config_for(&root, &store);
    config.compare.reduced_image_size = 2;
    let result = ScanEngine::new(config).scan(&SilentReporter, &AtomicBool::new(false));
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(!store.exists());
}

#[test]
fn test_store_path_override() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let configured = tmp.path().join("configured.store");
    let chosen = tmp.path().join("nested/chosen.store");

    let engine = ScanEngine::new(config_for(&root, &configured)).with_store_path(&chosen);
    assert_eq!(engine.store_path(), chosen.as_path());
    engine.scan(&SilentReporter, &AtomicBool::new(false)).unwrap();
    assert!(chosen.exists());
    assert!(!configured.exists());
}
