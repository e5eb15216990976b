use std::sync::Arc;

use pixel_duper_core::compare::metric;
use pixel_duper_core::config::{CompareAlgorithm, CompareOptions};
use pixel_duper_core::decoder::DecodedImage;
use pixel_duper_core::entity::{DefectKind, FingerprintEntity, ImageFormat};
use pixel_duper_core::identity::FileIdentity;
use pixel_duper_core::path::Path;
use pixel_duper_core::pixels::{CanonicalPixelBuffer, PixelFingerprint, Transform};
use pixel_duper_core::{CompareResult, Comparator, SilentReporter};

fn decoded_luma(width: u32, height: u32, pixels: Vec<u8>) -> DecodedImage {
    DecodedImage {
        buffer: CanonicalPixelBuffer::luma(width, height, pixels),
        format: ImageFormat::Png,
        defect: DefectKind::None,
        metadata: None,
    }
}

fn filled_entity(path: &str, decoded: &DecodedImage, options: &CompareOptions) -> FingerprintEntity {
    let mut entity = FingerprintEntity::new(FileIdentity::new(Path::new(path), 1, 1));
    entity.fill(decoded, options);
    entity
}

/// Cheap deterministic generator so the grids are reproducible.
fn noise_grid(side: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..side * side)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

fn fingerprint(main: &[u8], side: usize) -> PixelFingerprint {
    let mut fp = PixelFingerprint::new(side);
    fp.fill(main, 0);
    fp
}

#[test]
fn test_solid_gray_with_one_corner_pixel_is_duplicate() {
    let options = CompareOptions::default();
    assert_eq!(options.reduced_image_size, 32);
    assert_eq!(options.ignore_frame_width, 0);

    let gray = vec![128u8; 64 * 64];
    let mut touched = gray.clone();
    touched[0] = 0;

    let a = filled_entity("/a.png", &decoded_luma(64, 64, gray), &options);
    let b = filled_entity("/b.png", &decoded_luma(64, 64, touched), &options);
    let (fa, fb) = (a.fingerprint(32).unwrap(), b.fingerprint(32).unwrap());

    let comparator = Comparator::new(&options);
    let fast = comparator.fast_distance(fa.fast(), fb.fast());
    assert!(fast < 0.5, "fast distance {}", fast);

    let found = comparator.compare_pair(fa, fb).expect("expected a duplicate");
    assert_eq!(found.transform, Transform::Identity);
    assert!(found.difference < options.threshold_difference);
}

#[test]
fn test_fast_distance_never_exceeds_main_distance() {
    // Block averaging cannot increase a distance; rounding each cell to an
    // integer adds at most one grey level.
    let rounding = 1.0 / 255.0 * 100.0;
    for seed in 0..32 {
        let a = fingerprint(&noise_grid(32, seed), 32);
        let b = fingerprint(&noise_grid(32, seed + 1000), 32);

        let fast_abs = metric::mean_absolute(a.fast(), b.fast());
        let main_abs = metric::mean_absolute(a.main(), b.main());
        assert!(fast_abs <= main_abs + rounding, "seed {}: {} > {}", seed, fast_abs, main_abs);

        let fast_rms = metric::root_mean_square(a.fast(), b.fast());
        let main_rms = metric::root_mean_square(a.main(), b.main());
        assert!(fast_rms <= main_rms + rounding, "seed {}: {} > {}", seed, fast_rms, main_rms);
    }
}

#[test]
fn test_fast_rejection_stops_unrelated_images() {
    let mut options = CompareOptions::default();
    options.algorithm = CompareAlgorithm::Squared;
    let comparator = Comparator::new(&options);

    let black = fingerprint(&vec![0u8; 32 * 32], 32);
    let white = fingerprint(&vec![255u8; 32 * 32], 32);
    assert!(comparator.fast_distance(black.fast(), white.fast()) > options.fast_threshold_difference);
    assert!(comparator.compare_pair(&black, &white).is_none());
}

#[test]
fn test_mirrored_copy_found_with_transformed_matching() {
    let mut options = CompareOptions::default();
    options.transformed_image = true;
    options.check_on_defect = false;

    let side = 32;
    let main: Vec<u8> = (0..side * side)
        .map(|i| {
            let (x, y) = (i % side, i / side);
            (x * 6 + y * 2) as u8
        })
        .collect();
    let original = fingerprint(&main, side);
    let mirrored = original.transformed(Transform::Mirror);

    let mut a = FingerprintEntity::new(FileIdentity::new(Path::new("/a.png"), 1, 1));
    a.set_fingerprint(original);
    let mut b = FingerprintEntity::new(FileIdentity::new(Path::new("/b.png"), 1, 1));
    b.set_fingerprint(mirrored);

    let entities = vec![Arc::new(a), Arc::new(b)];
    let results = Comparator::new(&options).run(&entities, &SilentReporter);
    assert_eq!(results.len(), 1);
    match &results[0] {
        CompareResult::Duplicate {
            first,
            second,
            transform,
            difference,
        } => {
            assert_eq!(first.path().as_str(), "/a.png");
            assert_eq!(second.path().as_str(), "/b.png");
            assert_eq!(*transform, Transform::Mirror);
            assert!(*difference < 1e-3);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_defect_findings_are_reported_per_image() {
    let mut options = CompareOptions::default();
    options.check_on_equality = false;

    let pixels = vec![90u8; 100 * 100];
    let mut truncated = decoded_luma(100, 100, pixels.clone());
    truncated.format = ImageFormat::Jpeg;
    truncated.defect = DefectKind::JpegEndMarkerIsAbsent;

    let healthy = filled_entity("/ok.png", &decoded_luma(100, 100, pixels), &options);
    let broken = filled_entity("/broken.jpg", &truncated, &options);
    let mut unreadable = FingerprintEntity::new(FileIdentity::new(Path::new("/junk.png"), 1, 1));
    unreadable.mark_undecodable();

    let entities = vec![Arc::new(healthy), Arc::new(broken), Arc::new(unreadable)];
    let results = Comparator::new(&options).run(&entities, &SilentReporter);

    let defects: Vec<(String, DefectKind)> = results
        .iter()
        .map(|r| match r {
            CompareResult::Defect { entity, defect } => (entity.path().as_str().to_string(), *defect),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(
        defects,
        vec![
            ("/broken.jpg".to_string(), DefectKind::JpegEndMarkerIsAbsent),
            ("/junk.png".to_string(), DefectKind::Unknown),
        ]
    );
}
