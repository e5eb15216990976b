pub mod metric;

use crate::config::{CompareAlgorithm, CompareOptions};
use crate::entity::{DefectKind, FingerprintEntity};
use crate::pixels::{PixelFingerprint, Transform, FAST_SIDE};
use crate::progress::ProgressReporter;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of comparing one pair of fingerprints that survived every check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairMatch {
    /// Orientation applied to the second image to line it up with the first.
    pub transform: Transform,
    /// Detailed difference in percent.
    pub difference: f64,
}

#[derive(Debug, Clone)]
pub enum CompareResult {
    Duplicate {
        first: Arc<FingerprintEntity>,
        second: Arc<FingerprintEntity>,
        transform: Transform,
        difference: f64,
    },
    Defect {
        entity: Arc<FingerprintEntity>,
        defect: DefectKind,
    },
}

impl CompareResult {
    pub fn kind(&self) -> &'static str {
        match self {
            CompareResult::Duplicate { .. } => "duplicate",
            CompareResult::Defect { .. } => "defect",
        }
    }
}

/// Pairwise duplicate search and per-image defect reporting.
pub struct Comparator<'a> {
    options: &'a CompareOptions,
}

impl<'a> Comparator<'a> {
    pub fn new(options: &'a CompareOptions) -> Self {
        Self { options }
    }

    /// Distance between the 4×4 grids, metric chosen by the algorithm.
    pub fn fast_distance(&self, a: &[u8], b: &[u8]) -> f64 {
        match self.options.algorithm {
            CompareAlgorithm::Squared => metric::root_mean_square(a, b),
            CompareAlgorithm::Ssim => metric::mean_absolute(a, b),
        }
    }

    /// Full check of one pair: fast rejection, orientation search and the
    /// detailed score. `None` when the pair is not a duplicate.
    pub fn compare_pair(&self, a: &PixelFingerprint, b: &PixelFingerprint) -> Option<PairMatch> {
        if a.side() != b.side() || !a.filled() || !b.filled() {
            return None;
        }
        let transform = self.best_orientation(a, b)?;
        let b_main = transform.apply_grid(b.main(), b.side());
        let difference = match self.options.algorithm {
            CompareAlgorithm::Squared => metric::root_mean_square(a.main(), &b_main),
            CompareAlgorithm::Ssim => metric::structural_difference(a, b, &b_main),
        };
        if difference < self.options.threshold_difference {
            Some(PairMatch {
                transform,
                difference,
            })
        } else {
            None
        }
    }

    /// Orientation of `b` with the lowest fast distance, if that distance
    /// passes the fast threshold.
    fn best_orientation(&self, a: &PixelFingerprint, b: &PixelFingerprint) -> Option<Transform> {
        let candidates: &[Transform] = if self.options.transformed_image {
            &Transform::ALL
        } else {
            &[Transform::Identity]
        };
        let mut best: Option<(Transform, f64)> = None;
        for &transform in candidates {
            let distance = if transform == Transform::Identity {
                self.fast_distance(a.fast(), b.fast())
            } else {
                self.fast_distance(a.fast(), &transform.apply_grid(b.fast(), FAST_SIDE))
            };
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((transform, distance));
            }
        }
        best.filter(|&(_, d)| d <= self.options.fast_threshold_difference)
            .map(|(t, _)| t)
    }

    /// Defect findings followed by duplicate pairs.
    pub fn run(
        &self,
        entities: &[Arc<FingerprintEntity>],
        reporter: &dyn ProgressReporter,
    ) -> Vec<CompareResult> {
        let mut results = Vec::new();
        if self.options.check_on_defect
            || self.options.check_on_blockiness
            || self.options.check_on_blurring
        {
            results.extend(self.find_defects(entities));
        }
        if self.options.check_on_equality {
            results.extend(self.find_duplicates(entities, reporter));
        }
        results
    }

    pub fn find_defects(&self, entities: &[Arc<FingerprintEntity>]) -> Vec<CompareResult> {
        let defects: Vec<CompareResult> = entities
            .iter()
            .filter_map(|entity| match entity.classify_defect(self.options) {
                DefectKind::None | DefectKind::Undefined => None,
                defect => Some(CompareResult::Defect {
                    entity: Arc::clone(entity),
                    defect,
                }),
            })
            .collect();
        debug!("{} defect findings", defects.len());
        defects
    }

    pub fn find_duplicates(
        &self,
        entities: &[Arc<FingerprintEntity>],
        reporter: &dyn ProgressReporter,
    ) -> Vec<CompareResult> {
        let side = self.options.reduced_image_size;
        let pairs = CandidatePairs::new(entities, side, self.options.transformed_image);
        let total = pairs.count();
        info!("Comparing {} candidate pairs", total);
        reporter.on_compare_start(total);

        let done = AtomicUsize::new(0);
        let mut duplicates: Vec<CompareResult> = pairs
            .par_iter()
            .filter_map(|(i, j)| {
                let (a, b) = (&entities[i], &entities[j]);
                let outcome = match (a.fingerprint(side), b.fingerprint(side)) {
                    (Some(fa), Some(fb)) => self.compare_pair(fa, fb),
                    _ => None,
                };
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % 1024 == 0 || finished == total {
                    reporter.on_compare_progress(finished, total);
                }
                outcome.map(|found| duplicate(a, b, found))
            })
            .collect();

        duplicates.sort_by(|x, y| match (x, y) {
            (
                CompareResult::Duplicate { difference: dx, first: fx, .. },
                CompareResult::Duplicate { difference: dy, first: fy, .. },
            ) => dx
                .total_cmp(dy)
                .then_with(|| fx.path().cmp(fy.path())),
            _ => std::cmp::Ordering::Equal,
        });
        debug!("{} duplicate pairs", duplicates.len());
        duplicates
    }
}

/// Aspect codes further apart than this never form a candidate pair.
const RATIO_TOLERANCE: i32 = 1;

/// Entities holding a filled fingerprint of one side, bucketed by aspect
/// code. Pairs are produced lazily, so memory stays linear in the number of
/// entities.
pub struct CandidatePairs<'a> {
    entities: &'a [Arc<FingerprintEntity>],
    /// `(aspect key, entity index)`, sorted.
    members: Vec<(i32, usize)>,
}

impl<'a> CandidatePairs<'a> {
    /// With `transformed` set, a turned copy has the negated aspect code, so
    /// only its magnitude is bucketed.
    pub fn new(entities: &'a [Arc<FingerprintEntity>], side: usize, transformed: bool) -> Self {
        let mut members: Vec<(i32, usize)> = entities
            .iter()
            .enumerate()
            .filter(|(_, entity)| entity.fingerprint(side).is_some())
            .map(|(index, entity)| {
                let key = if transformed { entity.ratio.abs() } else { entity.ratio };
                (key, index)
            })
            .collect();
        members.sort_unstable();
        Self { entities, members }
    }

    /// Members after `k` whose aspect key is within tolerance.
    fn window(&self, k: usize) -> &[(i32, usize)] {
        let key = self.members[k].0;
        let rest = &self.members[k + 1..];
        let end = rest.partition_point(|&(other, _)| other - key <= RATIO_TOLERANCE);
        &rest[..end]
    }

    /// Index pairs `(i, j)` with `i < j`. The same file reached twice is
    /// never paired with itself.
    pub fn par_iter(&self) -> impl ParallelIterator<Item = (usize, usize)> + '_ {
        (0..self.members.len()).into_par_iter().flat_map_iter(move |k| {
            let first = self.members[k].1;
            self.window(k)
                .iter()
                .map(move |&(_, second)| (first.min(second), first.max(second)))
                .filter(move |&(i, j)| self.entities[i].path() != self.entities[j].path())
        })
    }

    pub fn count(&self) -> usize {
        self.par_iter().count()
    }
}

/// Images under a valid root are listed first.
fn duplicate(a: &Arc<FingerprintEntity>, b: &Arc<FingerprintEntity>, found: PairMatch) -> CompareResult {
    if b.valid && !a.valid {
        CompareResult::Duplicate {
            first: Arc::clone(b),
            second: Arc::clone(a),
            transform: inverse(found.transform),
            difference: found.difference,
        }
    } else {
        CompareResult::Duplicate {
            first: Arc::clone(a),
            second: Arc::clone(b),
            transform: found.transform,
            difference: found.difference,
        }
    }
}

/// Orientation that undoes `transform`.
fn inverse(transform: Transform) -> Transform {
    if transform.mirrored() {
        // a mirror conjugates turns into their inverses, so the composition
        // is its own inverse
        transform
    } else {
        let code = (4 - transform.turns() as u8) % 4;
        Transform::from_code(code).unwrap_or(Transform::Identity)
    }
}
