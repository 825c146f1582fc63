use template::{FirDataType, FirRecord, Minutia};
use tracing::{debug, trace};

use crate::types::{MatchError, MatchResult, MatcherConfig, SampleInfo, SecurityLevel};


/// Squared radius inside which two same-kind points of a raw record are
/// treated as one.
const MERGE_RADIUS_SQ: u32 = 4;

/// Pairwise comparison contract shared by verification and identification.
///
/// Implementations must be deterministic, symmetric (`score(a, b) ==
/// score(b, a)`) and reflexive (a non-empty sample scores 100 against
/// itself).
pub trait Matcher: Send + Sync {
    /// Derive the indexed feature representation of a processed record.
    fn extract(&self, record: &FirRecord) -> Result<SampleInfo, MatchError>;

    /// Similarity of two samples on the `0..=100` scale.
    fn score(&self, probe: &SampleInfo, candidate: &SampleInfo) -> u8;

    /// Cheap bound that `score(probe, candidate)` never exceeds.
    ///
    /// Search engines use it to skip candidates that cannot clear a level,
    /// so it must never be lower than the real score.
    fn score_upper_bound(&self, _probe: &SampleInfo, _candidate: &SampleInfo) -> u8 {
        100
    }

    /// Level a 1:1 verify must clear.
    fn verify_level(&self) -> SecurityLevel;

    /// Fewest feature points a sample needs to be enrolled for search.
    ///
    /// Sparser samples still verify; search engines refuse to index them.
    fn min_enroll_minutiae(&self) -> usize {
        1
    }

    /// Turn a raw record into a matchable one. Processed records are
    /// returned unchanged.
    fn process(&self, record: &FirRecord) -> Result<FirRecord, MatchError>;

    /// Compare two decoded records. On a match the result carries the
    /// payload bound into `stored`.
    fn verify_records(
        &self,
        probe: &FirRecord,
        stored: &FirRecord,
    ) -> Result<MatchResult, MatchError> {
        let a = self.extract(probe)?;
        let b = self.extract(stored)?;
        let score = self.score(&a, &b);
        let matched = self.verify_level().clears(score);
        trace!(score, matched, "verified record pair");
        Ok(MatchResult {
            matched,
            score,
            payload: if matched {
                stored.payload.clone().unwrap_or_default()
            } else {
                Vec::new()
            },
        })
    }
}

/// Reference matcher pairing feature points by position and direction.
///
/// Two points pair when they lie within `distance_tolerance` pixels and
/// `angle_tolerance` direction units of each other. Pairing is one-to-one
/// and greedy over candidate pairs in canonical order, so the pair count of
/// `(a, b)` and `(b, a)` is identical. The score is
/// `100 * 2 * pairs / (|a| + |b|)`.
#[derive(Debug, Clone, Default)]
pub struct MinutiaeMatcher {
    config: MatcherConfig,
}

impl MinutiaeMatcher {
    pub fn new(config: MatcherConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn pair_count(&self, a: &[Minutia], b: &[Minutia]) -> usize {
        let tolerance_sq = u32::from(self.config.distance_tolerance).pow(2);
        let angle_tolerance = self.config.angle_tolerance;

        let mut candidates: Vec<(u32, u8, Minutia, Minutia, usize, usize)> = Vec::new();
        for (i, p) in a.iter().enumerate() {
            for (j, q) in b.iter().enumerate() {
                let dist = p.distance_sq(q);
                let angle = p.angle_diff(q);
                if dist <= tolerance_sq && angle <= angle_tolerance {
                    let (lo, hi) = if p <= q { (*p, *q) } else { (*q, *p) };
                    candidates.push((dist, angle, lo, hi, i, j));
                }
            }
        }
        // Order only by values so that swapping the operands sees the same
        // sequence; index ties carry interchangeable points.
        candidates.sort_unstable_by_key(|&(dist, angle, lo, hi, _, _)| (dist, angle, lo, hi));

        let mut used_a = vec![false; a.len()];
        let mut used_b = vec![false; b.len()];
        let mut pairs = 0;
        for (_, _, _, _, i, j) in candidates {
            if !used_a[i] && !used_b[j] {
                used_a[i] = true;
                used_b[j] = true;
                pairs += 1;
            }
        }
        pairs
    }
}

impl Matcher for MinutiaeMatcher {
    fn extract(&self, record: &FirRecord) -> Result<SampleInfo, MatchError> {
        if record.data_type != FirDataType::Processed {
            return Err(MatchError::RequiresProcessedData);
        }
        if record.minutiae.is_empty() {
            return Err(MatchError::InvalidData("record has no feature points".into()));
        }
        let mut minutiae = record.minutiae.clone();
        minutiae.sort_unstable();
        Ok(SampleInfo {
            minutiae,
            quality: record.quality,
            purpose: record.purpose,
        })
    }

    fn score(&self, probe: &SampleInfo, candidate: &SampleInfo) -> u8 {
        let total = probe.len() + candidate.len();
        if probe.is_empty() || candidate.is_empty() {
            return 0;
        }
        let pairs = self.pair_count(&probe.minutiae, &candidate.minutiae);
        // pairs <= min(|a|, |b|), so the ratio is at most 100
        ((200 * pairs) / total) as u8
    }

    fn score_upper_bound(&self, probe: &SampleInfo, candidate: &SampleInfo) -> u8 {
        let total = probe.len() + candidate.len();
        if total == 0 {
            return 0;
        }
        ((200 * probe.len().min(candidate.len())) / total) as u8
    }

    fn verify_level(&self) -> SecurityLevel {
        self.config.verify_level
    }

    fn min_enroll_minutiae(&self) -> usize {
        self.config.min_minutiae
    }

    fn process(&self, record: &FirRecord) -> Result<FirRecord, MatchError> {
        if record.is_processed() {
            return Ok(record.clone());
        }

        let mut sorted = record.minutiae.clone();
        sorted.sort_unstable();
        let mut kept: Vec<Minutia> = Vec::with_capacity(sorted.len());
        for point in sorted {
            let duplicate = kept.iter().any(|k| {
                k.kind == point.kind
                    && k.distance_sq(&point) <= MERGE_RADIUS_SQ
                    && k.angle_diff(&point) <= self.config.angle_tolerance
            });
            if !duplicate {
                kept.push(point);
            }
        }
        if kept.is_empty() {
            return Err(MatchError::InvalidData("raw record has no feature points".into()));
        }

        debug!(
            raw = record.minutiae.len(),
            processed = kept.len(),
            "processed raw record"
        );
        Ok(FirRecord {
            data_type: FirDataType::Processed,
            minutiae: kept,
            ..record.clone()
        })
    }
}
