//! Entry points over flat numeric buffers for callers that cannot use the typed API.
//!
//! Peaks are passed as interleaved `[mz, intensity, mz, intensity, ...]` slices and
//! optional parameters use negative sentinel values to mean "unset".
#![allow(clippy::too_many_arguments)]

use mzpeaks::Tolerance;

use crate::api::SimilarityEngine;
use crate::clean::{clean_peaks, CleaningParameters, Normalization};
use crate::error::EntropyError;
use crate::peaks::{peaks_from_interleaved, Spectrum};
use crate::scorer::{EntropySimilarity, ScoreType, UnweightedEntropyScorer, WeightedEntropyScorer};
use crate::tolerance::ToleranceWindow;

/// The sentinel for an unset value
pub const UNSET: f64 = -1.0;

#[inline]
fn non_negative(value: f64) -> Option<f64> {
    if value < 0.0 {
        None
    } else {
        Some(value)
    }
}

#[inline]
fn positive(value: f64) -> Option<f64> {
    if value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Map a normalization code onto [`Normalization`]: `0` for none, `1` for sum and
/// `2` for base peak. Any negative code means no normalization.
pub fn normalization_from_code(code: i32) -> Result<Normalization, EntropyError> {
    match code {
        c if c < 0 => Ok(Normalization::None),
        0 => Ok(Normalization::None),
        1 => Ok(Normalization::Sum),
        2 => Ok(Normalization::Max),
        c => Err(EntropyError::invalid_parameter(
            "normalize",
            format!("unknown normalization code {c}"),
        )),
    }
}

/// Cleaning parameters in their flat, sentinel-encoded form.
///
/// Negative floating point values and non-positive counts are unset. A negative
/// `min_peak_distance` disables merging except for exact duplicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentinelCleaning {
    pub min_mz: f64,
    pub max_mz: f64,
    pub noise_threshold: f64,
    pub min_peak_distance: f64,
    /// Whether `min_peak_distance` is in ppm rather than Daltons
    pub distance_in_ppm: bool,
    pub max_peak_count: i64,
    pub normalize: i32,
}

impl Default for SentinelCleaning {
    fn default() -> Self {
        Self {
            min_mz: UNSET,
            max_mz: UNSET,
            noise_threshold: 0.01,
            min_peak_distance: 0.05,
            distance_in_ppm: false,
            max_peak_count: -1,
            normalize: 1,
        }
    }
}

impl TryFrom<&SentinelCleaning> for CleaningParameters {
    type Error = EntropyError;

    fn try_from(value: &SentinelCleaning) -> Result<Self, Self::Error> {
        let distance = non_negative(value.min_peak_distance).map(|d| {
            if value.distance_in_ppm {
                Tolerance::PPM(d)
            } else {
                Tolerance::Da(d)
            }
        });
        let max_peak_count = if value.max_peak_count > 0 {
            Some(usize::try_from(value.max_peak_count).map_err(|_| {
                EntropyError::invalid_parameter(
                    "max_peak_count",
                    format!("{} does not fit in memory", value.max_peak_count),
                )
            })?)
        } else {
            None
        };
        let params = CleaningParameters::passthrough()
            .with_mz_range(non_negative(value.min_mz), non_negative(value.max_mz))
            .with_noise_threshold(non_negative(value.noise_threshold))
            .with_min_peak_distance(distance)
            .with_max_peak_count(max_peak_count)
            .with_normalize(normalization_from_code(value.normalize)?);
        params.validate()?;
        Ok(params)
    }
}

impl TryFrom<SentinelCleaning> for CleaningParameters {
    type Error = EntropyError;

    fn try_from(value: SentinelCleaning) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

/// Build the tolerance window from flat values. A negative Dalton tolerance is unset,
/// so `0.0` requires an exact m/z match. A non-positive ppm tolerance is unset.
pub fn tolerance_from_sentinels(tolerance_da: f64, tolerance_ppm: f64) -> ToleranceWindow {
    ToleranceWindow::new(non_negative(tolerance_da), positive(tolerance_ppm))
}

/// Clean the interleaved peak list in `peaks` in place, returning the number of peaks
/// kept. The kept peaks occupy the first `2 * n` entries of the buffer, sorted by
/// m/z, and the remainder is zero-filled.
///
/// Peaks with a non-positive m/z or intensity are discarded before cleaning.
pub fn clean_spectrum(
    peaks: &mut [f64],
    min_mz: f64,
    max_mz: f64,
    noise_threshold: f64,
    min_peak_distance: f64,
    distance_in_ppm: bool,
    max_peak_count: i64,
    normalize: i32,
) -> Result<usize, EntropyError> {
    let sentinels = SentinelCleaning {
        min_mz,
        max_mz,
        noise_threshold,
        min_peak_distance,
        distance_in_ppm,
        max_peak_count,
        normalize,
    };
    clean_spectrum_with(peaks, &sentinels)
}

/// As [`clean_spectrum`] with the parameters collected in a [`SentinelCleaning`]
pub fn clean_spectrum_with(
    peaks: &mut [f64],
    sentinels: &SentinelCleaning,
) -> Result<usize, EntropyError> {
    let params = CleaningParameters::try_from(sentinels)?;
    let raw = peaks_from_interleaved(peaks)?;
    let cleaned = clean_peaks(raw, &params)?;
    let n = cleaned.len();
    let (head, tail) = peaks.split_at_mut(2 * n);
    for (chunk, peak) in head.chunks_exact_mut(2).zip(cleaned.iter()) {
        chunk[0] = peak.mz;
        chunk[1] = peak.intensity;
    }
    tail.fill(0.0);
    Ok(n)
}

fn prepare_side(
    peaks: &[f64],
    clean: Option<&SentinelCleaning>,
    tolerance: Tolerance,
) -> Result<Spectrum, EntropyError> {
    match clean {
        Some(sentinels) => {
            let params = CleaningParameters::try_from(sentinels)?.widened_for(tolerance);
            clean_peaks(peaks_from_interleaved(peaks)?, &params)
        }
        None => Spectrum::from_interleaved(peaks),
    }
}

fn score_buffers<S: EntropySimilarity + Sync>(
    scorer: S,
    peaks_a: &[f64],
    peaks_b: &[f64],
    tolerance_da: f64,
    tolerance_ppm: f64,
    clean_a: Option<&SentinelCleaning>,
    clean_b: Option<&SentinelCleaning>,
) -> Result<ScoreType, EntropyError> {
    let engine = SimilarityEngine::new(scorer, tolerance_from_sentinels(tolerance_da, tolerance_ppm))?;
    let tolerance = engine.aligner().tolerance();
    let a = prepare_side(peaks_a, clean_a, tolerance)?;
    let b = prepare_side(peaks_b, clean_b, tolerance)?;
    Ok(engine.score(&a, &b))
}

/// Weighted entropy similarity of two interleaved peak lists.
///
/// A side without cleaning parameters must already be a valid spectrum. A side with
/// cleaning parameters may contain empty peaks, which are dropped.
pub fn weighted_entropy_similarity(
    peaks_a: &[f64],
    peaks_b: &[f64],
    tolerance_da: f64,
    tolerance_ppm: f64,
    clean_a: Option<&SentinelCleaning>,
    clean_b: Option<&SentinelCleaning>,
) -> Result<ScoreType, EntropyError> {
    score_buffers(
        WeightedEntropyScorer::default(),
        peaks_a,
        peaks_b,
        tolerance_da,
        tolerance_ppm,
        clean_a,
        clean_b,
    )
}

/// Unweighted entropy similarity of two interleaved peak lists.
///
/// See [`weighted_entropy_similarity`] for the treatment of cleaning.
pub fn unweighted_entropy_similarity(
    peaks_a: &[f64],
    peaks_b: &[f64],
    tolerance_da: f64,
    tolerance_ppm: f64,
    clean_a: Option<&SentinelCleaning>,
    clean_b: Option<&SentinelCleaning>,
) -> Result<ScoreType, EntropyError> {
    score_buffers(
        UnweightedEntropyScorer::default(),
        peaks_a,
        peaks_b,
        tolerance_da,
        tolerance_ppm,
        clean_a,
        clean_b,
    )
}
