//! Spectrum cleaning: range filtering, centroid merging, denoising, capping and
//! intensity normalization.
//!
//! The pipeline is applied in a fixed order:
//!
//! 1. Drop empty peaks, those with `m/z <= 0` or `intensity <= 0`
//! 2. Drop peaks outside of [`CleaningParameters::min_mz`] and [`CleaningParameters::max_mz`]
//! 3. Merge peaks closer than [`CleaningParameters::min_peak_distance`]
//! 4. Drop peaks below [`CleaningParameters::noise_threshold`] times the base peak intensity
//! 5. Keep the [`CleaningParameters::max_peak_count`] most intense peaks
//! 6. Rescale intensities according to [`CleaningParameters::normalize`]
use itertools::Itertools;
use mzpeaks::Tolerance;
use tracing::trace;

use crate::error::EntropyError;
use crate::peaks::{sort_by_mz, Peak, Spectrum};
use crate::tolerance::{check_tolerance, scale_tolerance, tolerance_width};

/// How to rescale intensities at the end of cleaning
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Normalization {
    /// Leave intensities untouched
    None,
    /// Rescale so that intensities sum to 1
    #[default]
    Sum,
    /// Rescale so that the base peak has an intensity of 100
    Max,
}

/// The parameters controlling [`SpectrumCleaner`]. Every `None` bound disables that
/// constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CleaningParameters {
    /// Peaks with a lower m/z are dropped
    pub min_mz: Option<f64>,
    /// Peaks with a higher m/z are dropped
    pub max_mz: Option<f64>,
    /// The fraction of the base peak intensity a peak must reach to be kept
    pub noise_threshold: Option<f64>,
    /// Peaks at least this close together are merged. When `None`, only peaks with
    /// identical m/z are merged.
    pub min_peak_distance: Option<Tolerance>,
    /// The maximum number of peaks to keep, selected by intensity
    pub max_peak_count: Option<usize>,
    pub normalize: Normalization,
}

impl Default for CleaningParameters {
    fn default() -> Self {
        Self {
            min_mz: None,
            max_mz: None,
            noise_threshold: Some(0.01),
            min_peak_distance: Some(Tolerance::Da(0.05)),
            max_peak_count: None,
            normalize: Normalization::Sum,
        }
    }
}

impl CleaningParameters {
    /// A parameter set that disables every step but exact-duplicate merging
    pub fn passthrough() -> Self {
        Self {
            min_mz: None,
            max_mz: None,
            noise_threshold: None,
            min_peak_distance: None,
            max_peak_count: None,
            normalize: Normalization::None,
        }
    }

    pub fn with_mz_range(mut self, min_mz: Option<f64>, max_mz: Option<f64>) -> Self {
        self.min_mz = min_mz;
        self.max_mz = max_mz;
        self
    }

    pub fn with_noise_threshold(mut self, noise_threshold: Option<f64>) -> Self {
        self.noise_threshold = noise_threshold;
        self
    }

    pub fn with_min_peak_distance(mut self, min_peak_distance: Option<Tolerance>) -> Self {
        self.min_peak_distance = min_peak_distance;
        self
    }

    pub fn with_max_peak_count(mut self, max_peak_count: Option<usize>) -> Self {
        self.max_peak_count = max_peak_count;
        self
    }

    pub fn with_normalize(mut self, normalize: Normalization) -> Self {
        self.normalize = normalize;
        self
    }

    /// Widen the merge distance so that peaks of a cleaned spectrum are at least
    /// twice `tolerance` apart. A relative distance wins over an absolute one.
    pub fn widened_for(&self, tolerance: Tolerance) -> Self {
        let widened = scale_tolerance(tolerance, 2.0);
        let distance = match (widened, self.min_peak_distance) {
            (Tolerance::PPM(p), Some(Tolerance::PPM(q))) => Tolerance::PPM(p.max(q)),
            (Tolerance::Da(d), Some(Tolerance::Da(e))) => Tolerance::Da(d.max(e)),
            (Tolerance::Da(_), Some(ppm @ Tolerance::PPM(_))) => ppm,
            (w, _) => w,
        };
        self.with_min_peak_distance(Some(distance))
    }

    /// Reject non-finite or negative bounds
    pub fn validate(&self) -> Result<(), EntropyError> {
        for (name, value) in [
            ("min_mz", self.min_mz),
            ("max_mz", self.max_mz),
            ("noise_threshold", self.noise_threshold),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(EntropyError::invalid_parameter(
                        name,
                        format!("must be finite, got {v}"),
                    ));
                }
            }
        }
        if let Some(tol) = self.min_peak_distance {
            check_tolerance("min_peak_distance", tol)?;
        }
        Ok(())
    }

    #[inline]
    fn in_range(&self, mz: f64) -> bool {
        self.min_mz.map_or(true, |lo| mz >= lo) && self.max_mz.map_or(true, |hi| mz <= hi)
    }
}

/// Whether `upper` is close enough to `lower` to be merged into it
#[inline]
fn within_distance(lower: f64, upper: f64, distance: Option<Tolerance>) -> bool {
    let width = distance.map_or(0.0, |d| tolerance_width(d, lower));
    upper - lower <= width
}

/// Merge runs of mz-sorted peaks whose neighbors are within `distance` of each other.
///
/// A chain of close peaks collapses into one peak even when its ends are further
/// apart than `distance`. The width of a relative distance is taken at the lower of
/// each neighboring pair so that merging an already merged list is a no-op.
fn merge_adjacent(peaks: Vec<Peak>, distance: Option<Tolerance>) -> Vec<Peak> {
    let mut merged: Vec<Peak> = Vec::with_capacity(peaks.len());
    let mut last_mz = f64::NEG_INFINITY;
    for peak in peaks {
        if within_distance(last_mz, peak.mz, distance) {
            if let Some(current) = merged.last_mut() {
                current.merge(&peak);
            }
        } else {
            merged.push(peak);
        }
        last_mz = peak.mz;
    }
    merged
}

/// Check whether every pair of neighboring peaks is further apart than `distance`
pub fn is_centroided(spectrum: &Spectrum, distance: Option<Tolerance>) -> bool {
    spectrum
        .iter()
        .tuple_windows()
        .all(|(a, b)| !within_distance(a.mz, b.mz, distance))
}

/// Merge neighboring peaks closer than `distance`, yielding a spectrum for which
/// [`is_centroided`] holds.
pub fn centroid(spectrum: Spectrum, distance: Option<Tolerance>) -> Spectrum {
    if is_centroided(&spectrum, distance) {
        return spectrum;
    }
    Spectrum::from_sorted_unchecked(merge_adjacent(spectrum.into_peaks(), distance))
}

fn normalize_peaks(peaks: &mut Vec<Peak>, mode: Normalization) {
    match mode {
        Normalization::None => {}
        Normalization::Sum => {
            // Summed relative to the base peak, so the total stays finite
            let base_peak = peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);
            if base_peak > 0.0 {
                let total: f64 = peaks.iter().map(|p| p.intensity / base_peak).sum();
                peaks
                    .iter_mut()
                    .for_each(|p| p.intensity = p.intensity / base_peak / total);
            } else {
                peaks.clear();
            }
        }
        Normalization::Max => {
            let base_peak = peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);
            if base_peak > 0.0 {
                peaks
                    .iter_mut()
                    .for_each(|p| p.intensity = p.intensity / base_peak * 100.0);
            } else {
                peaks.clear();
            }
        }
    }
}

/// Rescale the intensities of `spectrum`. A spectrum with no signal can't be
/// rescaled and becomes empty.
pub fn normalize(spectrum: Spectrum, mode: Normalization) -> Spectrum {
    let mut peaks = spectrum.into_peaks();
    normalize_peaks(&mut peaks, mode);
    Spectrum::from_sorted_unchecked(peaks)
}

/// Applies a fixed, validated [`CleaningParameters`] to any number of spectra
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SpectrumCleaner {
    params: CleaningParameters,
}

impl SpectrumCleaner {
    /// # Errors
    /// Parameters rejected by [`CleaningParameters::validate`]
    pub fn new(params: CleaningParameters) -> Result<Self, EntropyError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &CleaningParameters {
        &self.params
    }

    /// Run the full cleaning pipeline on `spectrum`, returning a new, m/z-sorted
    /// spectrum with unique peak positions.
    #[tracing::instrument(level = "trace", skip_all, fields(n_peaks = spectrum.len()))]
    pub fn clean(&self, spectrum: Spectrum) -> Spectrum {
        let params = &self.params;
        let mut peaks = spectrum.into_peaks();

        peaks.retain(|p| !p.is_empty() && params.in_range(p.mz));
        trace!("{} peaks after range filter", peaks.len());
        if peaks.is_empty() {
            return Spectrum::empty();
        }

        let mut peaks = merge_adjacent(peaks, params.min_peak_distance);
        trace!("{} peaks after merging", peaks.len());

        if let Some(threshold) = params.noise_threshold.filter(|t| *t > 0.0) {
            let cutoff = threshold * peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);
            peaks.retain(|p| p.intensity >= cutoff);
            trace!("{} peaks above noise cutoff {cutoff}", peaks.len());
        }

        if let Some(n) = params.max_peak_count.filter(|n| *n > 0) {
            if peaks.len() > n {
                peaks.select_nth_unstable_by(n - 1, Peak::cmp_intensity_desc);
                peaks.truncate(n);
                sort_by_mz(&mut peaks);
            }
        }

        normalize_peaks(&mut peaks, params.normalize);
        Spectrum::from_sorted_unchecked(peaks)
    }

    /// Validate raw, possibly unsorted peaks and clean them. Empty peaks, including
    /// those with negative intensities, are dropped rather than rejected.
    ///
    /// # Errors
    /// Non-finite values are rejected.
    pub fn clean_peaks(&self, mut peaks: Vec<Peak>) -> Result<Spectrum, EntropyError> {
        for (i, p) in peaks.iter().enumerate() {
            p.check_finite(i)?;
        }
        let n_before = peaks.len();
        peaks.retain(|p| !p.is_empty());
        if peaks.len() != n_before {
            trace!("Dropped {} empty peaks", n_before - peaks.len());
        }
        sort_by_mz(&mut peaks);
        Ok(self.clean(Spectrum::from_sorted_unchecked(peaks)))
    }
}

/// Clean `spectrum` once with `params`.
///
/// See [`SpectrumCleaner::clean`]. Prefer holding a [`SpectrumCleaner`] when cleaning
/// many spectra with the same parameters.
pub fn clean_spectrum(
    spectrum: Spectrum,
    params: &CleaningParameters,
) -> Result<Spectrum, EntropyError> {
    Ok(SpectrumCleaner::new(*params)?.clean(spectrum))
}

/// Validate and clean raw peaks once with `params`.
///
/// See [`SpectrumCleaner::clean_peaks`].
pub fn clean_peaks(peaks: Vec<Peak>, params: &CleaningParameters) -> Result<Spectrum, EntropyError> {
    SpectrumCleaner::new(*params)?.clean_peaks(peaks)
}
