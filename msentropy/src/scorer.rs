//! Spectral entropy and entropy similarity scoring
//!
//! The entropy similarity of two spectra with intensity distributions $`p`$ and $`q`$,
//! each summing to 1, is one minus their normalized Jensen-Shannon divergence:
//!
//! ```math
//! \begin{split}
//!     H(x) &= -\sum_i x_i \ln x_i \\
//!     S(p, q) &= 1 - \frac{2 H(\frac{p + q}{2}) - H(p) - H(q)}{\ln 4}
//! \end{split}
//! ```
//!
//! Positions present in only one spectrum cancel out of the numerator, so the score is
//! computed over matched peaks only as
//!
//! ```math
//! S(p, q) = \frac{1}{2}\sum_{i} f(p_i + q_i) - f(p_i) - f(q_i) \quad\text{where } f(x) = x \log_2 x
//! ```
use std::f64::consts::LN_2;

use tracing::trace;

use crate::align::{AlignedPeakPair, PeakAligner};
use crate::clean::{CleaningParameters, SpectrumCleaner};
use crate::error::EntropyError;
use crate::peaks::{Peak, Spectrum};
use crate::tolerance::ToleranceWindow;

pub type ScoreType = f64;

/// $`\ln 4`$, the maximum Jensen-Shannon divergence of two distributions
pub const LN_4: f64 = 2.0 * LN_2;

#[inline]
fn xlnx(x: f64) -> f64 {
    if x > 0.0 {
        x * x.ln()
    } else {
        0.0
    }
}

#[inline]
fn xlog2x(x: f64) -> f64 {
    if x > 0.0 {
        x * x.log2()
    } else {
        0.0
    }
}

/// The Shannon entropy of a distribution, in nats. Zero terms contribute nothing.
pub fn shannon_entropy<I: IntoIterator<Item = f64>>(distribution: I) -> f64 {
    -distribution.into_iter().map(xlnx).sum::<f64>()
}

/// The spectral entropy of `spectrum`, the Shannon entropy of its intensities after
/// scaling them to sum to 1. A spectrum without signal has an entropy of 0.
pub fn spectral_entropy(spectrum: &Spectrum) -> f64 {
    match IntensityTransform::new(spectrum, 1.0) {
        Some(transform) => shannon_entropy(spectrum.iter().map(|p| transform.apply(p.intensity))),
        None => 0.0,
    }
}

/// The schedule that picks the exponent applied to a spectrum's intensities
/// before weighted entropy scoring.
///
/// Spectra whose entropy exceeds [`IntensityWeighting::entropy_threshold`] are left as-is,
/// while lower entropy spectra have their intensities raised to the power
///
/// ```math
/// w = w_{min} + s \frac{H}{H_{threshold}}
/// ```
///
/// which flattens spectra dominated by a handful of intense peaks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityWeighting {
    pub entropy_threshold: f64,
    /// The exponent used for a spectrum of zero entropy
    pub min_weight: f64,
    pub weight_slope: f64,
}

impl Default for IntensityWeighting {
    fn default() -> Self {
        Self {
            entropy_threshold: LN_4,
            min_weight: 0.25,
            weight_slope: 0.5,
        }
    }
}

impl IntensityWeighting {
    pub fn new(entropy_threshold: f64, min_weight: f64, weight_slope: f64) -> Self {
        Self {
            entropy_threshold,
            min_weight,
            weight_slope,
        }
    }

    /// The schedule of Li et al. (2021)[^1], $`w = 0.25 + 0.25 H`$ below an entropy of 3.
    ///
    /// [^1]: Li, Y., Kind, T., Folz, J. et al. Spectral entropy outperforms MS/MS dot product
    ///       similarity for small-molecule compound identification. Nat Methods 18, 1524–1531
    ///       (2021). <https://doi.org/10.1038/s41592-021-01331-z>
    pub fn published() -> Self {
        Self::new(3.0, 0.25, 0.75)
    }

    /// The intensity exponent for a spectrum with spectral entropy `entropy`
    #[inline]
    pub fn entropy_weight(&self, entropy: f64) -> f64 {
        if entropy > self.entropy_threshold {
            1.0
        } else {
            self.min_weight + self.weight_slope * entropy / self.entropy_threshold
        }
    }
}

/// Maps a spectrum's raw intensities onto its scoring distribution, which sums to 1.
///
/// Intensities are divided by the base peak intensity before being raised to
/// [`IntensityTransform::exponent`] and summed, so the total is at least 1 and at most
/// the number of peaks whatever the magnitude of the raw intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityTransform {
    pub exponent: f64,
    /// The base peak intensity
    pub scale: f64,
    /// The sum of the scaled, exponentiated intensities
    pub total: f64,
}

impl IntensityTransform {
    /// Build the transform for `spectrum`, or `None` if it has no signal
    pub fn new(spectrum: &Spectrum, exponent: f64) -> Option<Self> {
        let scale = spectrum.max_intensity();
        if !(scale > 0.0 && scale.is_finite()) {
            return None;
        }
        let mut transform = Self {
            exponent,
            scale,
            total: 1.0,
        };
        let total: f64 = spectrum.iter().map(|p| transform.apply(p.intensity)).sum();
        if total > 0.0 && total.is_finite() {
            transform.total = total;
            Some(transform)
        } else {
            None
        }
    }

    #[inline]
    pub fn apply(&self, intensity: f64) -> f64 {
        if intensity <= 0.0 {
            return 0.0;
        }
        let scaled = intensity / self.scale;
        if self.exponent == 1.0 {
            scaled / self.total
        } else {
            scaled.powf(self.exponent) / self.total
        }
    }
}

/// A strategy for scoring the similarity of two spectra by their spectral entropy.
pub trait EntropySimilarity {
    /// Compute the transform taking `spectrum` to its scoring distribution, or `None`
    /// when the spectrum carries no signal.
    fn intensity_transform(&self, spectrum: &Spectrum) -> Option<IntensityTransform>;

    /// Score two spectra already prepared for comparison.
    ///
    /// A spectrum without signal counts as empty. Two empty spectra are identical and
    /// score 1, while an empty spectrum scores 0 against any other.
    fn score(&self, a: &Spectrum, b: &Spectrum, aligner: &PeakAligner) -> ScoreType {
        match (self.intensity_transform(a), self.intensity_transform(b)) {
            (Some(ta), Some(tb)) => {
                let similarity: f64 = aligner
                    .matched_pairs(a, b)
                    .map(|pair| {
                        let p = ta.apply(pair.intensity_a);
                        let q = tb.apply(pair.intensity_b);
                        xlog2x(p + q) - xlog2x(p) - xlog2x(q)
                    })
                    .sum();
                // An empty sum is -0.0
                if similarity > 0.0 {
                    (similarity / 2.0).min(1.0)
                } else {
                    0.0
                }
            }
            (None, None) => {
                trace!("Both spectra are empty");
                1.0
            }
            _ => {
                trace!("One spectrum is empty");
                0.0
            }
        }
    }
}

/// Entropy similarity over the spectra's own intensity distributions
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnweightedEntropyScorer {}

impl EntropySimilarity for UnweightedEntropyScorer {
    #[inline]
    fn intensity_transform(&self, spectrum: &Spectrum) -> Option<IntensityTransform> {
        IntensityTransform::new(spectrum, 1.0)
    }
}

/// Entropy similarity after each spectrum's intensities are raised to the power chosen
/// by an [`IntensityWeighting`] from that spectrum's own entropy
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedEntropyScorer {
    pub weighting: IntensityWeighting,
}

impl WeightedEntropyScorer {
    pub fn new(weighting: IntensityWeighting) -> Self {
        Self { weighting }
    }
}

impl EntropySimilarity for WeightedEntropyScorer {
    fn intensity_transform(&self, spectrum: &Spectrum) -> Option<IntensityTransform> {
        let exponent = self.weighting.entropy_weight(spectral_entropy(spectrum));
        IntensityTransform::new(spectrum, exponent)
    }
}

/// Produce the entropy-weighted, sum-normalized copy of `spectrum` that
/// [`WeightedEntropyScorer`] scores. A spectrum without signal becomes empty.
pub fn apply_entropy_weight(spectrum: Spectrum, weighting: &IntensityWeighting) -> Spectrum {
    let Some(transform) = WeightedEntropyScorer::new(*weighting).intensity_transform(&spectrum) else {
        return Spectrum::empty();
    };
    let peaks: Vec<Peak> = spectrum
        .into_peaks()
        .into_iter()
        .map(|p| Peak::new(p.mz, transform.apply(p.intensity)))
        .collect();
    Spectrum::from_sorted_unchecked(peaks)
}

/// Evaluate the entropy similarity directly from the Jensen-Shannon form over a
/// complete alignment. Each side is scaled to sum to 1 first.
///
/// This is the reference form of the score; [`EntropySimilarity::score`] computes the
/// same value from matched peaks alone.
pub fn similarity_from_aligned(pairs: &[AlignedPeakPair]) -> ScoreType {
    let base_a = pairs.iter().map(|p| p.intensity_a).fold(0.0, f64::max);
    let base_b = pairs.iter().map(|p| p.intensity_b).fold(0.0, f64::max);
    match (base_a > 0.0, base_b > 0.0) {
        (true, true) => {}
        (false, false) => return 1.0,
        _ => return 0.0,
    }
    let total_a: f64 = pairs.iter().map(|p| p.intensity_a / base_a).sum();
    let total_b: f64 = pairs.iter().map(|p| p.intensity_b / base_b).sum();
    let p = |pair: &AlignedPeakPair| pair.intensity_a / base_a / total_a;
    let q = |pair: &AlignedPeakPair| pair.intensity_b / base_b / total_b;
    let h_a = shannon_entropy(pairs.iter().map(p));
    let h_b = shannon_entropy(pairs.iter().map(q));
    let h_m = shannon_entropy(pairs.iter().map(|pair| (p(pair) + q(pair)) / 2.0));
    (1.0 - (2.0 * h_m - h_a - h_b) / LN_4).clamp(0.0, 1.0)
}

fn score_with<S: EntropySimilarity>(
    scorer: &S,
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
    clean: Option<&CleaningParameters>,
) -> Result<ScoreType, EntropyError> {
    let aligner = PeakAligner::try_from(tolerance)?;
    let score = match clean {
        Some(params) => {
            params.validate()?;
            let cleaner = SpectrumCleaner::new(params.widened_for(aligner.tolerance()))?;
            let a = cleaner.clean(a.clone());
            let b = cleaner.clean(b.clone());
            scorer.score(&a, &b, &aligner)
        }
        None => scorer.score(a, b, &aligner),
    };
    Ok(score)
}

/// The entropy similarity of `a` and `b` after entropy-based intensity weighting,
/// using the default [`IntensityWeighting`].
///
/// If `clean` is given, both spectra are cleaned with it first, with the merge distance
/// widened to at least twice `tolerance`.
///
/// # Errors
/// An invalid tolerance or invalid cleaning parameters are rejected before scoring.
pub fn weighted_similarity(
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
    clean: Option<&CleaningParameters>,
) -> Result<ScoreType, EntropyError> {
    score_with(&WeightedEntropyScorer::default(), a, b, tolerance, clean)
}

/// The entropy similarity of `a` and `b` on their own intensity distributions.
///
/// See [`weighted_similarity`] for the treatment of `clean` and errors.
pub fn unweighted_similarity(
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
    clean: Option<&CleaningParameters>,
) -> Result<ScoreType, EntropyError> {
    score_with(&UnweightedEntropyScorer::default(), a, b, tolerance, clean)
}
