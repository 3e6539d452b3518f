//! Align two spectra onto a shared peak axis
use mzpeaks::Tolerance;

use crate::error::EntropyError;
use crate::peaks::{Peak, Spectrum};
use crate::tolerance::{check_tolerance, tolerance_width, ToleranceWindow};

/// One position on the shared axis of two aligned spectra. An intensity of zero
/// means the corresponding spectrum had no peak at this position.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AlignedPeakPair {
    /// The lower m/z of the peaks contributing to this position
    pub mz: f64,
    pub intensity_a: f64,
    pub intensity_b: f64,
}

impl AlignedPeakPair {
    #[inline]
    pub fn new(mz: f64, intensity_a: f64, intensity_b: f64) -> Self {
        Self {
            mz,
            intensity_a,
            intensity_b,
        }
    }

    /// Whether both spectra contributed to this position
    #[inline]
    pub fn is_matched(&self) -> bool {
        self.intensity_a > 0.0 && self.intensity_b > 0.0
    }

    /// The same pair with the roles of the two spectra exchanged
    #[inline]
    pub fn swapped(&self) -> Self {
        Self::new(self.mz, self.intensity_b, self.intensity_a)
    }
}

/// Greedy, single pass alignment of two m/z-sorted spectra.
///
/// The leading peaks of both spectra are compared at each step. If they are within
/// tolerance they are paired and both are consumed, otherwise the lower m/z peak is
/// emitted on its own. A relative tolerance is evaluated at the mean of the two
/// masses, so `align(a, b)` is the mirror image of `align(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakAligner {
    tolerance: Tolerance,
}

impl Default for PeakAligner {
    fn default() -> Self {
        Self {
            tolerance: ToleranceWindow::default().resolve(),
        }
    }
}

impl TryFrom<ToleranceWindow> for PeakAligner {
    type Error = EntropyError;

    fn try_from(value: ToleranceWindow) -> Result<Self, Self::Error> {
        value.validate()?;
        Self::new(value.resolve())
    }
}

impl PeakAligner {
    /// # Errors
    /// A negative or non-finite tolerance is rejected.
    pub fn new(tolerance: Tolerance) -> Result<Self, EntropyError> {
        check_tolerance("tolerance", tolerance)?;
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    #[inline]
    fn is_match(&self, mz_a: f64, mz_b: f64) -> bool {
        let width = tolerance_width(self.tolerance, (mz_a + mz_b) / 2.0);
        (mz_a - mz_b).abs() <= width
    }

    /// Build the shared axis of `a` and `b`. Every peak of either spectrum
    /// contributes to exactly one [`AlignedPeakPair`], and the pairs are ordered by
    /// ascending m/z.
    pub fn align(&self, a: &Spectrum, b: &Spectrum) -> Vec<AlignedPeakPair> {
        let a = a.peaks();
        let b = b.peaks();
        let mut pairs = Vec::with_capacity(a.len() + b.len());
        let mut i = 0;
        let mut j = 0;
        while i < a.len() && j < b.len() {
            let pa = &a[i];
            let pb = &b[j];
            if self.is_match(pa.mz, pb.mz) {
                pairs.push(AlignedPeakPair::new(
                    pa.mz.min(pb.mz),
                    pa.intensity,
                    pb.intensity,
                ));
                i += 1;
                j += 1;
            } else if pa.mz < pb.mz {
                pairs.push(AlignedPeakPair::new(pa.mz, pa.intensity, 0.0));
                i += 1;
            } else {
                pairs.push(AlignedPeakPair::new(pb.mz, 0.0, pb.intensity));
                j += 1;
            }
        }
        pairs.extend(
            a[i..]
                .iter()
                .map(|p| AlignedPeakPair::new(p.mz, p.intensity, 0.0)),
        );
        pairs.extend(
            b[j..]
                .iter()
                .map(|p| AlignedPeakPair::new(p.mz, 0.0, p.intensity)),
        );
        pairs
    }

    /// Iterate over only the positions where both spectra have a peak. This is all
    /// the entropy similarity needs, and avoids materializing the full axis.
    pub fn matched_pairs<'a>(
        &'a self,
        a: &'a Spectrum,
        b: &'a Spectrum,
    ) -> impl Iterator<Item = AlignedPeakPair> + 'a {
        MatchedPairs {
            aligner: self,
            a: a.peaks(),
            b: b.peaks(),
            i: 0,
            j: 0,
        }
    }
}

struct MatchedPairs<'a> {
    aligner: &'a PeakAligner,
    a: &'a [Peak],
    b: &'a [Peak],
    i: usize,
    j: usize,
}

impl Iterator for MatchedPairs<'_> {
    type Item = AlignedPeakPair;

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.a.len() && self.j < self.b.len() {
            let pa = &self.a[self.i];
            let pb = &self.b[self.j];
            if self.aligner.is_match(pa.mz, pb.mz) {
                self.i += 1;
                self.j += 1;
                return Some(AlignedPeakPair::new(
                    pa.mz.min(pb.mz),
                    pa.intensity,
                    pb.intensity,
                ));
            } else if pa.mz < pb.mz {
                self.i += 1;
            } else {
                self.j += 1;
            }
        }
        None
    }
}

/// Align `a` and `b` once with `tolerance`.
///
/// See [`PeakAligner::align`].
pub fn align(
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
) -> Result<Vec<AlignedPeakPair>, EntropyError> {
    Ok(PeakAligner::try_from(tolerance)?.align(a, b))
}
