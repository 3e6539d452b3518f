//! Peak and spectrum containers shared by the cleaning, alignment and scoring stages.

use std::cmp::Ordering;
use std::ops::Index;
use std::slice;

use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, IntensityMeasurement, MZ};

use crate::error::EntropyError;

/// A single (m/z, intensity) observation.
///
/// Unlike [`CentroidPeak`], the intensity is stored in double precision because the
/// entropy terms are sensitive to rounding in small intensities.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

impl Peak {
    #[inline]
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }

    /// Copy any `mzpeaks` centroid into a [`Peak`]
    pub fn from_centroid<C: CentroidLike>(peak: &C) -> Self {
        Self::new(peak.mz(), peak.intensity() as f64)
    }

    /// Absorb `other` into this peak. The intensities are summed, saturating at
    /// [`f64::MAX`], and the m/z becomes the intensity-weighted average of the two.
    #[inline]
    pub fn merge(&mut self, other: &Peak) {
        let half_total = self.intensity / 2.0 + other.intensity / 2.0;
        if half_total > 0.0 {
            let weight = (other.intensity / 2.0) / half_total;
            self.mz += (other.mz - self.mz) * weight;
        } else {
            self.mz = (self.mz + other.mz) / 2.0;
        }
        self.intensity = (self.intensity + other.intensity).min(f64::MAX);
    }

    /// An "empty" peak carries no signal and is always dropped by cleaning
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mz <= 0.0 || self.intensity <= 0.0
    }

    #[inline]
    pub fn cmp_mz(&self, other: &Peak) -> Ordering {
        self.mz.total_cmp(&other.mz)
    }

    /// Order by descending intensity, breaking ties by ascending m/z
    #[inline]
    pub fn cmp_intensity_desc(&self, other: &Peak) -> Ordering {
        other
            .intensity
            .total_cmp(&self.intensity)
            .then_with(|| self.cmp_mz(other))
    }

    pub(crate) fn check_finite(&self, index: usize) -> Result<(), EntropyError> {
        if !self.mz.is_finite() {
            return Err(EntropyError::NonFiniteMz {
                index,
                value: self.mz,
            });
        }
        if !self.intensity.is_finite() {
            return Err(EntropyError::NonFiniteIntensity {
                index,
                value: self.intensity,
            });
        }
        Ok(())
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), EntropyError> {
        self.check_finite(index)?;
        if self.mz < 0.0 {
            return Err(EntropyError::NegativeMz {
                index,
                value: self.mz,
            });
        }
        if self.intensity < 0.0 {
            return Err(EntropyError::NegativeIntensity {
                index,
                value: self.intensity,
            });
        }
        Ok(())
    }
}

impl CoordinateLike<MZ> for Peak {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for Peak {
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

impl From<CentroidPeak> for Peak {
    fn from(value: CentroidPeak) -> Self {
        Self::new(value.mz, value.intensity as f64)
    }
}

impl From<(f64, f64)> for Peak {
    fn from((mz, intensity): (f64, f64)) -> Self {
        Self::new(mz, intensity)
    }
}

impl From<[f64; 2]> for Peak {
    fn from([mz, intensity]: [f64; 2]) -> Self {
        Self::new(mz, intensity)
    }
}

/// Sort peaks by ascending m/z in place
pub fn sort_by_mz(peaks: &mut [Peak]) {
    peaks.sort_by(Peak::cmp_mz);
}

/// A validated peak list ordered by ascending m/z.
///
/// Every peak has a finite, non-negative m/z and intensity. The only ways to obtain
/// a [`Spectrum`] from untrusted values are the validating constructors or the
/// cleaning pipeline in [`crate::clean`].
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Spectrum {
    peaks: Vec<Peak>,
}

impl Spectrum {
    /// Validate and sort `peaks`.
    ///
    /// # Errors
    /// Any non-finite value, negative m/z or negative intensity is rejected.
    pub fn new(mut peaks: Vec<Peak>) -> Result<Self, EntropyError> {
        for (i, p) in peaks.iter().enumerate() {
            p.validate(i)?;
        }
        sort_by_mz(&mut peaks);
        Ok(Self { peaks })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a spectrum from parallel m/z and intensity arrays
    pub fn from_arrays(mzs: &[f64], intensities: &[f64]) -> Result<Self, EntropyError> {
        if mzs.len() != intensities.len() {
            return Err(EntropyError::MismatchedArrayLengths {
                mz: mzs.len(),
                intensity: intensities.len(),
            });
        }
        Self::new(
            mzs.iter()
                .zip(intensities.iter())
                .map(|(mz, int)| Peak::new(*mz, *int))
                .collect(),
        )
    }

    /// Build a spectrum from an `[mz, intensity, mz, intensity, ...]` buffer
    pub fn from_interleaved(buffer: &[f64]) -> Result<Self, EntropyError> {
        Self::new(peaks_from_interleaved(buffer)?)
    }

    /// Copy any `mzpeaks` centroid collection
    pub fn from_centroids<C: CentroidLike>(peaks: &[C]) -> Result<Self, EntropyError> {
        Self::new(peaks.iter().map(Peak::from_centroid).collect())
    }

    /// Wrap a peak list the caller has already validated and sorted
    pub(crate) fn from_sorted_unchecked(peaks: Vec<Peak>) -> Self {
        debug_assert!(peaks.windows(2).all(|w| w[0].mz <= w[1].mz));
        Self { peaks }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn into_peaks(self) -> Vec<Peak> {
        self.peaks
    }

    /// The total ion current, the sum of all intensities
    pub fn tic(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    pub fn max_intensity(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity).fold(0.0, f64::max)
    }

    pub fn mzs(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.mz).collect()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.intensity).collect()
    }

    pub fn to_interleaved(&self) -> Vec<f64> {
        self.peaks.iter().flat_map(|p| [p.mz, p.intensity]).collect()
    }

    /// Convert into `mzpeaks` centroids, indexed by position
    pub fn to_centroids(&self) -> Vec<CentroidPeak> {
        self.peaks
            .iter()
            .enumerate()
            .map(|(i, p)| CentroidPeak::new(p.mz, p.intensity as f32, i as u32))
            .collect()
    }
}

impl Index<usize> for Spectrum {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl AsRef<[Peak]> for Spectrum {
    fn as_ref(&self) -> &[Peak] {
        &self.peaks
    }
}

impl<'a> IntoIterator for &'a Spectrum {
    type Item = &'a Peak;
    type IntoIter = slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl TryFrom<Vec<Peak>> for Spectrum {
    type Error = EntropyError;

    fn try_from(value: Vec<Peak>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Vec<(f64, f64)>> for Spectrum {
    type Error = EntropyError;

    fn try_from(value: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(value.into_iter().map(Peak::from).collect())
    }
}

/// Split an interleaved buffer into peaks without validating the values
pub fn peaks_from_interleaved(buffer: &[f64]) -> Result<Vec<Peak>, EntropyError> {
    if buffer.len() % 2 != 0 {
        return Err(EntropyError::OddInterleavedLength(buffer.len()));
    }
    Ok(buffer
        .chunks_exact(2)
        .map(|pair| Peak::new(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_weighted_mz() {
        let mut a = Peak::new(100.0, 3.0);
        a.merge(&Peak::new(100.04, 1.0));
        assert!((a.mz - 100.01).abs() < 1e-9);
        assert_eq!(a.intensity, 4.0);

        let mut big = Peak::new(100.0, f64::MAX);
        big.merge(&Peak::new(100.02, f64::MAX));
        assert!((big.mz - 100.01).abs() < 1e-9);
        assert_eq!(big.intensity, f64::MAX);
    }

    #[test]
    fn test_new_sorts_and_validates() {
        let spec = Spectrum::new(vec![Peak::new(200.0, 1.0), Peak::new(100.0, 2.0)]).unwrap();
        assert_eq!(spec.mzs(), vec![100.0, 200.0]);

        let err = Spectrum::new(vec![Peak::new(100.0, 1.0), Peak::new(150.0, -1.0)]).unwrap_err();
        assert_eq!(
            err,
            EntropyError::NegativeIntensity {
                index: 1,
                value: -1.0
            }
        );

        let err = Spectrum::new(vec![Peak::new(f64::NAN, 1.0)]).unwrap_err();
        assert!(matches!(err, EntropyError::NonFiniteMz { index: 0, .. }));
        assert!(err.is_peak_error());
    }

    #[test]
    fn test_buffers() {
        let err = Spectrum::from_arrays(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            EntropyError::MismatchedArrayLengths {
                mz: 2,
                intensity: 1
            }
        );
        assert!(!err.is_peak_error());

        let err = Spectrum::from_interleaved(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, EntropyError::OddInterleavedLength(3));

        let spec = Spectrum::from_interleaved(&[150.0, 2.0, 50.0, 1.0]).unwrap();
        assert_eq!(spec.to_interleaved(), vec![50.0, 1.0, 150.0, 2.0]);
        assert_eq!(spec.tic(), 3.0);
        assert_eq!(spec.max_intensity(), 2.0);
    }

    #[test]
    fn test_centroid_interop() {
        let centroids = vec![
            CentroidPeak::new(739.920, 8356.829, 0),
            CentroidPeak::new(740.255, 8006.456, 1),
        ];
        let spec = Spectrum::from_centroids(&centroids).unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0].mz(), 739.920);
        let back = spec.to_centroids();
        assert_eq!(back[1].index, 1);
        assert!((back[1].intensity - 8006.456).abs() < 1e-2);
    }

    #[test]
    fn test_intensity_order_breaks_ties_by_mz() {
        let mut peaks = vec![
            Peak::new(300.0, 5.0),
            Peak::new(100.0, 5.0),
            Peak::new(200.0, 9.0),
        ];
        peaks.sort_by(Peak::cmp_intensity_desc);
        let mzs: Vec<_> = peaks.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![200.0, 100.0, 300.0]);
    }
}
