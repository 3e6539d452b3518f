//! Mass tolerance windows used to decide whether two peaks occupy the same position.
use mzpeaks::Tolerance;

use crate::error::EntropyError;

/// The absolute tolerance used when neither an absolute nor a relative tolerance
/// was requested.
pub const DEFAULT_TOLERANCE_DA: f64 = 0.02;

/// The width in Daltons of `tolerance` at `mz`
#[inline]
pub fn tolerance_width(tolerance: Tolerance, mz: f64) -> f64 {
    match tolerance {
        Tolerance::PPM(ppm) => mz * ppm * 1e-6,
        Tolerance::Da(da) => da,
    }
}

/// Scale a tolerance by a constant factor, keeping its unit
#[inline]
pub(crate) fn scale_tolerance(tolerance: Tolerance, factor: f64) -> Tolerance {
    match tolerance {
        Tolerance::PPM(ppm) => Tolerance::PPM(ppm * factor),
        Tolerance::Da(da) => Tolerance::Da(da * factor),
    }
}

/// Reject a negative or non-finite tolerance
pub(crate) fn check_tolerance(name: &'static str, tolerance: Tolerance) -> Result<(), EntropyError> {
    let (Tolerance::PPM(v) | Tolerance::Da(v)) = tolerance;
    if !v.is_finite() || v < 0.0 {
        return Err(EntropyError::invalid_parameter(
            name,
            format!("must be a finite non-negative value, got {v}"),
        ));
    }
    Ok(())
}

/// A peak matching tolerance with independent absolute and relative terms.
///
/// When both terms are set, the relative (ppm) term governs. When neither is
/// set, [`DEFAULT_TOLERANCE_DA`] is used.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToleranceWindow {
    /// Tolerance in Daltons
    pub absolute: Option<f64>,
    /// Tolerance in parts-per-million of the measured m/z
    pub relative: Option<f64>,
}

impl ToleranceWindow {
    pub fn new(absolute: Option<f64>, relative: Option<f64>) -> Self {
        Self { absolute, relative }
    }

    pub fn da(tolerance: f64) -> Self {
        Self::new(Some(tolerance), None)
    }

    pub fn ppm(tolerance: f64) -> Self {
        Self::new(None, Some(tolerance))
    }

    /// Reject negative or non-finite terms
    pub fn validate(&self) -> Result<(), EntropyError> {
        if let Some(da) = self.absolute {
            check_tolerance("absolute tolerance", Tolerance::Da(da))?;
        }
        if let Some(ppm) = self.relative {
            check_tolerance("relative tolerance", Tolerance::PPM(ppm))?;
        }
        Ok(())
    }

    /// Collapse the window into the single [`Tolerance`] that governs matching
    pub fn resolve(&self) -> Tolerance {
        match (self.absolute, self.relative) {
            (_, Some(ppm)) => Tolerance::PPM(ppm),
            (Some(da), None) => Tolerance::Da(da),
            (None, None) => Tolerance::Da(DEFAULT_TOLERANCE_DA),
        }
    }
}

impl From<Tolerance> for ToleranceWindow {
    fn from(value: Tolerance) -> Self {
        match value {
            Tolerance::PPM(ppm) => Self::ppm(ppm),
            Tolerance::Da(da) => Self::da(da),
        }
    }
}

impl From<ToleranceWindow> for Tolerance {
    fn from(value: ToleranceWindow) -> Self {
        value.resolve()
    }
}
