/*! Errors raised while validating spectra and parameters */
use thiserror::Error;

/// An error that might occur while constructing a [`Spectrum`](crate::peaks::Spectrum)
/// or a parameter set from untrusted input.
///
/// These are all argument errors. Numerically degenerate inputs (empty spectra,
/// zero total intensity) are never errors, they resolve to well-defined values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntropyError {
    #[error("m/z array has {mz} entries but intensity array has {intensity}")]
    MismatchedArrayLengths { mz: usize, intensity: usize },
    #[error("An interleaved peak buffer must have an even length, found {0}")]
    OddInterleavedLength(usize),
    #[error("Peak {index} has a non-finite m/z {value}")]
    NonFiniteMz { index: usize, value: f64 },
    #[error("Peak {index} has a negative m/z {value}")]
    NegativeMz { index: usize, value: f64 },
    #[error("Peak {index} has a non-finite intensity {value}")]
    NonFiniteIntensity { index: usize, value: f64 },
    #[error("Peak {index} has a negative intensity {value}")]
    NegativeIntensity { index: usize, value: f64 },
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
}

impl EntropyError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error was caused by a malformed peak rather than a malformed parameter
    pub fn is_peak_error(&self) -> bool {
        !matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::MismatchedArrayLengths { .. }
                | Self::OddInterleavedLength(_)
        )
    }
}
