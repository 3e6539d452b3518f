//! Spectral entropy similarity for tandem mass spectra.
//!
//! Spectra are cleaned with [`SpectrumCleaner`], aligned with [`PeakAligner`] and
//! scored by an [`EntropySimilarity`] implementation, either the
//! [`UnweightedEntropyScorer`] or the [`WeightedEntropyScorer`]. The
//! [`SimilarityEngine`] bundles these steps for scoring one query against many
//! references, and [`boundary`] exposes the same operations over flat buffers.
//!
//! ```
//! use msentropy::{Spectrum, ToleranceWindow, weighted_similarity};
//!
//! let a = Spectrum::try_from(vec![(69.071, 7.917962), (86.066, 1.021589), (86.0969, 100.0)]).unwrap();
//! let b = Spectrum::try_from(vec![(41.04, 37.16), (69.07, 66.83), (86.1, 999.0)]).unwrap();
//! let score = weighted_similarity(&a, &b, ToleranceWindow::da(0.02), None).unwrap();
//! assert!((0.0..=1.0).contains(&score));
//! ```
pub mod error;
pub mod peaks;
pub mod tolerance;

pub mod align;
pub mod clean;
pub mod scorer;

pub mod api;
pub mod boundary;

pub use crate::align::{AlignedPeakPair, PeakAligner};
pub use crate::api::SimilarityEngine;
pub use crate::clean::{CleaningParameters, Normalization, SpectrumCleaner};
pub use crate::error::EntropyError;
pub use crate::peaks::{Peak, Spectrum};
pub use crate::scorer::{
    spectral_entropy, unweighted_similarity, weighted_similarity, EntropySimilarity,
    IntensityWeighting, ScoreType, UnweightedEntropyScorer, WeightedEntropyScorer,
};
pub use crate::tolerance::ToleranceWindow;

pub use mzpeaks::Tolerance;
