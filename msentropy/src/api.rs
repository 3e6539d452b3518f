//! High level APIs for scoring many spectra with a fixed set of parameters
use std::borrow::Cow;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use tracing::debug;

use crate::align::PeakAligner;
use crate::clean::{CleaningParameters, SpectrumCleaner};
use crate::error::EntropyError;
use crate::peaks::Spectrum;
use crate::scorer::{
    EntropySimilarity, ScoreType, UnweightedEntropyScorer, WeightedEntropyScorer,
};
use crate::tolerance::ToleranceWindow;

/// A reusable scoring configuration: a similarity strategy, a matching tolerance and
/// optional cleaning for the query and reference spectra.
///
/// Prefer an instance of this type to repeatedly calling [`weighted_entropy_similarity`]
/// when scoring one query against a library, since the query is cleaned only once.
///
/// When cleaning is enabled, the merge distance of the cleaning parameters is widened
/// to at least twice the matching tolerance so that no peak can match two peaks of the
/// other spectrum.
#[derive(Debug, Clone)]
pub struct SimilarityEngine<S: EntropySimilarity> {
    scorer: S,
    aligner: PeakAligner,
    query_cleaner: Option<SpectrumCleaner>,
    reference_cleaner: Option<SpectrumCleaner>,
}

impl<S: EntropySimilarity + Sync> SimilarityEngine<S> {
    /// Create an engine which scores spectra as given, without cleaning.
    ///
    /// # Errors
    /// A negative or non-finite tolerance is rejected.
    pub fn new(scorer: S, tolerance: ToleranceWindow) -> Result<Self, EntropyError> {
        Ok(Self {
            scorer,
            aligner: PeakAligner::try_from(tolerance)?,
            query_cleaner: None,
            reference_cleaner: None,
        })
    }

    fn make_cleaner(
        &self,
        params: Option<CleaningParameters>,
    ) -> Result<Option<SpectrumCleaner>, EntropyError> {
        params
            .map(|p| {
                p.validate()?;
                SpectrumCleaner::new(p.widened_for(self.aligner.tolerance()))
            })
            .transpose()
    }

    /// Clean both query and reference spectra with `params`
    pub fn with_cleaning(self, params: CleaningParameters) -> Result<Self, EntropyError> {
        self.with_query_cleaning(Some(params))?
            .with_reference_cleaning(Some(params))
    }

    pub fn with_query_cleaning(
        mut self,
        params: Option<CleaningParameters>,
    ) -> Result<Self, EntropyError> {
        self.query_cleaner = self.make_cleaner(params)?;
        Ok(self)
    }

    pub fn with_reference_cleaning(
        mut self,
        params: Option<CleaningParameters>,
    ) -> Result<Self, EntropyError> {
        self.reference_cleaner = self.make_cleaner(params)?;
        Ok(self)
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn aligner(&self) -> &PeakAligner {
        &self.aligner
    }

    fn prepare<'a>(cleaner: &Option<SpectrumCleaner>, spectrum: &'a Spectrum) -> Cow<'a, Spectrum> {
        match cleaner {
            Some(cleaner) => Cow::Owned(cleaner.clean(spectrum.clone())),
            None => Cow::Borrowed(spectrum),
        }
    }

    /// Apply the query cleaning step, if any
    pub fn prepare_query<'a>(&self, spectrum: &'a Spectrum) -> Cow<'a, Spectrum> {
        Self::prepare(&self.query_cleaner, spectrum)
    }

    /// Apply the reference cleaning step, if any
    pub fn prepare_reference<'a>(&self, spectrum: &'a Spectrum) -> Cow<'a, Spectrum> {
        Self::prepare(&self.reference_cleaner, spectrum)
    }

    /// Score `query` against `reference` after cleaning each as configured
    pub fn score(&self, query: &Spectrum, reference: &Spectrum) -> ScoreType {
        let query = self.prepare_query(query);
        let reference = self.prepare_reference(reference);
        self.scorer.score(&query, &reference, &self.aligner)
    }

    fn score_prepared_query(&self, query: &Spectrum, reference: &Spectrum) -> ScoreType {
        let reference = self.prepare_reference(reference);
        self.scorer.score(query, &reference, &self.aligner)
    }

    /// Score `query` against each of `references`, in order.
    ///
    /// With the `parallelism` feature enabled the references are scored in parallel.
    #[tracing::instrument(level = "debug", skip_all, fields(n_references = references.len()))]
    pub fn score_many(&self, query: &Spectrum, references: &[Spectrum]) -> Vec<ScoreType> {
        let query = self.prepare_query(query);
        if query.is_empty() {
            debug!("Query spectrum is empty after preparation");
        }
        #[cfg(feature = "parallelism")]
        let scores: Vec<ScoreType> = references
            .par_iter()
            .map(|r| self.score_prepared_query(&query, r))
            .collect();
        #[cfg(not(feature = "parallelism"))]
        let scores: Vec<ScoreType> = references
            .iter()
            .map(|r| self.score_prepared_query(&query, r))
            .collect();
        scores
    }

    /// Score every pair of `spectra`, returning the condensed upper triangle of the
    /// similarity matrix in row-major order: `(0, 1), (0, 2), ..., (1, 2), ...`.
    ///
    /// All spectra are prepared with the reference cleaning step.
    #[tracing::instrument(level = "debug", skip_all, fields(n_spectra = spectra.len()))]
    pub fn pairwise(&self, spectra: &[Spectrum]) -> Vec<ScoreType> {
        let prepared: Vec<Cow<'_, Spectrum>> =
            spectra.iter().map(|s| self.prepare_reference(s)).collect();
        let n = prepared.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        #[cfg(feature = "parallelism")]
        let iter = pairs.par_iter();
        #[cfg(not(feature = "parallelism"))]
        let iter = pairs.iter();
        iter.map(|(i, j)| {
            self.scorer
                .score(&prepared[*i], &prepared[*j], &self.aligner)
        })
        .collect()
    }
}

/// Index of the `(i, j)` pair, `i < j`, in the output of [`SimilarityEngine::pairwise`]
/// for `n` spectra.
pub fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    n * i - i * (i + 1) / 2 + (j - i - 1)
}

/// A single-shot weighted entropy similarity calculation with independent cleaning
/// for each side.
///
/// # See also
/// [`SimilarityEngine::score`]
pub fn weighted_entropy_similarity(
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
    clean_a: Option<&CleaningParameters>,
    clean_b: Option<&CleaningParameters>,
) -> Result<ScoreType, EntropyError> {
    let engine = SimilarityEngine::new(WeightedEntropyScorer::default(), tolerance)?
        .with_query_cleaning(clean_a.copied())?
        .with_reference_cleaning(clean_b.copied())?;
    Ok(engine.score(a, b))
}

/// A single-shot unweighted entropy similarity calculation with independent cleaning
/// for each side.
///
/// # See also
/// [`SimilarityEngine::score`]
pub fn unweighted_entropy_similarity(
    a: &Spectrum,
    b: &Spectrum,
    tolerance: ToleranceWindow,
    clean_a: Option<&CleaningParameters>,
    clean_b: Option<&CleaningParameters>,
) -> Result<ScoreType, EntropyError> {
    let engine = SimilarityEngine::new(UnweightedEntropyScorer::default(), tolerance)?
        .with_query_cleaning(clean_a.copied())?
        .with_reference_cleaning(clean_b.copied())?;
    Ok(engine.score(a, b))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scorer::{unweighted_similarity, weighted_similarity};

    fn spectrum(peaks: &[(f64, f64)]) -> Spectrum {
        Spectrum::try_from(peaks.to_vec()).unwrap()
    }

    fn library() -> Vec<Spectrum> {
        vec![
            spectrum(&[(69.071, 7.917962), (86.066, 1.021589), (86.0969, 100.0)]),
            spectrum(&[(41.04, 37.16), (69.07, 66.83), (86.1, 999.0)]),
            spectrum(&[(41.04, 1.0), (55.05, 3.0), (69.07, 10.0)]),
            Spectrum::empty(),
        ]
    }

    #[test_log::test]
    fn test_score_many_matches_single_shot() {
        let tol = ToleranceWindow::da(0.02);
        let params = CleaningParameters::default();
        let engine = SimilarityEngine::new(WeightedEntropyScorer::default(), tol)
            .unwrap()
            .with_cleaning(params)
            .unwrap();
        let lib = library();
        let scores = engine.score_many(&lib[0], &lib);
        assert_eq!(scores.len(), lib.len());
        for (score, reference) in scores.iter().zip(lib.iter()) {
            assert_eq!(*score, weighted_similarity(&lib[0], reference, tol, Some(&params)).unwrap());
        }
        assert!((scores[0] - 1.0).abs() < 1e-9);
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn test_pairwise() {
        let tol = ToleranceWindow::da(0.02);
        let engine = SimilarityEngine::new(UnweightedEntropyScorer::default(), tol).unwrap();
        let lib = library();
        let matrix = engine.pairwise(&lib);
        let n = lib.len();
        assert_eq!(matrix.len(), n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let expected = unweighted_similarity(&lib[i], &lib[j], tol, None).unwrap();
                assert_eq!(matrix[condensed_index(n, i, j)], expected);
            }
        }
    }

    #[test]
    fn test_one_sided_cleaning() {
        let tol = ToleranceWindow::da(0.02);
        let lib = library();
        let params = CleaningParameters::default().with_max_peak_count(Some(1));
        let one_sided =
            unweighted_entropy_similarity(&lib[0], &lib[1], tol, Some(&params), None).unwrap();
        let both = unweighted_entropy_similarity(&lib[0], &lib[1], tol, Some(&params), Some(&params))
            .unwrap();
        let none = unweighted_entropy_similarity(&lib[0], &lib[1], tol, None, None).unwrap();
        assert_eq!(none, unweighted_similarity(&lib[0], &lib[1], tol, None).unwrap());
        assert!(one_sided != none);
        assert!(both != one_sided);
    }

    #[test]
    fn test_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Spectrum>();
        assert_send_sync::<CleaningParameters>();
        assert_send_sync::<SimilarityEngine<WeightedEntropyScorer>>();
        assert_send_sync::<SimilarityEngine<UnweightedEntropyScorer>>();
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let err = SimilarityEngine::new(WeightedEntropyScorer::default(), ToleranceWindow::da(-0.1))
            .unwrap_err();
        assert!(matches!(err, EntropyError::InvalidParameter { .. }));

        let params = CleaningParameters::default().with_mz_range(Some(f64::NAN), None);
        let lib = library();
        let err = weighted_entropy_similarity(
            &lib[0],
            &lib[1],
            ToleranceWindow::default(),
            Some(&params),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EntropyError::InvalidParameter { name: "min_mz", .. }));
    }
}
