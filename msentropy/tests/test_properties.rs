use rand::{rngs::StdRng, Rng, SeedableRng};

use msentropy::boundary::{self, SentinelCleaning, UNSET};
use msentropy::clean::clean_spectrum;
use msentropy::{
    unweighted_similarity, weighted_similarity, CleaningParameters, Normalization, Peak,
    SimilarityEngine, Spectrum, Tolerance, ToleranceWindow, UnweightedEntropyScorer,
    WeightedEntropyScorer,
};

/// A reproducible spectrum of `n` random peaks
fn synthetic(seed: u64, n: usize) -> Spectrum {
    let mut rng = StdRng::seed_from_u64(seed);
    let peaks: Vec<Peak> = (0..n)
        .map(|_| Peak::new(rng.gen_range(50.0..500.0), rng.gen_range(1.0..1000.0)))
        .collect();
    Spectrum::new(peaks).unwrap()
}

/// A copy of `spectrum` with every m/z shifted by `delta` and intensities perturbed
fn perturbed(spectrum: &Spectrum, delta: f64, seed: u64) -> Spectrum {
    let mut rng = StdRng::seed_from_u64(seed);
    let peaks: Vec<Peak> = spectrum
        .iter()
        .map(|p| Peak::new(p.mz + delta, p.intensity * rng.gen_range(0.5..1.5)))
        .collect();
    Spectrum::new(peaks).unwrap()
}

fn family() -> Vec<Spectrum> {
    let mut spectra: Vec<Spectrum> = (1..=6).map(|seed| synthetic(seed, 10 * seed as usize)).collect();
    let shifted = perturbed(&spectra[2], 0.005, 99);
    spectra.push(shifted);
    spectra.push(Spectrum::try_from(vec![(100.0, 1.0)]).unwrap());
    spectra
}

fn tolerances() -> [ToleranceWindow; 3] {
    [
        ToleranceWindow::da(0.02),
        ToleranceWindow::ppm(20.0),
        ToleranceWindow::new(Some(0.5), Some(10.0)),
    ]
}

fn assert_close(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "{a} != {b}");
}

#[test_log::test]
fn test_cleaning_is_idempotent() {
    let params = [
        CleaningParameters::default(),
        CleaningParameters::default().with_max_peak_count(Some(8)),
        CleaningParameters::default()
            .with_min_peak_distance(Some(Tolerance::PPM(500.0)))
            .with_normalize(Normalization::Max),
        CleaningParameters::passthrough().with_mz_range(Some(100.0), Some(400.0)),
    ];
    for spectrum in family() {
        for p in params.iter() {
            let once = clean_spectrum(spectrum.clone(), p).unwrap();
            let twice = clean_spectrum(once.clone(), p).unwrap();
            assert_eq!(once.len(), twice.len(), "{p:?}");
            for (a, b) in once.iter().zip(twice.iter()) {
                assert_close(a.mz, b.mz, 1e-9);
                assert_close(a.intensity, b.intensity, 1e-9);
            }
        }
    }
}

#[test_log::test]
fn test_cleaned_output_shape() {
    let params = CleaningParameters::default().with_max_peak_count(Some(5));
    for spectrum in family() {
        let cleaned = clean_spectrum(spectrum, &params).unwrap();
        assert!(!cleaned.is_empty());
        assert!(cleaned.len() <= 5);
        assert!(cleaned.peaks().windows(2).all(|w| w[1].mz - w[0].mz > 0.05));
        assert!(cleaned.iter().all(|p| p.intensity > 0.0));
        assert_close(cleaned.tic(), 1.0, 1e-9);
    }
}

#[test_log::test]
fn test_self_similarity() {
    for spectrum in family() {
        for tol in tolerances() {
            assert_close(weighted_similarity(&spectrum, &spectrum, tol, None).unwrap(), 1.0, 1e-9);
            assert_close(unweighted_similarity(&spectrum, &spectrum, tol, None).unwrap(), 1.0, 1e-9);
            let clean = CleaningParameters::default();
            assert_close(
                weighted_similarity(&spectrum, &spectrum, tol, Some(&clean)).unwrap(),
                1.0,
                1e-9,
            );
        }
    }
}

#[test_log::test]
fn test_symmetry_and_bounds() {
    let spectra = family();
    for a in spectra.iter() {
        for b in spectra.iter() {
            for tol in tolerances() {
                let ab = weighted_similarity(a, b, tol, None).unwrap();
                let ba = weighted_similarity(b, a, tol, None).unwrap();
                assert_close(ab, ba, 1e-12);
                assert!((0.0..=1.0).contains(&ab));

                let ab = unweighted_similarity(a, b, tol, None).unwrap();
                let ba = unweighted_similarity(b, a, tol, None).unwrap();
                assert_close(ab, ba, 1e-12);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }
}

#[test_log::test]
fn test_near_duplicates_score_high() {
    let spectra = family();
    let shifted = &spectra[6];
    let score = unweighted_similarity(&spectra[2], shifted, ToleranceWindow::da(0.02), None).unwrap();
    assert!(score > 0.8, "{score}");
    let score = unweighted_similarity(&spectra[2], shifted, ToleranceWindow::da(0.001), None).unwrap();
    assert_eq!(score, 0.0);
}

#[test_log::test]
fn test_weighting_differs_for_skewed_spectra() {
    let a = Spectrum::try_from(vec![(69.071, 7.917962), (86.066, 1.021589), (86.0969, 100.0)])
        .unwrap();
    let b = Spectrum::try_from(vec![(41.04, 37.16), (69.07, 66.83), (86.1, 999.0)]).unwrap();
    let tol = ToleranceWindow::da(0.02);
    let weighted = weighted_similarity(&a, &b, tol, None).unwrap();
    let unweighted = unweighted_similarity(&a, &b, tol, None).unwrap();
    assert!((0.0..=1.0).contains(&weighted));
    assert!((weighted - unweighted).abs() > 1e-3);
}

#[test_log::test]
fn test_engine_agrees_with_free_functions() {
    let spectra = family();
    let tol = ToleranceWindow::ppm(20.0);
    let params = CleaningParameters::default();
    let engine = SimilarityEngine::new(UnweightedEntropyScorer::default(), tol)
        .unwrap()
        .with_cleaning(params)
        .unwrap();
    let scores = engine.score_many(&spectra[0], &spectra);
    for (score, reference) in scores.iter().zip(spectra.iter()) {
        assert_close(
            *score,
            unweighted_similarity(&spectra[0], reference, tol, Some(&params)).unwrap(),
            1e-12,
        );
    }

    let engine = SimilarityEngine::new(WeightedEntropyScorer::default(), tol).unwrap();
    let matrix = engine.pairwise(&spectra);
    let n = spectra.len();
    assert_eq!(matrix.len(), n * (n - 1) / 2);
    let mut k = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            assert_close(matrix[k], weighted_similarity(&spectra[i], &spectra[j], tol, None).unwrap(), 1e-12);
            k += 1;
        }
    }
}

#[test_log::test]
fn test_boundary_cleaning_example() {
    let mut buffer = vec![
        41.04, 0.3716, 0.0, 0.3716, 69.07, 7.917962, 69.07, -7.917962, 69.071, 100.0, 86.0969,
        66.83, 86.01, 10.0,
    ];
    let n = boundary::clean_spectrum(&mut buffer, 0.0, UNSET, 0.01, 0.05, false, 5, 1).unwrap();
    assert!(n <= 5);
    let kept = &buffer[..2 * n];
    assert!(kept.chunks_exact(2).all(|c| c[0] > 0.0 && c[1] > 0.0));
    assert!(kept.chunks_exact(2).collect::<Vec<_>>().windows(2).all(|w| w[0][0] < w[1][0]));
    let total: f64 = kept.chunks_exact(2).map(|c| c[1]).sum();
    assert_close(total, 1.0, 1e-9);
}

#[test_log::test]
fn test_boundary_scoring_example() {
    let a = [69.071, 7.917962, 86.066, 1.021589, 86.0969, 100.0];
    let b = [41.04, 37.16, 69.07, 66.83, 86.1, 999.0];
    let weighted = boundary::weighted_entropy_similarity(&a, &b, 0.02, UNSET, None, None).unwrap();
    let unweighted =
        boundary::unweighted_entropy_similarity(&a, &b, 0.02, UNSET, None, None).unwrap();
    assert!((0.0..=1.0).contains(&weighted));
    assert!((weighted - unweighted).abs() > 1e-3);

    let clean = SentinelCleaning::default();
    let cleaned =
        boundary::weighted_entropy_similarity(&a, &b, 0.02, UNSET, Some(&clean), Some(&clean))
            .unwrap();
    assert!((0.0..=1.0).contains(&cleaned));
}

#[test_log::test]
fn test_scale_invariance_near_overflow() {
    let tol = ToleranceWindow::da(0.02);
    let clean = CleaningParameters::default();
    for spectrum in family() {
        let scaled = Spectrum::new(
            spectrum
                .iter()
                .map(|p| Peak::new(p.mz, p.intensity * 1e304))
                .collect(),
        )
        .unwrap();
        assert_close(weighted_similarity(&spectrum, &scaled, tol, None).unwrap(), 1.0, 1e-9);
        assert_close(unweighted_similarity(&spectrum, &scaled, tol, None).unwrap(), 1.0, 1e-9);
        assert_close(
            unweighted_similarity(&spectrum, &scaled, tol, Some(&clean)).unwrap(),
            1.0,
            1e-9,
        );
        let cleaned = clean_spectrum(scaled, &clean).unwrap();
        assert!(!cleaned.is_empty());
        assert_close(cleaned.tic(), 1.0, 1e-9);
    }
}
