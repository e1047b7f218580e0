//! Unit tests for the forward/reconstruction passes and the CD-1 update.
//!
//! These tests verify:
//! - Sigmoid output bounds and the all-zero-weights fixed point
//! - The single-weight forward scenario and the sign of the CD update
//! - Zero update when there is no divergence
//! - Label readout with first-wins ties
//! - RNG output stays non-negative over a long stream

use approx::assert_abs_diff_eq;
use ndarray::{arr1, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rbm_mnist::core::{contrastive_divergence, forward, reconstruct};
use rbm_mnist::training::classify;
use rbm_mnist::utils::sigmoid;
use rbm_mnist::{Layout, MultiplyWithCarry};

fn random_vector(rng: &mut StdRng, n: usize, lo: f64, hi: f64) -> Array1<f64> {
    Array1::from_iter((0..n).map(|_| rng.gen_range(lo..hi)))
}

fn random_matrix(rng: &mut StdRng, n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0))
}

// ============================================================================
// ACTIVATION
// ============================================================================

#[test]
fn test_sigmoid_at_zero() {
    assert_eq!(sigmoid(0.0), 0.5);
}

#[test]
fn test_passes_stay_in_open_unit_interval() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let n = 12;
        let w = random_matrix(&mut rng, n);
        let input = random_vector(&mut rng, n, 0.0, 1.0);

        let out = forward(&input, &w).unwrap();
        assert!(out.iter().all(|&v| v > 0.0 && v < 1.0));

        let rec = reconstruct(&out, &w).unwrap();
        assert!(rec.iter().all(|&v| v > 0.0 && v < 1.0));
    }
}

#[test]
fn test_zero_weights_toy_scenario() {
    let layout = Layout::new(4, 2);
    let w = Array2::zeros((layout.len(), layout.len()));
    let input = arr1(&[1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);

    let out = forward(&input, &w).unwrap();
    assert!(out.iter().all(|&v| v == 0.5));

    let rec = reconstruct(&out, &w).unwrap();
    assert!(rec.iter().all(|&v| v == 0.5));
}

#[test]
fn test_forward_and_reconstruct_read_rows() {
    // W[j][i] feeds neuron i into j on the way up; W[i][j] feeds j into i
    // on the way down. Both read a row of the same matrix.
    let mut w = Array2::zeros((3, 3));
    w[[2, 1]] = 2.0;
    let up = forward(&arr1(&[0.0, 1.0, 0.0]), &w).unwrap();
    assert_abs_diff_eq!(up[2], sigmoid(2.0), epsilon = 1e-12);
    assert_eq!(up[1], 0.5);

    let down = reconstruct(&arr1(&[0.0, 1.0, 0.0]), &w).unwrap();
    assert_abs_diff_eq!(down[2], sigmoid(2.0), epsilon = 1e-12);
    assert_eq!(down[1], 0.5);
}

#[test]
fn test_single_weight_training_step() {
    let n = 6;
    let mut w = Array2::zeros((n, n));
    w[[1, 0]] = 1.0;
    let input = arr1(&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);

    let mut out = forward(&input, &w).unwrap();
    assert_abs_diff_eq!(out[1], 0.731_058_578_630_004_9, epsilon = 1e-12);
    out[0] = 1.0;

    let rec = reconstruct(&out, &w).unwrap();
    assert!(input[0] * out[1] > rec[0] * out[1]);

    let before = w[[1, 0]];
    contrastive_divergence(input.view(), out.view(), rec.view(), &mut w, 0.1).unwrap();
    assert!(w[[1, 0]] > before);
    let expected = before + 0.1 * (out[1] * input[0] - out[1] * rec[0]);
    assert_abs_diff_eq!(w[[1, 0]], expected, epsilon = 1e-15);
}

// ============================================================================
// CONTRASTIVE DIVERGENCE
// ============================================================================

#[test]
fn test_no_divergence_leaves_weights_unchanged() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 10;
    let mut w = random_matrix(&mut rng, n);
    let before = w.clone();

    // input, hidden and reconstruction all agree
    let v = random_vector(&mut rng, n, 0.0, 1.0);
    contrastive_divergence(v.view(), v.view(), v.view(), &mut w, 0.1).unwrap();
    assert_eq!(w, before);

    // the delta only depends on input vs reconstruction
    let h = random_vector(&mut rng, n, 0.0, 1.0);
    contrastive_divergence(v.view(), h.view(), v.view(), &mut w, 0.1).unwrap();
    assert_eq!(w, before);
}

#[test]
fn test_cd_matches_rule_entrywise() {
    let mut rng = StdRng::seed_from_u64(99);
    let n = 5;
    let mut w = random_matrix(&mut rng, n);
    let before = w.clone();
    let v = random_vector(&mut rng, n, 0.0, 1.0);
    let h = random_vector(&mut rng, n, 0.0, 1.0);
    let r = random_vector(&mut rng, n, 0.0, 1.0);

    contrastive_divergence(v.view(), h.view(), r.view(), &mut w, 0.1).unwrap();
    for j in 0..n {
        for i in 0..n {
            let expected = before[[j, i]] + 0.1 * (h[j] * v[i] - h[j] * r[i]);
            assert_eq!(w[[j, i]], expected);
        }
    }
}

#[test]
fn test_cd_rejects_mismatched_lengths() {
    let mut w = Array2::zeros((3, 3));
    let v = arr1(&[1.0, 0.0, 1.0]);
    let short = arr1(&[1.0, 0.0]);
    assert!(contrastive_divergence(v.view(), short.view(), v.view(), &mut w, 0.1).is_err());
    assert!(contrastive_divergence(v.view(), v.view(), short.view(), &mut w, 0.1).is_err());
}

// ============================================================================
// CLASSIFICATION READOUT
// ============================================================================

#[test]
fn test_classify_label_subrange() {
    let layout = Layout::new(3, 4);
    let rec = arr1(&[1.0, 1.0, 1.0, 0.2, 0.9, 0.1, 0.3]);
    assert_eq!(classify(rec.view(), layout), Some(1));

    // scale does not matter
    let scaled = rec.mapv(|v| v * 1e-3);
    assert_eq!(classify(scaled.view(), layout), Some(1));
}

#[test]
fn test_classify_ties_keep_earliest() {
    let layout = Layout::new(1, 3);
    let rec = arr1(&[0.0, 0.7, 0.7, 0.7]);
    assert_eq!(classify(rec.view(), layout), Some(0));
}

// ============================================================================
// RNG
// ============================================================================

#[test]
fn test_rng_never_negative() {
    let rng = MultiplyWithCarry::default();
    assert!(rng.take(200_000).all(|v| v >= 0));
}

#[test]
fn test_rng_weights_in_range() {
    let mut rng = MultiplyWithCarry::default();
    for _ in 0..10_000 {
        let w = rng.next_weight();
        assert!((-1.0..1.0).contains(&w));
    }
}
