//! Core RBM algorithm implementation.
//!
//! This module provides the fundamental RBM structures and operations:
//! - A single square weight matrix shared by both passes
//! - Positive phase (visible → hidden) and negative phase (hidden → visible)
//! - The CD-1 weight update
//!
//! ## Passes
//!
//! Both passes squash a weighted sum with the logistic sigmoid:
//! ```text
//! forward:      h_j = σ( Σ_i W[j][i] · v_i )
//! reconstruct:  r_i = σ( Σ_j W[i][j] · h_j )
//! ```
//! Sums are folded left to right over the neuron index so repeated runs are
//! bit-identical.
//!
//! ## Contrastive Divergence
//!
//! ```text
//! W[j][i] += η · (h_j · v_i − h_j · r_i)
//! ```
//! Mean-field activations are used directly; there is no binary sampling.

use ndarray::{Array1, Array2, ArrayView1};
use std::ops::Range;
use thiserror::Error;

use crate::rng::MultiplyWithCarry;
use crate::utils::sigmoid;

/// Pixels in one MNIST image (28 × 28).
pub const MNIST_PIXELS: usize = 28 * 28;
/// Number of digit classes, one label neuron each.
pub const NUM_LABELS: usize = 10;

/// Error type for RBM operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RbmError {
    /// Fewer patterns loaded than the loop cycles through.
    #[error("Degenerate pattern set: {loaded} patterns loaded, window needs {window}")]
    DegeneratePatternSet {
        /// Patterns actually available
        loaded: usize,
        /// Patterns the loop indexes into
        window: usize,
    },

    /// Vector or matrix has the wrong size for the layout.
    #[error("Dimension mismatch for {what}: expected {expected}, actual {actual}")]
    DimensionMismatch {
        /// Which operand is wrong
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid engine configuration.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Evaluation requested before the weights were initialized.
    #[error("Weights not initialized: run training first")]
    NotTrained,
}

pub type RbmResult<T> = Result<T, RbmError>;

fn check_len(what: &'static str, expected: usize, actual: usize) -> RbmResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RbmError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Neuron layout: pixel neurons followed by label neurons.
///
/// Index 0 is shared between the first pixel and the bias neuron; the loop
/// overwrites it with 1 before every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Pixel neurons `P`
    pub pixels: usize,
    /// Label neurons `L`
    pub labels: usize,
}

impl Layout {
    /// 784 pixels + 10 labels.
    pub const MNIST: Layout = Layout {
        pixels: MNIST_PIXELS,
        labels: NUM_LABELS,
    };

    /// Layout with `pixels` pixel neurons and `labels` label neurons.
    #[must_use]
    pub fn new(pixels: usize, labels: usize) -> Self {
        Self { pixels, labels }
    }

    /// Total neurons `V = P + L`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels + self.labels
    }

    /// True when there are no neurons at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index range of the label neurons.
    #[must_use]
    pub fn label_range(&self) -> Range<usize> {
        self.pixels..self.len()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::MNIST
    }
}

/// Weighted sum of row `row` of `weights` against `v`, left to right.
#[inline]
fn row_activity(weights: &Array2<f64>, row: usize, v: ArrayView1<'_, f64>) -> f64 {
    weights
        .row(row)
        .iter()
        .zip(v.iter())
        .fold(0.0, |acc, (w, x)| acc + w * x)
}

fn check_square(weights: &Array2<f64>, len: usize) -> RbmResult<()> {
    check_len("weight rows", len, weights.nrows())?;
    check_len("weight columns", len, weights.ncols())
}

/// Positive phase into a caller-owned buffer: `out[j] = σ(Σ_i W[j][i]·in[i])`.
///
/// Does not pin the bias; the training loop sets `out[0] = 1` afterwards.
pub fn forward_into(
    input: ArrayView1<'_, f64>,
    weights: &Array2<f64>,
    out: &mut Array1<f64>,
) -> RbmResult<()> {
    check_square(weights, input.len())?;
    check_len("output", input.len(), out.len())?;

    for (j, o) in out.iter_mut().enumerate() {
        *o = sigmoid(row_activity(weights, j, input));
    }
    Ok(())
}

/// Positive phase, allocating the hidden vector.
pub fn forward(input: &Array1<f64>, weights: &Array2<f64>) -> RbmResult<Array1<f64>> {
    let mut out = Array1::zeros(input.len());
    forward_into(input.view(), weights, &mut out)?;
    Ok(out)
}

/// Negative phase into a caller-owned buffer: `rec[i] = σ(Σ_j W[i][j]·out[j])`.
pub fn reconstruct_into(
    output: ArrayView1<'_, f64>,
    weights: &Array2<f64>,
    rec: &mut Array1<f64>,
) -> RbmResult<()> {
    check_square(weights, output.len())?;
    check_len("reconstruction", output.len(), rec.len())?;

    for (i, r) in rec.iter_mut().enumerate() {
        *r = sigmoid(row_activity(weights, i, output));
    }
    Ok(())
}

/// Negative phase, allocating the reconstruction vector.
pub fn reconstruct(output: &Array1<f64>, weights: &Array2<f64>) -> RbmResult<Array1<f64>> {
    let mut rec = Array1::zeros(output.len());
    reconstruct_into(output.view(), weights, &mut rec)?;
    Ok(rec)
}

/// CD-1 update in place: `W[j][i] += η·(out[j]·in[i] − out[j]·rec[i])`.
pub fn contrastive_divergence(
    input: ArrayView1<'_, f64>,
    output: ArrayView1<'_, f64>,
    reconstruction: ArrayView1<'_, f64>,
    weights: &mut Array2<f64>,
    learning_rate: f64,
) -> RbmResult<()> {
    check_len("output", input.len(), output.len())?;
    check_len("reconstruction", input.len(), reconstruction.len())?;
    check_square(weights, input.len())?;

    for (mut row, &o) in weights.rows_mut().into_iter().zip(output.iter()) {
        for ((w, &x), &r) in row.iter_mut().zip(input.iter()).zip(reconstruction.iter()) {
            *w += learning_rate * (o * x - o * r);
        }
    }
    Ok(())
}

/// The weight store: one `V × V` matrix over all neurons.
///
/// Row `j`, column `i` scales neuron `i` into neuron `j` on the forward pass;
/// the reconstruction pass reads row `i`, column `j`. The matrix is never
/// symmetrized.
#[derive(Clone)]
pub struct Rbm {
    layout: Layout,
    w: Array2<f64>,
}

impl std::fmt::Debug for Rbm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rbm")
            .field("layout", &self.layout)
            .field("w", &format!("<{}x{} weights>", self.w.nrows(), self.w.ncols()))
            .finish()
    }
}

impl Rbm {
    /// All-zero weights. Call [`Rbm::initialize`] before training.
    #[must_use]
    pub fn zeros(layout: Layout) -> Self {
        let n = layout.len();
        Self {
            layout,
            w: Array2::zeros((n, n)),
        }
    }

    /// Wrap an existing matrix.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the matrix is not `V × V`
    pub fn from_weights(layout: Layout, w: Array2<f64>) -> RbmResult<Self> {
        check_square(&w, layout.len())?;
        Ok(Self { layout, w })
    }

    /// Fill every entry with `rng.next_weight()`.
    ///
    /// Draw order is column-major (outer loop over columns, inner over
    /// rows), which fixes which draw lands in which cell.
    pub fn initialize(&mut self, rng: &mut MultiplyWithCarry) {
        let n = self.layout.len();
        for col in 0..n {
            for row in 0..n {
                self.w[[row, col]] = rng.next_weight();
            }
        }
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.w
    }

    pub fn weights_mut(&mut self) -> &mut Array2<f64> {
        &mut self.w
    }

    /// Positive phase against this matrix.
    pub fn forward(&self, input: &Array1<f64>) -> RbmResult<Array1<f64>> {
        forward(input, &self.w)
    }

    /// Negative phase against this matrix.
    pub fn reconstruct(&self, output: &Array1<f64>) -> RbmResult<Array1<f64>> {
        reconstruct(output, &self.w)
    }

    /// Apply one CD-1 update.
    pub fn apply_cd(
        &mut self,
        input: &Array1<f64>,
        output: &Array1<f64>,
        reconstruction: &Array1<f64>,
        learning_rate: f64,
    ) -> RbmResult<()> {
        contrastive_divergence(
            input.view(),
            output.view(),
            reconstruction.view(),
            &mut self.w,
            learning_rate,
        )
    }
}
