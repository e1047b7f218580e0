//! # RBM-MNIST
//!
//! A Restricted Boltzmann Machine trained with one-step Contrastive Divergence
//! (CD-1) on binarized MNIST digits.
//!
//! ## Overview
//!
//! Pixels and ten label neurons share one visible vector and one square
//! weight matrix. During training the true digit is switched on in its label
//! neuron; during evaluation the label neurons start at zero and the digit is
//! read back as the strongest label neuron of the reconstruction.
//!
//! ## Structure
//!
//! - [`core`] — Weight store, forward/reconstruction passes, CD-1 update
//! - [`training`] — Training/evaluation loop, observers, reports
//! - [`data`] — Pattern set and IDX dataset loading
//! - [`rng`] — Deterministic weight-initialization generator
//! - [`utils`] — Sigmoid and argmax helpers

pub mod core;
pub mod data;
pub mod rng;
pub mod training;
pub mod utils;

pub use crate::core::{Layout, Rbm, RbmError, RbmResult};
pub use data::{load_mnist, DataError, PatternSet, MAX_PATTERNS};
pub use rng::MultiplyWithCarry;
pub use training::{
    JsonlReporter, Mode, ProgressReport, RbmEngine, RunSummary, StepObserver, StepSnapshot,
};

/// Engine configuration.
///
/// Used by [`RbmEngine::new`]; `Default` gives the MNIST setup.
#[derive(Debug, Clone)]
pub struct Config {
    /// CD-1 learning rate
    pub learning_rate: f64,
    /// Number of leading patterns the loop cycles through
    pub pattern_window: usize,
    /// Emit a progress report every this many steps
    pub report_every: usize,
    /// RNG seed words `(z, w)`
    pub seed: (i32, i32),
    /// Pixel and label neuron counts
    pub layout: Layout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            pattern_window: 100,
            report_every: 111,
            seed: (rng::DEFAULT_SEED_Z, rng::DEFAULT_SEED_W),
            layout: Layout::MNIST,
        }
    }
}

impl Config {
    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    /// - `InvalidConfig` naming the first offending field
    pub fn validate(&self) -> RbmResult<()> {
        let fail = |msg: &str| Err(RbmError::InvalidConfig(msg.to_string()));

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail("learning_rate must be finite and positive");
        }
        if self.pattern_window == 0 {
            return fail("pattern_window must be at least 1");
        }
        if self.report_every == 0 {
            return fail("report_every must be at least 1");
        }
        if self.layout.pixels == 0 {
            return fail("layout needs at least one pixel neuron for the bias");
        }
        if self.layout.labels == 0 {
            return fail("layout needs at least one label neuron");
        }
        Ok(())
    }
}
