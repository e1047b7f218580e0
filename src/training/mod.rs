//! Training and evaluation loop, step snapshots, and progress reporting.
//!
//! One controller, [`RbmEngine`], owns the weight store, the RNG and the
//! transient `input` / `output` / `reconstruction` vectors. Each step:
//!
//! 1. picks pattern `cursor % pattern_window`
//! 2. writes pixels into `input[..P]`, zeroes `input[P..]`, and in training
//!    mode sets the one-hot label slot
//! 3. pins `input[0] = 1` (bias)
//! 4. forward pass, then pins `output[0] = 1`
//! 5. reconstruction pass
//! 6. training: CD-1 update; evaluation: argmax over the label slots
//!
//! Weights are initialized when a training run starts and never during
//! evaluation.

use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{
    contrastive_divergence, forward_into, reconstruct_into, Layout, Rbm, RbmError, RbmResult,
};
use crate::data::PatternSet;
use crate::rng::MultiplyWithCarry;
use crate::utils::argmax_first;
use crate::Config;

/// Whether a run learns or scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Evaluate,
}

/// Borrowed view of one completed step.
#[derive(Debug, Clone, Copy)]
pub struct StepSnapshot<'a> {
    pub mode: Mode,
    /// 1-based step counter
    pub step: usize,
    /// Index into the pattern set
    pub pattern: usize,
    pub label: i32,
    /// Predicted digit (evaluation only)
    pub predicted: Option<usize>,
    pub input: ArrayView1<'a, f64>,
    pub output: ArrayView1<'a, f64>,
    pub reconstruction: ArrayView1<'a, f64>,
}

/// Periodic running-accuracy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub mode: Mode,
    pub step: usize,
    pub pattern: usize,
    pub label: i32,
    pub correct: usize,
    pub accuracy: f32,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: Mode,
    /// Steps executed (`step_count - 1`, or 0)
    pub steps: usize,
    pub correct: usize,
    pub accuracy: f32,
    pub elapsed_secs: f32,
}

/// Receives per-step snapshots and periodic reports.
///
/// Observers only watch; the engine behaves identically with none attached.
pub trait StepObserver {
    fn on_step(&mut self, _snapshot: &StepSnapshot<'_>) {}

    fn on_report(&mut self, _report: &ProgressReport) {}
}

/// No-op observer.
impl StepObserver for () {}

/// Writes each [`ProgressReport`] as one JSON line.
///
/// Observers cannot fail the run, so the first write error is held and
/// returned by [`JsonlReporter::finish`].
pub struct JsonlReporter<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> JsonlReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Flush and hand back the writer, or the first error seen.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_line(&mut self, report: &ProgressReport) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> StepObserver for JsonlReporter<W> {
    fn on_report(&mut self, report: &ProgressReport) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_line(report) {
            self.error = Some(e);
        }
    }
}

/// Label slot for `label`, or `None` if it is not a valid digit.
#[must_use]
pub fn label_slot(label: i32, labels: usize) -> Option<usize> {
    usize::try_from(label).ok().filter(|&slot| slot < labels)
}

/// Read the predicted digit from the label slots of a reconstruction.
///
/// Earliest slot wins ties. `None` if the vector is too short or the layout
/// has no label slots.
#[must_use]
pub fn classify(reconstruction: ArrayView1<'_, f64>, layout: Layout) -> Option<usize> {
    if reconstruction.len() < layout.len() {
        return None;
    }
    argmax_first(reconstruction.slice(s![layout.label_range()]))
}

/// [`classify`], treating a missing readout as a shape error rather than
/// a guess.
fn predict(reconstruction: ArrayView1<'_, f64>, layout: Layout) -> RbmResult<usize> {
    classify(reconstruction, layout).ok_or(RbmError::DimensionMismatch {
        what: "reconstruction",
        expected: layout.len(),
        actual: reconstruction.len(),
    })
}

/// The single stateful controller for training and evaluation.
#[derive(Debug)]
pub struct RbmEngine {
    config: Config,
    patterns: PatternSet,
    rbm: Rbm,
    rng: MultiplyWithCarry,
    initialized: bool,
    cursor: usize,
    input: Array1<f64>,
    output: Array1<f64>,
    reconstruction: Array1<f64>,
}

impl RbmEngine {
    /// Build an engine over a loaded pattern set. Weights start zeroed and
    /// uninitialized.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` fails validation
    /// - `DimensionMismatch` if images are not `layout.pixels` wide
    /// - `DegeneratePatternSet` if fewer than `pattern_window` patterns
    pub fn new(patterns: PatternSet, config: Config) -> RbmResult<Self> {
        config.validate()?;

        if patterns.image_dim() != config.layout.pixels {
            return Err(RbmError::DimensionMismatch {
                what: "image pixels",
                expected: config.layout.pixels,
                actual: patterns.image_dim(),
            });
        }
        if patterns.len() < config.pattern_window {
            return Err(RbmError::DegeneratePatternSet {
                loaded: patterns.len(),
                window: config.pattern_window,
            });
        }

        let n = config.layout.len();
        let (z, w) = config.seed;
        Ok(Self {
            rbm: Rbm::zeros(config.layout),
            rng: MultiplyWithCarry::new(z, w),
            initialized: false,
            cursor: 0,
            input: Array1::zeros(n),
            output: Array1::zeros(n),
            reconstruction: Array1::zeros(n),
            patterns,
            config,
        })
    }

    /// Build an engine with a supplied weight matrix, ready for evaluation.
    ///
    /// A later training run still reinitializes from the RNG.
    pub fn with_weights(
        patterns: PatternSet,
        config: Config,
        weights: Array2<f64>,
    ) -> RbmResult<Self> {
        let mut engine = Self::new(patterns, config)?;
        engine.rbm = Rbm::from_weights(engine.config.layout, weights)?;
        engine.initialized = true;
        Ok(engine)
    }

    /// Train for `step_count - 1` steps from freshly initialized weights.
    pub fn run_training(&mut self, step_count: usize) -> RbmResult<RunSummary> {
        self.run(Mode::Train, step_count, &mut ())
    }

    /// Score `step_count - 1` patterns against the current weights.
    pub fn run_evaluation(&mut self, step_count: usize) -> RbmResult<RunSummary> {
        self.run(Mode::Evaluate, step_count, &mut ())
    }

    /// Run one full pass in `mode`, notifying `observer` after every step.
    ///
    /// # Errors
    /// - `NotTrained` when evaluating before any training or supplied weights
    pub fn run<O>(&mut self, mode: Mode, step_count: usize, observer: &mut O) -> RbmResult<RunSummary>
    where
        O: StepObserver + ?Sized,
    {
        match mode {
            Mode::Train => {
                self.rbm.initialize(&mut self.rng);
                self.initialized = true;
            }
            Mode::Evaluate if !self.initialized => return Err(RbmError::NotTrained),
            Mode::Evaluate => {}
        }

        let start = Instant::now();
        let layout = self.config.layout;
        let window = self.config.pattern_window;
        let mut correct = 0usize;
        let mut steps = 0usize;
        self.cursor = 0;

        info!(?mode, steps = step_count.saturating_sub(1), "starting run");

        for count in 1..step_count {
            let index = self.cursor % window;
            let label = self.patterns.label(index);
            self.load_input(index, label, mode);

            forward_into(self.input.view(), self.rbm.weights(), &mut self.output)?;
            self.output[0] = 1.0;
            reconstruct_into(self.output.view(), self.rbm.weights(), &mut self.reconstruction)?;

            let predicted = match mode {
                Mode::Train => {
                    contrastive_divergence(
                        self.input.view(),
                        self.output.view(),
                        self.reconstruction.view(),
                        self.rbm.weights_mut(),
                        self.config.learning_rate,
                    )?;
                    None
                }
                Mode::Evaluate => {
                    let digit = predict(self.reconstruction.view(), layout)?;
                    let hit = label_slot(label, layout.labels) == Some(digit);
                    if hit {
                        correct += 1;
                    }
                    debug!(pattern = index, label, predicted = digit, correct = hit, "evaluated");
                    Some(digit)
                }
            };
            steps = count;

            observer.on_step(&StepSnapshot {
                mode,
                step: count,
                pattern: index,
                label,
                predicted,
                input: self.input.view(),
                output: self.output.view(),
                reconstruction: self.reconstruction.view(),
            });

            // Reported after scoring, so `correct` includes this step.
            if count % self.config.report_every == 0 {
                let report = ProgressReport {
                    mode,
                    step: count,
                    pattern: index,
                    label,
                    correct,
                    accuracy: ratio(correct, count),
                };
                info!(
                    ?mode,
                    step = count,
                    label,
                    accuracy = report.accuracy,
                    "progress"
                );
                observer.on_report(&report);
            }

            self.cursor += 1;
        }

        let summary = RunSummary {
            mode,
            steps,
            correct,
            accuracy: ratio(correct, steps),
            elapsed_secs: start.elapsed().as_secs_f32(),
        };
        info!(
            ?mode,
            steps,
            correct,
            accuracy = summary.accuracy,
            elapsed_secs = summary.elapsed_secs,
            "run finished"
        );
        Ok(summary)
    }

    fn load_input(&mut self, index: usize, label: i32, mode: Mode) {
        let pixels = self.config.layout.pixels;
        self.input
            .slice_mut(s![..pixels])
            .assign(&self.patterns.image(index));
        self.input.slice_mut(s![pixels..]).fill(0.0);

        if mode == Mode::Train {
            match label_slot(label, self.config.layout.labels) {
                Some(slot) => self.input[pixels + slot] = 1.0,
                None => warn!(pattern = index, label, "label out of range, not injected"),
            }
        }

        self.input[0] = 1.0;
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    #[must_use]
    pub fn rbm(&self) -> &Rbm {
        &self.rbm
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Steps taken by the last run (the pattern cursor).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Visible vector of the last step.
    #[must_use]
    pub fn input(&self) -> &Array1<f64> {
        &self.input
    }

    /// Hidden vector of the last step.
    #[must_use]
    pub fn output(&self) -> &Array1<f64> {
        &self.output
    }

    /// Reconstruction of the last step.
    #[must_use]
    pub fn reconstruction(&self) -> &Array1<f64> {
        &self.reconstruction
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(correct: usize, count: usize) -> f32 {
    if count == 0 {
        0.0
    } else {
        correct as f32 / count as f32
    }
}
