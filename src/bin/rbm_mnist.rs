//! RBM MNIST training binary.
//!
//! Loads the MNIST training files, trains the RBM with CD-1 (label injected
//! into the visible layer), then evaluates on the same pattern window by
//! reading the strongest label neuron of each reconstruction.
//!
//! ## Usage
//!
//! ```bash
//! rbm-mnist \
//!   --labels data/train-labels-idx1-ubyte \
//!   --images data/train-images-idx3-ubyte \
//!   --train-steps 10000 \
//!   --eval-steps 1000 \
//!   --metrics-file data/output/metrics.jsonl
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`; `debug` shows every
//! evaluation verdict).

use anyhow::{Context, Result};
use clap::Parser;
use rbm_mnist::{load_mnist, Config, JsonlReporter, Mode, RbmEngine, RunSummary, MAX_PATTERNS};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rbm-mnist",
    about = "Train and evaluate a CD-1 Restricted Boltzmann Machine on MNIST"
)]
struct Args {
    /// IDX label file
    #[arg(long, default_value = "train-labels-idx1-ubyte")]
    labels: PathBuf,

    /// IDX image file
    #[arg(long, default_value = "train-images-idx3-ubyte")]
    images: PathBuf,

    /// Patterns to load (capped at 1000)
    #[arg(long, default_value_t = MAX_PATTERNS)]
    max_patterns: usize,

    /// Step bound for the training run (runs N-1 steps)
    #[arg(long, default_value_t = 10_000)]
    train_steps: usize,

    /// Step bound for the evaluation run (runs N-1 steps)
    #[arg(long, default_value_t = 1_000)]
    eval_steps: usize,

    /// CD-1 learning rate
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Progress report period in steps
    #[arg(long, default_value_t = 111)]
    report_every: usize,

    /// Append progress reports as JSON lines
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Write train/eval summaries as JSON
    #[arg(long)]
    summary_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summaries {
    train: RunSummary,
    evaluate: RunSummary,
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let patterns = load_mnist(&args.labels, &args.images, args.max_patterns).with_context(|| {
        format!(
            "loading MNIST from {} and {}",
            args.labels.display(),
            args.images.display()
        )
    })?;

    let config = Config {
        learning_rate: args.learning_rate,
        report_every: args.report_every,
        ..Config::default()
    };
    let mut engine = RbmEngine::new(patterns, config).context("building RBM engine")?;

    let (train, evaluate) = match &args.metrics_file {
        Some(path) => {
            let mut reporter = JsonlReporter::new(BufWriter::new(create_file(path)?));
            let train = engine.run(Mode::Train, args.train_steps, &mut reporter)?;
            let evaluate = engine.run(Mode::Evaluate, args.eval_steps, &mut reporter)?;
            reporter
                .finish()
                .with_context(|| format!("writing metrics to {}", path.display()))?;
            (train, evaluate)
        }
        None => (
            engine.run_training(args.train_steps)?,
            engine.run_evaluation(args.eval_steps)?,
        ),
    };

    info!(
        correct = evaluate.correct,
        steps = evaluate.steps,
        accuracy = evaluate.accuracy,
        "evaluation complete"
    );
    println!(
        "Recognition rate: {}/{} = {:.2}%",
        evaluate.correct,
        evaluate.steps,
        evaluate.accuracy * 100.0
    );

    if let Some(path) = &args.summary_file {
        let file = create_file(path)?;
        serde_json::to_writer_pretty(file, &Summaries { train, evaluate })
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }

    Ok(())
}
