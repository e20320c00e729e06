/// Epoch-end scoring on a held-out set using summed counts
use std::fmt;
use std::path::{Path, PathBuf};

use candle_core::{DType, Tensor};
use indicatif::{ProgressBar, ProgressStyle};

use super::{EpochCallback, Predictor};
use crate::data::PairedSequenceGenerator;
use crate::metrics::{CountErrors, CountMetrics};

/// Metrics of one epoch's evaluation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Zero-based epoch index as passed by the training loop
    pub epoch: usize,
    pub metrics: CountMetrics,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch {} - {}", self.epoch + 1, self.metrics)
    }
}

/// Runs the whole evaluation sequence through the model after every epoch
/// and logs MAE/RMSE of the per-image counts.
pub struct EvaluationCallback<'a> {
    generator: &'a PairedSequenceGenerator,
    dataset_root: PathBuf,
    show_progress: bool,
    history: Vec<EpochReport>,
}

impl<'a> EvaluationCallback<'a> {
    /// `dataset_root` is the base directory the evaluation data came from
    pub fn new<P: Into<PathBuf>>(generator: &'a PairedSequenceGenerator, dataset_root: P) -> Self {
        Self {
            generator,
            dataset_root: dataset_root.into(),
            show_progress: true,
            history: Vec::new(),
        }
    }

    /// Toggle the "Validating..." progress bar (on by default)
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn dataset_root(&self) -> &Path {
        &self.dataset_root
    }

    /// Reports of every completed evaluation, oldest first
    pub fn history(&self) -> &[EpochReport] {
        &self.history
    }

    /// One full pass over a freshly shuffled evaluation sequence
    pub fn evaluate<M: Predictor + ?Sized>(&self, model: &M) -> crate::Result<CountMetrics> {
        let sequence = self.generator.evaluation_sequence();
        let pb = self.progress_bar(sequence.len());
        let mut errors = CountErrors::new();

        for pair in sequence {
            let (input, target) = pair?;
            let prediction = model.predict(&input)?;

            errors.push(count(&target)?, count(&prediction)?);
            pb.inc(1);
        }

        pb.finish();
        errors.compute()
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{msg} {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Validating...");
        pb
    }
}

impl<M: Predictor + ?Sized> EpochCallback<M> for EvaluationCallback<'_> {
    fn on_epoch_end(&mut self, epoch: usize, model: &M) -> crate::Result<()> {
        let metrics = self.evaluate(model)?;
        let report = EpochReport { epoch, metrics };

        log::info!(
            "Evaluated {} samples from {:?}",
            metrics.samples,
            self.dataset_root
        );
        log::info!("{}", report);

        self.history.push(report);
        Ok(())
    }
}

/// Total of a density map (or a batch of them), accumulated in f64
fn count(tensor: &Tensor) -> crate::Result<f64> {
    Ok(tensor.to_dtype(DType::F64)?.sum_all()?.to_scalar::<f64>()?)
}
