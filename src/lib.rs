//! Crowd density training utilities for candle
//!
//! Helpers for training density-map regression models that count people in
//! images. A density map is a per-pixel estimate whose spatial sum is the
//! predicted head count.
//!
//! # Components
//!
//! - **PairedSequenceGenerator**: pairs input images with density maps by sort
//!   rank and produces an endless shuffled training sequence or a finite
//!   shuffled evaluation pass
//! - **EvaluationCallback**: at every epoch end, scores the model on the
//!   held-out set using summed counts (MAE and RMSE)
//! - **Trainer**: a small epoch loop that drives a training step and fires
//!   epoch-end callbacks
//!
//! # Example
//!
//! ```ignore
//! use crowd_density::data::PairedSequenceGenerator;
//! use crowd_density::training::{EpochCallback, EvaluationCallback, Trainer};
//!
//! let test_gen = PairedSequenceGenerator::new(images, maps, load_image, load_map)?;
//! let mut score = EvaluationCallback::new(&test_gen, &config.dataset.dataset_root);
//! let mut callbacks: [&mut dyn EpochCallback<_>; 1] = [&mut score];
//! Trainer::new(config.training).fit(&mut model, &train_gen, &mut callbacks)?;
//! ```

use std::path::PathBuf;

pub mod config;
pub mod data;
pub mod metrics;
pub mod training;

// Re-export commonly used items
pub use config::{DatasetConfig, PipelineConfig, TrainingConfig};
pub use data::PairedSequenceGenerator;
pub use metrics::{CountErrors, CountMetrics};
pub use training::{EpochCallback, EvaluationCallback, Predictor, TrainStep, Trainer};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum CrowdError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Different number of input and output files: {inputs} inputs, {outputs} outputs")]
    PairMismatch { inputs: usize, outputs: usize },

    #[error("Cannot compute count metrics over zero samples")]
    EmptyEvaluation,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error in {path:?}: {message}")]
    Data { path: PathBuf, message: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrowdError>;
