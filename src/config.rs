/// Configuration for density-map training runs
///
/// Paths and loop settings are plain serde structs so a whole run can be
/// described in one JSON file.
use std::path::{Path, PathBuf};

use crate::data::layout;

/// Where the crowd-counting dataset lives and how its files are named
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Base directory for training and evaluation data
    pub dataset_root: PathBuf,

    /// Directory (inside `<split>_data`) holding input images
    pub input_dir: String,

    /// Directory (inside `<split>_data`) holding density maps
    pub output_dir: String,

    /// File extension of input images, without the dot
    pub input_extension: String,

    /// File extension of density maps, without the dot
    pub output_extension: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("data/ShanghaiTech/part_B"),
            input_dir: "images".to_string(),
            output_dir: "ground_truth".to_string(),
            input_extension: "jpg".to_string(),
            output_extension: "npy".to_string(),
        }
    }
}

impl DatasetConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.dataset_root.as_os_str().is_empty() {
            return Err(crate::CrowdError::Config(
                "dataset_root must not be empty".to_string(),
            ));
        }

        if self.input_dir.is_empty() || self.output_dir.is_empty() {
            return Err(crate::CrowdError::Config(
                "input_dir and output_dir must not be empty".to_string(),
            ));
        }

        if self.input_dir == self.output_dir && self.input_extension == self.output_extension {
            return Err(crate::CrowdError::Config(format!(
                "inputs and outputs both resolve to '{}/*.{}'",
                self.input_dir, self.input_extension
            )));
        }

        Ok(())
    }

    /// Directory of a split, e.g. `<root>/test_data`
    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.dataset_root.join(format!("{}_data", split))
    }

    /// Sorted input and output file lists for a split
    pub fn split_paths(&self, split: &str) -> crate::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let split_dir = self.split_dir(split);
        let inputs = layout::list_files(split_dir.join(&self.input_dir), &self.input_extension)?;
        let outputs = layout::list_files(split_dir.join(&self.output_dir), &self.output_extension)?;

        log::info!(
            "Split '{}' under {:?}: {} inputs, {} outputs",
            split,
            self.dataset_root,
            inputs.len(),
            outputs.len()
        );

        Ok((inputs, outputs))
    }
}

/// Epoch loop settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub num_epochs: usize,

    /// Items drawn from the training sequence per epoch.
    /// `None` means one pass worth of samples.
    pub steps_per_epoch: Option<usize>,

    /// Seed for reproducible shuffling
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            steps_per_epoch: None,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_epochs == 0 {
            return Err(crate::CrowdError::Config(
                "num_epochs must be > 0".to_string(),
            ));
        }

        if self.steps_per_epoch == Some(0) {
            return Err(crate::CrowdError::Config(
                "steps_per_epoch must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Full run description
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate both sections
    pub fn validate(&self) -> crate::Result<()> {
        self.dataset.validate()?;
        self.training.validate()
    }
}
