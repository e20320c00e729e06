/// Epoch loop driving a training step over the endless training sequence
use super::{EpochCallback, TrainStep};
use crate::config::TrainingConfig;
use crate::data::PairedSequenceGenerator;
use crate::CrowdError;

/// Trainer for density-map models
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Create new trainer
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Full training loop.
    ///
    /// Draws `steps_per_epoch` pairs per epoch (one pass worth when unset)
    /// from a single training sequence that keeps its position across
    /// epochs. When `seed` is set it fixes the training order, overriding any
    /// seed on the generator. Callbacks run synchronously after each epoch,
    /// in order. Returns the average loss of every epoch.
    pub fn fit<M: TrainStep>(
        &self,
        model: &mut M,
        generator: &PairedSequenceGenerator,
        callbacks: &mut [&mut dyn EpochCallback<M>],
    ) -> crate::Result<Vec<f32>> {
        self.config.validate()?;

        if generator.is_empty() {
            return Err(CrowdError::Config(
                "cannot train on an empty dataset".to_string(),
            ));
        }

        let steps = self
            .config
            .steps_per_epoch
            .unwrap_or_else(|| generator.steps_per_epoch());

        log::info!("Starting training for {} epochs", self.config.num_epochs);
        log::info!("Steps per epoch: {} ({} samples)", steps, generator.len());

        let mut sequence = match self.config.seed {
            Some(seed) => {
                log::info!("Training order seeded with {}", seed);
                generator.training_sequence_seeded(seed)
            }
            None => generator.training_sequence(),
        };
        let mut epoch_losses = Vec::with_capacity(self.config.num_epochs);

        for epoch in 0..self.config.num_epochs {
            log::info!("=== Epoch {}/{} ===", epoch + 1, self.config.num_epochs);

            for callback in callbacks.iter_mut() {
                callback.on_epoch_start(epoch, model)?;
            }

            let mut total_loss = 0.0;
            for step in 0..steps {
                let (input, target) = sequence.next().ok_or_else(|| {
                    CrowdError::Training("training sequence ended unexpectedly".to_string())
                })??;

                let loss = model.train_step(&input, &target)?;
                total_loss += loss;

                log::debug!("Step {}/{}: loss={:.4}", step + 1, steps, loss);
            }

            let avg_loss = total_loss / steps as f32;
            log::info!("Epoch {} complete: avg_loss={:.4}", epoch + 1, avg_loss);

            for callback in callbacks.iter_mut() {
                callback.on_epoch_end(epoch, model)?;
            }

            epoch_losses.push(avg_loss);
        }

        log::info!("Training complete!");

        Ok(epoch_losses)
    }
}
