/// Training loop seams and epoch-end evaluation
pub mod callback;
pub mod trainer;

pub use callback::{EpochReport, EvaluationCallback};
pub use trainer::Trainer;

use candle_core::Tensor;

/// Anything that maps a batched input to a batched density map
pub trait Predictor {
    fn predict(&self, input: &Tensor) -> crate::Result<Tensor>;
}

impl<M: candle_nn::Module> Predictor for M {
    fn predict(&self, input: &Tensor) -> crate::Result<Tensor> {
        Ok(self.forward(input)?)
    }
}

/// One optimisation step on a single batch, returning the loss
pub trait TrainStep {
    fn train_step(&mut self, input: &Tensor, target: &Tensor) -> crate::Result<f32>;
}

/// Hooks fired by the epoch loop
///
/// Callbacks only ever see the model by shared reference.
pub trait EpochCallback<M: ?Sized> {
    fn on_epoch_start(&mut self, _epoch: usize, _model: &M) -> crate::Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, model: &M) -> crate::Result<()>;
}
