/// Data sources for density-map training
pub mod generator;
pub mod layout;
pub mod npy;

pub use generator::{EvaluationSequence, Loader, PairedSequenceGenerator, TrainingSequence};
pub use layout::list_files;
pub use npy::{load_density_npy, npy_loader};
