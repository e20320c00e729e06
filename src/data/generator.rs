/// Paired input/density-map sequences for training and evaluation
///
/// Inputs and outputs are matched purely by sort rank, so files must share a
/// naming scheme (`IMG_1.jpg` / `GT_IMG_1.npy`, not `IMG_1.jpg` / `map_9.npy`).
use std::cell::Cell;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Reads one unbatched sample tensor from disk
pub type Loader = Box<dyn Fn(&Path) -> crate::Result<Tensor>>;

/// Pairs input files with output files and loads them lazily
pub struct PairedSequenceGenerator {
    input_paths: Vec<PathBuf>,
    output_paths: Vec<PathBuf>,
    load_input: Loader,
    load_output: Loader,
    steps_per_epoch: usize,
    seed: Option<u64>,
    passes: Cell<u64>,
}

impl PairedSequenceGenerator {
    /// Create a generator over two path collections.
    ///
    /// Both collections are sorted; rank `i` of one is paired with rank `i`
    /// of the other. Fails with [`crate::CrowdError::PairMismatch`] when the
    /// collections differ in length.
    pub fn new<I, O, FI, FO>(
        input_paths: I,
        output_paths: O,
        load_input: FI,
        load_output: FO,
    ) -> crate::Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
        O: IntoIterator,
        O::Item: Into<PathBuf>,
        FI: Fn(&Path) -> crate::Result<Tensor> + 'static,
        FO: Fn(&Path) -> crate::Result<Tensor> + 'static,
    {
        let mut input_paths: Vec<PathBuf> = input_paths.into_iter().map(Into::into).collect();
        let mut output_paths: Vec<PathBuf> = output_paths.into_iter().map(Into::into).collect();
        input_paths.sort();
        output_paths.sort();

        if input_paths.len() != output_paths.len() {
            return Err(crate::CrowdError::PairMismatch {
                inputs: input_paths.len(),
                outputs: output_paths.len(),
            });
        }

        if input_paths.is_empty() {
            log::warn!("Paired generator created with no samples");
        }

        let steps_per_epoch = input_paths.len();

        Ok(Self {
            input_paths,
            output_paths,
            load_input: Box::new(load_input),
            load_output: Box::new(load_output),
            steps_per_epoch,
            seed: None,
            passes: Cell::new(0),
        })
    }

    /// Make shuffling reproducible. Pass `k` shuffles with `seed + k`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of sample pairs
    pub fn len(&self) -> usize {
        self.steps_per_epoch
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.steps_per_epoch == 0
    }

    /// Items in one full pass over the data
    pub fn steps_per_epoch(&self) -> usize {
        self.steps_per_epoch
    }

    /// Sorted input paths
    pub fn input_paths(&self) -> &[PathBuf] {
        &self.input_paths
    }

    /// Sorted output paths
    pub fn output_paths(&self) -> &[PathBuf] {
        &self.output_paths
    }

    /// Endless shuffled sequence for the training loop.
    ///
    /// One permutation is drawn up front and cycled; the caller decides how
    /// many items make an epoch.
    pub fn training_sequence(&self) -> TrainingSequence<'_> {
        TrainingSequence {
            generator: self,
            order: self.shuffled_order(),
            cursor: 0,
        }
    }

    /// One shuffled pass visiting every sample exactly once
    pub fn evaluation_sequence(&self) -> EvaluationSequence<'_> {
        EvaluationSequence {
            generator: self,
            order: self.shuffled_order(),
            cursor: 0,
        }
    }

    /// Training sequence shuffled with an explicit seed, ignoring `with_seed`
    pub fn training_sequence_seeded(&self, seed: u64) -> TrainingSequence<'_> {
        let mut order: Vec<usize> = (0..self.steps_per_epoch).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        TrainingSequence {
            generator: self,
            order,
            cursor: 0,
        }
    }

    /// Load sample `index` with a leading batch dimension of 1 on both tensors
    pub fn load_pair(&self, index: usize) -> crate::Result<(Tensor, Tensor)> {
        let paths = (self.input_paths.get(index), self.output_paths.get(index));
        let (input_path, output_path) = match paths {
            (Some(input), Some(output)) => (input, output),
            _ => {
                return Err(crate::CrowdError::Config(format!(
                    "sample index {} out of range for {} samples",
                    index, self.steps_per_epoch
                )))
            }
        };

        let input = (self.load_input)(input_path)?;
        let output = (self.load_output)(output_path)?;
        Ok((input.unsqueeze(0)?, output.unsqueeze(0)?))
    }

    fn shuffled_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.steps_per_epoch).collect();

        let pass = self.passes.get();
        self.passes.set(pass + 1);

        if let Some(seed) = self.seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(pass));
            order.shuffle(&mut rng);
        } else {
            let mut rng = rand::thread_rng();
            order.shuffle(&mut rng);
        }

        order
    }
}

impl std::fmt::Debug for PairedSequenceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairedSequenceGenerator")
            .field("steps_per_epoch", &self.steps_per_epoch)
            .field("seed", &self.seed)
            .field("passes", &self.passes.get())
            .finish_non_exhaustive()
    }
}

/// Infinite training sequence; wraps around its permutation
pub struct TrainingSequence<'a> {
    generator: &'a PairedSequenceGenerator,
    order: Vec<usize>,
    cursor: usize,
}

impl TrainingSequence<'_> {
    /// Permutation being cycled
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

impl Iterator for TrainingSequence<'_> {
    type Item = crate::Result<(Tensor, Tensor)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Nothing to cycle over
        if self.order.is_empty() {
            return None;
        }

        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }

        let index = self.order[self.cursor];
        self.cursor += 1;

        Some(self.generator.load_pair(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.order.is_empty() {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}

/// Finite evaluation pass over every sample
pub struct EvaluationSequence<'a> {
    generator: &'a PairedSequenceGenerator,
    order: Vec<usize>,
    cursor: usize,
}

impl EvaluationSequence<'_> {
    /// Visiting order of this pass
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Samples not yet yielded
    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }
}

impl Iterator for EvaluationSequence<'_> {
    type Item = crate::Result<(Tensor, Tensor)>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some(self.generator.load_pair(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EvaluationSequence<'_> {}

impl FusedIterator for EvaluationSequence<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrowdError;
    use candle_core::Device;

    /// Index encoded in names like `in_007.jpg`
    fn index_of(path: &Path) -> crate::Result<u32> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.rsplit('_').next())
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| CrowdError::Data {
                path: path.to_path_buf(),
                message: "no sample index in file name".to_string(),
            })
    }

    /// Inputs load as `[i]`, outputs as `[10 * i]`
    fn indexed_generator(n: usize) -> PairedSequenceGenerator {
        // Reverse order on purpose: construction must sort
        let inputs: Vec<String> = (0..n).rev().map(|i| format!("in_{:03}.jpg", i)).collect();
        let outputs: Vec<String> = (0..n).map(|i| format!("out_{:03}.npy", i)).collect();

        PairedSequenceGenerator::new(
            inputs,
            outputs,
            |path| Ok(Tensor::new(&[index_of(path)? as f32], &Device::Cpu)?),
            |path| Ok(Tensor::new(&[index_of(path)? as f32 * 10.0], &Device::Cpu)?),
        )
        .unwrap()
    }

    /// Sample index of a loaded pair, checking the output matches the input
    fn pair_index(pair: &(Tensor, Tensor)) -> crate::Result<usize> {
        let input = pair.0.flatten_all()?.to_vec1::<f32>()?;
        let output = pair.1.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(output[0], input[0] * 10.0, "input and output are misaligned");
        Ok(input[0] as usize)
    }

    fn is_permutation(indices: &[usize], n: usize) -> bool {
        let mut sorted = indices.to_vec();
        sorted.sort();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_paths_are_sorted() {
        let generator = indexed_generator(3);

        assert_eq!(generator.len(), 3);
        assert_eq!(generator.steps_per_epoch(), 3);
        assert_eq!(generator.input_paths()[0], PathBuf::from("in_000.jpg"));
        assert_eq!(generator.input_paths()[2], PathBuf::from("in_002.jpg"));
        assert_eq!(generator.output_paths()[1], PathBuf::from("out_001.npy"));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = PairedSequenceGenerator::new(
            vec!["a_1.jpg", "a_2.jpg", "a_3.jpg"],
            vec!["b_1.npy", "b_2.npy"],
            |_| Ok(Tensor::zeros(1, candle_core::DType::F32, &Device::Cpu)?),
            |_| Ok(Tensor::zeros(1, candle_core::DType::F32, &Device::Cpu)?),
        );

        match result {
            Err(CrowdError::PairMismatch { inputs, outputs }) => {
                assert_eq!(inputs, 3);
                assert_eq!(outputs, 2);
            }
            other => panic!("expected PairMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_pairs_have_batch_dimension() -> crate::Result<()> {
        let generator = indexed_generator(2);
        let (input, output) = generator.load_pair(1)?;

        assert_eq!(input.dims(), &[1, 1]);
        assert_eq!(output.dims(), &[1, 1]);
        assert_eq!(pair_index(&(input, output))?, 1);

        Ok(())
    }

    #[test]
    fn test_load_pair_out_of_range() {
        let generator = indexed_generator(2);

        assert!(generator.load_pair(1).is_ok());
        assert!(matches!(generator.load_pair(2), Err(CrowdError::Config(_))));
    }

    #[test]
    fn test_explicit_training_seed() {
        let a = indexed_generator(12);
        let b = indexed_generator(12).with_seed(99);

        let first = a.training_sequence_seeded(4).order().to_vec();
        assert!(is_permutation(&first, 12));
        assert_eq!(first, b.training_sequence_seeded(4).order());
        assert_eq!(first, a.training_sequence_seeded(4).order());
    }

    #[test]
    fn test_evaluation_visits_every_sample_once() -> crate::Result<()> {
        let generator = indexed_generator(7);
        let sequence = generator.evaluation_sequence();
        assert_eq!(sequence.len(), 7);

        let mut visited = Vec::new();
        for pair in sequence {
            visited.push(pair_index(&pair?)?);
        }

        assert_eq!(visited.len(), 7);
        assert!(is_permutation(&visited, 7));

        Ok(())
    }

    #[test]
    fn test_evaluation_terminates() -> crate::Result<()> {
        let generator = indexed_generator(3);
        let mut sequence = generator.evaluation_sequence();

        for remaining in (0..3).rev() {
            sequence.next().unwrap()?;
            assert_eq!(sequence.remaining(), remaining);
        }

        assert!(sequence.next().is_none());
        assert!(sequence.next().is_none());

        Ok(())
    }

    #[test]
    fn test_evaluation_reshuffles_per_call() {
        let generator = indexed_generator(20).with_seed(42);

        let first = generator.evaluation_sequence().order().to_vec();
        let second = generator.evaluation_sequence().order().to_vec();

        assert!(is_permutation(&first, 20));
        assert!(is_permutation(&second, 20));
        assert_ne!(first, second);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = indexed_generator(10).with_seed(3);
        let b = indexed_generator(10).with_seed(3);

        assert_eq!(a.evaluation_sequence().order(), b.evaluation_sequence().order());
        assert_eq!(a.training_sequence().order(), b.training_sequence().order());
    }

    #[test]
    fn test_training_wraps_around() -> crate::Result<()> {
        let n = 5;
        let generator = indexed_generator(n);
        let mut sequence = generator.training_sequence();
        let order = sequence.order().to_vec();

        let mut drawn = Vec::new();
        for _ in 0..(3 * n + 2) {
            let pair = sequence.next().expect("training sequence ended")?;
            drawn.push(pair_index(&pair)?);
        }

        for window in drawn.chunks(n).filter(|w| w.len() == n) {
            assert!(is_permutation(window, n));
            assert_eq!(window, order.as_slice());
        }
        assert_eq!(&drawn[3 * n..], &order[..2]);

        Ok(())
    }

    #[test]
    fn test_empty_dataset() {
        let generator = indexed_generator(0);

        assert!(generator.is_empty());
        assert_eq!(generator.evaluation_sequence().count(), 0);
        assert!(generator.training_sequence().next().is_none());
    }

    #[test]
    fn test_loader_failure_surfaces_original_error() {
        let generator = PairedSequenceGenerator::new(
            vec!["in_0.jpg", "in_1.jpg", "in_2.jpg"],
            vec!["out_0.npy", "out_1.npy", "out_2.npy"],
            |path| {
                if path == Path::new("in_1.jpg") {
                    Err(CrowdError::Data {
                        path: path.to_path_buf(),
                        message: "corrupt image".to_string(),
                    })
                } else {
                    Ok(Tensor::zeros(4, candle_core::DType::F32, &Device::Cpu)?)
                }
            },
            |_| Ok(Tensor::zeros(4, candle_core::DType::F32, &Device::Cpu)?),
        )
        .unwrap();

        let result: crate::Result<Vec<_>> = generator.evaluation_sequence().collect();
        match result {
            Err(CrowdError::Data { path, message }) => {
                assert_eq!(path, PathBuf::from("in_1.jpg"));
                assert_eq!(message, "corrupt image");
            }
            other => panic!("expected loader error, got {:?}", other.map(|v| v.len())),
        }

        let failures = generator
            .training_sequence()
            .take(6)
            .filter(|item| item.is_err())
            .count();
        assert_eq!(failures, 2);
    }
}
