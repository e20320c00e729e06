/// Density-map training on ShanghaiTech-style data with per-epoch count scoring
///
/// Expects images already converted to CHW float arrays (`.npy`) next to the
/// ground-truth density maps:
///
/// ```text
/// <dataset_root>/train_data/images_npy/IMG_1.npy   [3, H, W]
/// <dataset_root>/train_data/ground_truth/GT_IMG_1.npy   [H, W]
/// ```
///
/// Usage: `cargo run --example train_density -- [config.json]`
use candle_core::{DType, Device, Tensor};
use candle_nn::{conv2d, AdamW, Conv2d, Conv2dConfig, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use crowd_density::data::{npy_loader, PairedSequenceGenerator};
use crowd_density::training::{EpochCallback, EvaluationCallback, TrainStep, Trainer};
use crowd_density::{DatasetConfig, PipelineConfig};

/// Two-layer fully convolutional density regressor
struct DensityNet {
    conv1: Conv2d,
    conv2: Conv2d,
    optimizer: AdamW,
}

impl DensityNet {
    fn new(learning_rate: f64, device: &Device) -> candle_core::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let same = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv1 = conv2d(3, 16, 3, same, vb.pp("conv1"))?;
        let conv2 = conv2d(16, 1, 1, Conv2dConfig::default(), vb.pp("conv2"))?;

        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        Ok(Self {
            conv1,
            conv2,
            optimizer,
        })
    }
}

impl Module for DensityNet {
    /// [B, 3, H, W] -> [B, H, W]
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let hidden = self.conv1.forward(xs)?.relu()?;
        self.conv2.forward(&hidden)?.squeeze(1)
    }
}

impl TrainStep for DensityNet {
    fn train_step(&mut self, input: &Tensor, target: &Tensor) -> crowd_density::Result<f32> {
        let prediction = self.forward(input)?;
        let loss = candle_nn::loss::mse(&prediction, target)?;
        self.optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig {
            dataset: DatasetConfig {
                input_dir: "images_npy".to_string(),
                input_extension: "npy".to_string(),
                ..DatasetConfig::default()
            },
            ..PipelineConfig::default()
        },
    };
    config.validate()?;
    log::info!("Configuration: {:#?}", config);

    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else {
        Device::Cpu
    };
    log::info!("Using device: {:?}", device);

    let (train_inputs, train_outputs) = config.dataset.split_paths("train")?;
    let (test_inputs, test_outputs) = config.dataset.split_paths("test")?;

    let train_gen = PairedSequenceGenerator::new(
        train_inputs,
        train_outputs,
        npy_loader(device.clone()),
        npy_loader(device.clone()),
    )?;
    let mut test_gen = PairedSequenceGenerator::new(
        test_inputs,
        test_outputs,
        npy_loader(device.clone()),
        npy_loader(device.clone()),
    )?;
    // The trainer applies the seed to the training order itself
    if let Some(seed) = config.training.seed {
        test_gen = test_gen.with_seed(seed.wrapping_add(1));
    }

    log::info!("Train samples: {}", train_gen.len());
    log::info!("Test samples: {}", test_gen.len());

    let mut model = DensityNet::new(1e-4, &device)?;
    let mut score = EvaluationCallback::new(&test_gen, &config.dataset.dataset_root);

    let trainer = Trainer::new(config.training.clone());
    let losses = {
        let mut callbacks: [&mut dyn EpochCallback<DensityNet>; 1] = [&mut score];
        trainer.fit(&mut model, &train_gen, &mut callbacks)?
    };

    if let Some(best) = score
        .history()
        .iter()
        .min_by(|a, b| a.metrics.mae.total_cmp(&b.metrics.mae))
    {
        log::info!("Best epoch: {}", best);
    }
    log::info!("Final training loss: {:.4}", losses.last().copied().unwrap_or(f32::NAN));

    Ok(())
}
