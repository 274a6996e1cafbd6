// VehicleDetect 🚀 AGPL-3.0 License

//! Training loop for the vehicle detector.
//!
//! One call to [`run_train`] runs a full training job synchronously: load
//! the manifest and splits, build the base model from a weight source, run
//! the epoch loop with Adam, and persist `last`/`best` checkpoints plus
//! metadata into a fresh `runs/detect/train[N]` directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::ActiveBackend;
use crate::annotate::find_next_run_dir;
use crate::checkpoint::{WeightSource, save_weights};
use crate::dataset::{DetectBatch, Sample, collate, load_split};
use crate::device::Device;
use crate::error::{DetectError, Result};
use crate::manifest::DatasetManifest;
use crate::metadata::ModelMetadata;
use crate::model::{BOX_CHANNELS, STRIDE};

type TrainingBackend = Autodiff<ActiveBackend>;

/// Configuration for one training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Path to the dataset manifest.
    pub data: PathBuf,
    /// Weight source: checkpoint path or architecture identifier.
    pub model: String,
    /// Number of epochs.
    pub epochs: usize,
    /// Square training image size.
    pub imgsz: usize,
    /// Batch size.
    pub batch_size: usize,
    /// Learning rate.
    pub lr: f64,
    /// Compute device.
    pub device: Device,
    /// Loss weight for box regression.
    pub lambda_box: f32,
    /// Loss weight for classification.
    pub lambda_cls: f32,
    /// Parent directory for run directories.
    pub project: String,
    /// Run name prefix inside the project directory.
    pub name: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("dataset/vehicles_dataset.yaml"),
            model: "vehicledet-n".to_string(),
            epochs: 20,
            imgsz: 640,
            batch_size: 16,
            lr: 1e-3,
            device: Device::Cpu,
            lambda_box: 5.0,
            lambda_cls: 1.0,
            project: "runs/detect".to_string(),
            name: "train".to_string(),
        }
    }
}

impl TrainConfig {
    /// Validate hyperparameters before any work starts.
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(DetectError::ConfigError(
                "epoch count must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(DetectError::ConfigError(
                "batch size must be positive".to_string(),
            ));
        }
        if self.imgsz == 0 || self.imgsz % STRIDE != 0 {
            return Err(DetectError::ConfigError(format!(
                "image size {} must be a positive multiple of {STRIDE}",
                self.imgsz
            )));
        }
        if self.lr <= 0.0 {
            return Err(DetectError::ConfigError(format!(
                "learning rate {} must be positive",
                self.lr
            )));
        }
        Ok(())
    }
}

/// Outcome of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Run directory created for this job.
    pub run_dir: PathBuf,
    /// Path of the best checkpoint.
    pub best_weights: PathBuf,
    /// Path of the last checkpoint.
    pub last_weights: PathBuf,
    /// Epochs completed.
    pub epochs: usize,
    /// Best tracked loss (validation loss when a val split exists).
    pub best_loss: f32,
}

/// Run one training job to completion.
///
/// # Errors
///
/// Propagates the first failure: invalid configuration, missing manifest or
/// split, unreadable image, malformed label, or checkpoint write error.
pub fn run_train(config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;
    let device = config.device.resolve()?;

    let manifest = DatasetManifest::from_file(&config.data)?;
    let num_classes = manifest.num_classes();

    let train_samples = load_split(manifest.train_dir()?, num_classes)?;
    if train_samples.is_empty() {
        return Err(DetectError::DatasetError(format!(
            "no images found in {}",
            manifest.train_dir()?.display()
        )));
    }
    let val_samples = match &manifest.val {
        Some(dir) => Some(load_split(dir, num_classes)?),
        None => None,
    };

    let source = WeightSource::resolve(&config.model);
    let (mut model, model_config) = source.init_model::<TrainingBackend>(num_classes, &device)?;

    // The run directory is only created once all inputs have resolved.
    let run_dir = PathBuf::from(find_next_run_dir(&config.project, &config.name));
    let weights_dir = run_dir.join("weights");
    std::fs::create_dir_all(&weights_dir)?;

    let metadata = ModelMetadata {
        arch: model_config.arch().to_string(),
        imgsz: (config.imgsz, config.imgsz),
        names: manifest.names.clone(),
    };
    metadata.write_to_dir(&weights_dir)?;

    let last_weights = weights_dir.join("last.bin");
    let best_weights = weights_dir.join("best.bin");
    let mut results_log = ResultsLog::create(&run_dir)?;

    let mut optim = AdamConfig::new().init();
    let mut best_loss = f32::INFINITY;

    println!(
        "training {} on {} ({} train / {} val images, {} classes)",
        model_config.arch(),
        config.data.display(),
        train_samples.len(),
        val_samples.as_ref().map_or(0, Vec::len),
        num_classes
    );

    for epoch in 0..config.epochs {
        let mut losses = Vec::new();
        for chunk in train_samples.chunks(config.batch_size) {
            let batch = collate::<TrainingBackend>(chunk, config.imgsz, &device)?;
            let output = model.forward(batch.images.clone());
            let loss = detection_loss(
                output,
                &batch,
                num_classes,
                config.lambda_box,
                config.lambda_cls,
            );

            let loss_value = scalar_value(loss.clone().detach());
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.lr, model, grads);

            losses.push(loss_value);
        }
        let train_loss = mean(&losses);

        let val_loss = match &val_samples {
            Some(samples) if !samples.is_empty() => {
                Some(evaluate(&model.valid(), samples, config, num_classes, &device)?)
            }
            _ => None,
        };

        match val_loss {
            Some(val) => println!(
                "epoch {}/{}: train loss {train_loss:.4}, val loss {val:.4}",
                epoch + 1,
                config.epochs
            ),
            None => println!(
                "epoch {}/{}: train loss {train_loss:.4}",
                epoch + 1,
                config.epochs
            ),
        }
        results_log.append(epoch + 1, train_loss, val_loss)?;

        save_weights(&model, &last_weights)?;

        // Best checkpoint tracks validation loss when available.
        let tracked = val_loss.unwrap_or(train_loss);
        if tracked < best_loss {
            best_loss = tracked;
            save_weights(&model, &best_weights)?;
        }
    }

    Ok(TrainReport {
        run_dir,
        best_weights,
        last_weights,
        epochs: config.epochs,
        best_loss,
    })
}

/// Compute the validation loss of the current model.
fn evaluate(
    model: &crate::model::VehicleDetector<ActiveBackend>,
    samples: &[Sample],
    config: &TrainConfig,
    num_classes: usize,
    device: &<ActiveBackend as Backend>::Device,
) -> Result<f32> {
    let mut losses = Vec::new();
    for chunk in samples.chunks(config.batch_size) {
        let batch = collate::<ActiveBackend>(chunk, config.imgsz, device)?;
        let output = model.forward(batch.images.clone());
        let loss = detection_loss(
            output,
            &batch,
            num_classes,
            config.lambda_box,
            config.lambda_cls,
        );
        losses.push(scalar_value(loss));
    }
    Ok(mean(&losses))
}

/// Detection loss over one batch: objectness BCE over the whole grid, L1 on
/// matched box parameters, and class BCE at matched cells.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn detection_loss<B: Backend>(
    output: Tensor<B, 4>,
    batch: &DetectBatch<B>,
    num_classes: usize,
    lambda_box: f32,
    lambda_cls: f32,
) -> Tensor<B, 1> {
    let [n, channels, gh, gw] = output.dims();
    let device = output.device();
    let preds = sigmoid(output);

    let targets = build_grid_targets(&batch.boxes, &batch.classes, num_classes, n, gh, gw);

    let obj_pred = preds
        .clone()
        .slice([0..n, 4..BOX_CHANNELS, 0..gh, 0..gw]);
    let obj_target = Tensor::<B, 4>::from_data(
        TensorData::new(targets.obj, [n, 1, gh, gw]),
        &device,
    );
    let obj_loss = bce(obj_pred, obj_target).sum().div_scalar((n * gh * gw) as f32);

    let box_pred = preds.clone().slice([0..n, 0..4, 0..gh, 0..gw]);
    let box_target = Tensor::<B, 4>::from_data(
        TensorData::new(targets.boxes, [n, 4, gh, gw]),
        &device,
    );
    let box_mask = Tensor::<B, 4>::from_data(
        TensorData::new(targets.box_mask, [n, 4, gh, gw]),
        &device,
    );
    let box_loss = if targets.matched > 0 {
        ((box_pred - box_target).abs() * box_mask)
            .sum()
            .div_scalar(targets.matched as f32)
    } else {
        zero_scalar(&device)
    };

    let cls_loss = if num_classes > 0 && targets.matched > 0 {
        let cls_pred = preds.slice([0..n, BOX_CHANNELS..channels, 0..gh, 0..gw]);
        let cls_target = Tensor::<B, 4>::from_data(
            TensorData::new(targets.classes, [n, num_classes, gh, gw]),
            &device,
        );
        let cls_mask = Tensor::<B, 4>::from_data(
            TensorData::new(targets.class_mask, [n, num_classes, gh, gw]),
            &device,
        );
        (bce(cls_pred, cls_target) * cls_mask)
            .sum()
            .div_scalar((targets.matched * num_classes) as f32)
    } else {
        zero_scalar(&device)
    };

    obj_loss + box_loss.mul_scalar(lambda_box) + cls_loss.mul_scalar(lambda_cls)
}

/// Elementwise binary cross-entropy on probabilities.
fn bce<B: Backend>(pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 4> {
    let eps = 1e-6;
    let pred = pred.clamp(eps, 1.0 - eps);
    let ones = Tensor::<B, 4>::ones(pred.dims(), &pred.device());
    let target_inv = ones.clone() - target.clone();
    -(target * pred.clone().log() + target_inv * (ones - pred).log())
}

fn zero_scalar<B: Backend>(device: &B::Device) -> Tensor<B, 1> {
    Tensor::<B, 1>::from_data(TensorData::new(vec![0.0f32], [1]), device)
}

/// Grid-shaped training targets built on the CPU.
struct GridTargets {
    obj: Vec<f32>,
    boxes: Vec<f32>,
    box_mask: Vec<f32>,
    classes: Vec<f32>,
    class_mask: Vec<f32>,
    /// Number of grid cells carrying a ground-truth box.
    matched: usize,
}

/// Assign each ground-truth box to the grid cell containing its center.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_grid_targets(
    boxes: &[Vec<[f32; 4]>],
    classes: &[Vec<usize>],
    num_classes: usize,
    n: usize,
    gh: usize,
    gw: usize,
) -> GridTargets {
    let input_w = (gw * STRIDE) as f32;
    let input_h = (gh * STRIDE) as f32;

    let mut obj = vec![0.0f32; n * gh * gw];
    let mut box_t = vec![0.0f32; n * 4 * gh * gw];
    let mut box_mask = vec![0.0f32; n * 4 * gh * gw];
    let mut cls_t = vec![0.0f32; n * num_classes * gh * gw];
    let mut cls_mask = vec![0.0f32; n * num_classes * gh * gw];
    let mut matched = 0usize;

    for b in 0..n {
        for (bbox, &class_id) in boxes[b].iter().zip(&classes[b]) {
            let [cx, cy, w, h] = *bbox;
            let gx = ((cx / STRIDE as f32) as usize).min(gw - 1);
            let gy = ((cy / STRIDE as f32) as usize).min(gh - 1);

            let cell = (b * gh + gy) * gw + gx;
            if obj[cell] < 0.5 {
                matched += 1;
            }
            obj[cell] = 1.0;

            // Channel-major offsets within the sample.
            let plane = gh * gw;
            let at = |c: usize| ((b * 4 + c) * gh + gy) * gw + gx;
            box_t[at(0)] = (cx / STRIDE as f32 - gx as f32).clamp(0.0, 1.0);
            box_t[at(1)] = (cy / STRIDE as f32 - gy as f32).clamp(0.0, 1.0);
            box_t[at(2)] = (w / input_w).clamp(0.0, 1.0);
            box_t[at(3)] = (h / input_h).clamp(0.0, 1.0);
            for c in 0..4 {
                box_mask[at(c)] = 1.0;
            }

            for c in 0..num_classes {
                let idx = (b * num_classes + c) * plane + gy * gw + gx;
                cls_t[idx] = if c == class_id { 1.0 } else { 0.0 };
                cls_mask[idx] = 1.0;
            }
        }
    }

    GridTargets {
        obj,
        boxes: box_t,
        box_mask,
        classes: cls_t,
        class_mask: cls_mask,
        matched,
    }
}

/// Extract a scalar from a rank-1 tensor.
fn scalar_value<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(0.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Per-epoch loss log appended to `results.csv` in the run directory.
struct ResultsLog {
    file: std::fs::File,
}

impl ResultsLog {
    fn create(run_dir: &Path) -> Result<Self> {
        let mut file = std::fs::File::create(run_dir.join("results.csv"))?;
        writeln!(file, "epoch,train_loss,val_loss")?;
        Ok(Self { file })
    }

    fn append(&mut self, epoch: usize, train_loss: f32, val_loss: Option<f32>) -> Result<()> {
        match val_loss {
            Some(val) => writeln!(self.file, "{epoch},{train_loss:.6},{val:.6}")?,
            None => writeln!(self.file, "{epoch},{train_loss:.6},")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray<f32>;

    #[test]
    fn test_config_validation() {
        let config = TrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.epochs, 20);
        assert_eq!(config.imgsz, 640);
        assert_eq!(config.batch_size, 16);

        let bad = TrainConfig {
            imgsz: 100,
            ..TrainConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = TrainConfig {
            epochs: 0,
            ..TrainConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_grid_targets_single_box() {
        // One 32x32 box centered at (16, 16) on a 64x64 input: cell (0, 0).
        let boxes = vec![vec![[16.0, 16.0, 32.0, 32.0]]];
        let classes = vec![vec![1usize]];
        let targets = build_grid_targets(&boxes, &classes, 2, 1, 2, 2);

        assert_eq!(targets.matched, 1);
        assert!((targets.obj[0] - 1.0).abs() < f32::EPSILON);
        assert!(targets.obj[1].abs() < f32::EPSILON);
        // tx = ty = 0.5, tw = th = 0.5.
        assert!((targets.boxes[0] - 0.5).abs() < f32::EPSILON);
        assert!((targets.boxes[2 * 2 * 2] - 0.5).abs() < f32::EPSILON);
        // One-hot class 1 at cell (0, 0).
        assert!(targets.classes[0].abs() < f32::EPSILON);
        assert!((targets.classes[4] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_grid_targets_empty_batch() {
        let boxes = vec![vec![]];
        let classes = vec![vec![]];
        let targets = build_grid_targets(&boxes, &classes, 2, 1, 2, 2);
        assert_eq!(targets.matched, 0);
        assert!(targets.obj.iter().all(|v| v.abs() < f32::EPSILON));
    }

    #[test]
    fn test_detection_loss_finite() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 4>::zeros([1, 7, 2, 2], &device);
        let batch = DetectBatch {
            images: Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device),
            boxes: vec![vec![[16.0, 16.0, 32.0, 32.0]]],
            classes: vec![vec![0usize]],
        };

        let loss = detection_loss(output, &batch, 2, 5.0, 1.0);
        let value = scalar_value(loss);
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn test_detection_loss_no_boxes() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 4>::zeros([1, 7, 2, 2], &device);
        let batch = DetectBatch {
            images: Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device),
            boxes: vec![vec![]],
            classes: vec![vec![]],
        };

        let loss = detection_loss(output, &batch, 2, 5.0, 1.0);
        assert!(scalar_value(loss).is_finite());
    }
}
