// VehicleDetect 🚀 AGPL-3.0 License

//! Checkpoint weights: resolution, saving, and loading.
//!
//! Weights are burn binary records. A model argument is resolved to either
//! an existing checkpoint file (fine-tune / predict from it) or a known
//! architecture identifier (fresh base weights), mirroring how the workflow
//! accepts both `best.bin` paths and generic `vehicledet-n` handles.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;

use crate::error::{DetectError, Result};
use crate::metadata::ModelMetadata;
use crate::model::{VehicleDetector, VehicleDetectorConfig};

/// Origin of model weights for a training or inference run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    /// Checkpoint file produced by a previous training run.
    Checkpoint(PathBuf),
    /// Architecture identifier for fresh base weights.
    Pretrained(String),
}

impl WeightSource {
    /// Resolve a model argument: an existing file is a checkpoint, anything
    /// else is treated as an architecture identifier.
    #[must_use]
    pub fn resolve(spec: &str) -> Self {
        let path = Path::new(spec);
        if path.is_file() {
            Self::Checkpoint(path.to_path_buf())
        } else {
            Self::Pretrained(spec.to_string())
        }
    }

    /// Build the base model for a training run.
    ///
    /// For a checkpoint source the sidecar metadata determines the
    /// architecture and must agree with the dataset's class count; for a
    /// pretrained source the identifier must name a known architecture.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error on unknown identifiers, missing sidecar
    /// metadata, class-count mismatch, or unreadable weights.
    pub fn init_model<B: Backend>(
        &self,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<(VehicleDetector<B>, VehicleDetectorConfig)> {
        match self {
            Self::Pretrained(arch) => {
                let config = VehicleDetectorConfig::from_arch(arch, num_classes)?;
                Ok((VehicleDetector::new(&config, device), config))
            }
            Self::Checkpoint(path) => {
                let metadata = ModelMetadata::for_checkpoint(path)?;
                if metadata.num_classes() != num_classes {
                    return Err(DetectError::CheckpointError(format!(
                        "checkpoint {} was trained with {} classes, dataset has {}",
                        path.display(),
                        metadata.num_classes(),
                        num_classes
                    )));
                }
                let config = VehicleDetectorConfig::from_arch(&metadata.arch, num_classes)?;
                let model = load_weights::<B, _>(&config, path, device)?;
                Ok((model, config))
            }
        }
    }
}

/// Save model weights to `path` as a burn binary record.
///
/// # Errors
///
/// Returns a checkpoint error if the record cannot be written.
pub fn save_weights<B: Backend, P: AsRef<Path>>(
    model: &VehicleDetector<B>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| {
            DetectError::CheckpointError(format!(
                "failed to save checkpoint {}: {e}",
                path.display()
            ))
        })
}

/// Load model weights from `path`.
///
/// # Errors
///
/// Returns a checkpoint error if the file is missing or the record does not
/// match the model.
pub fn load_weights<B: Backend, P: AsRef<Path>>(
    config: &VehicleDetectorConfig,
    path: P,
    device: &B::Device,
) -> Result<VehicleDetector<B>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DetectError::CheckpointError(format!(
            "checkpoint file not found: {}",
            path.display()
        )));
    }

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    VehicleDetector::new(config, device)
        .load_file(path, &recorder, device)
        .map_err(|e| {
            DetectError::CheckpointError(format!(
                "failed to load checkpoint {}: {e}",
                path.display()
            ))
        })
}
