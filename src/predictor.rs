// VehicleDetect 🚀 AGPL-3.0 License

//! Checkpoint loading and batch prediction.
//!
//! [`Predictor`] wraps a trained checkpoint and runs inference over input
//! sources. Processing is strictly sequential: one image is loaded,
//! preprocessed, run through the model, and post-processed before the next
//! one is read.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use burn::tensor::backend::Backend;
use image::DynamicImage;

use crate::ActiveBackend;
use crate::checkpoint::load_weights;
use crate::error::{DetectError, Result};
use crate::inference::InferenceConfig;
use crate::metadata::ModelMetadata;
use crate::model::{VehicleDetector, VehicleDetectorConfig};
use crate::postprocessing::postprocess_detect;
use crate::preprocessing::{image_to_tensor, letterbox};
use crate::results::{Results, Speed};
use crate::source::{Source, SourceIterator, SourceMeta};
use crate::utils::image_to_array;

/// A trained detector ready for inference.
pub struct Predictor {
    model: VehicleDetector<ActiveBackend>,
    metadata: ModelMetadata,
    config: InferenceConfig,
    imgsz: (usize, usize),
    device: <ActiveBackend as Backend>::Device,
}

impl Predictor {
    /// Load a predictor from a checkpoint with default inference settings.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the weights or their metadata sidecar
    /// are missing or unreadable.
    pub fn load<P: AsRef<Path>>(weights: P) -> Result<Self> {
        Self::load_with_config(weights, InferenceConfig::default())
    }

    /// Load a predictor from a checkpoint with custom inference settings.
    ///
    /// # Errors
    ///
    /// Returns a config error for invalid settings and a checkpoint error
    /// if the weights or their metadata sidecar are missing or unreadable.
    pub fn load_with_config<P: AsRef<Path>>(weights: P, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device.resolve()?;

        let weights = weights.as_ref();
        if !weights.is_file() {
            return Err(DetectError::CheckpointError(format!(
                "checkpoint file not found: {}",
                weights.display()
            )));
        }

        let metadata = ModelMetadata::for_checkpoint(weights)?;
        let model_config =
            VehicleDetectorConfig::from_arch(&metadata.arch, metadata.num_classes())?;
        let model = load_weights::<ActiveBackend, _>(&model_config, weights, &device)?;

        let imgsz = config.imgsz.unwrap_or(metadata.imgsz);

        Ok(Self {
            model,
            metadata,
            config,
            imgsz,
            device,
        })
    }

    /// Run inference over every image of a source, sequentially.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or any image fails to
    /// decode or infer.
    pub fn predict(&self, source: &Source) -> Result<Vec<Results>> {
        let iter = SourceIterator::new(source)?;

        let mut results = Vec::with_capacity(iter.len());
        for item in iter {
            let (image, meta) = item?;
            results.push(self.predict_image(&image, meta.path)?);
        }
        Ok(results)
    }

    /// Run inference over a source, invoking `on_result` after each image.
    ///
    /// This is the sequential driver behind the CLI: the callback observes
    /// each result (and its source metadata) as soon as it is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or any image fails to
    /// decode or infer.
    pub fn predict_each<F>(&self, source: &Source, mut on_result: F) -> Result<usize>
    where
        F: FnMut(&SourceMeta, &Results) -> Result<()>,
    {
        let iter = SourceIterator::new(source)?;

        let mut count = 0;
        for item in iter {
            let (image, meta) = item?;
            let result = self.predict_image(&image, meta.path.clone())?;
            on_result(&meta, &result)?;
            count += 1;
        }
        Ok(count)
    }

    /// Run inference on a single decoded image.
    ///
    /// # Errors
    ///
    /// Returns an inference error if the forward pass output cannot be
    /// read back.
    pub fn predict_image(&self, image: &DynamicImage, path: String) -> Result<Results> {
        let start_preprocess = Instant::now();
        let preprocess = letterbox(image, self.imgsz);
        let input = image_to_tensor::<ActiveBackend>(&preprocess.image, &self.device);
        let preprocess_time = start_preprocess.elapsed().as_secs_f64() * 1000.0;

        let orig_img = image_to_array(image);

        let start_inference = Instant::now();
        let output = self.model.forward(input);
        let output_shape = output.dims().to_vec();
        let output_data = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| DetectError::InferenceError(format!("failed to read output: {e:?}")))?;
        let inference_time = start_inference.elapsed().as_secs_f64() * 1000.0;

        let start_postprocess = Instant::now();
        let speed = Speed::new(preprocess_time, inference_time, 0.0);
        let mut result = postprocess_detect(
            &output_data,
            &output_shape,
            &preprocess,
            &self.config,
            &self.metadata.names,
            orig_img,
            path,
            speed,
        )?;
        result.speed.postprocess = Some(start_postprocess.elapsed().as_secs_f64() * 1000.0);

        Ok(result)
    }

    /// Class ID to name mapping of the loaded checkpoint.
    #[must_use]
    pub const fn names(&self) -> &HashMap<usize, String> {
        &self.metadata.names
    }

    /// Number of classes of the loaded checkpoint.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.metadata.num_classes()
    }

    /// Effective inference image size (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }

    /// Checkpoint metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Active inference configuration.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("arch", &self.metadata.arch)
            .field("num_classes", &self.metadata.num_classes())
            .field("imgsz", &self.imgsz)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint() {
        let result = Predictor::load("nonexistent.bin");
        assert!(matches!(result, Err(DetectError::CheckpointError(_))));
    }

    #[test]
    fn test_invalid_config_rejected_first() {
        let config = InferenceConfig::new().with_confidence(2.0);
        let result = Predictor::load_with_config("nonexistent.bin", config);
        assert!(matches!(result, Err(DetectError::ConfigError(_))));
    }
}
