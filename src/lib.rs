// VehicleDetect 🚀 AGPL-3.0 License

//! # Vehicle Detect
//!
//! Vehicle detection in Rust: fine-tune a small convolutional detector on a
//! custom dataset and run batch inference with the trained weights.
//!
//! The workflow mirrors the usual detection-framework shape: a `train`
//! invocation reads a YAML dataset manifest and writes checkpoints under
//! `runs/detect/train/weights/`, and a `predict` invocation loads a
//! checkpoint and writes annotated images under `runs/detect/predict/`.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use vehicle_detect::{InferenceConfig, Predictor, Source};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InferenceConfig::new().with_confidence(0.5);
//!     let predictor = Predictor::load_with_config(
//!         "runs/detect/train/weights/best.bin",
//!         config,
//!     )?;
//!
//!     let results = predictor.predict(&Source::from("dataset/test/images"))?;
//!     for result in &results {
//!         println!("{}: {}", result.path, result.verbose());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Training from the library:
//!
//! ```no_run
//! use vehicle_detect::train::{TrainConfig, run_train};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = run_train(&TrainConfig::default())?;
//! println!("best weights at {}", report.best_weights.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Fine-tune on the vehicles dataset (epochs=20, imgsz=640, batch=16)
//! vehicle-detect train
//!
//! # Train with explicit options
//! vehicle-detect train --data dataset/vehicles_dataset.yaml --epochs 20 --device cpu
//!
//! # Predict over a folder of test images with the trained weights
//! vehicle-detect predict
//!
//! # Predict with explicit options
//! vehicle-detect predict --model runs/detect/train/weights/best.bin \
//!     --source dataset/test/images --conf 0.5
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`train`] | Training loop ([`train::TrainConfig`], [`train::run_train`]) |
//! | [`predictor`] | Checkpoint loading and inference ([`Predictor`]) |
//! | [`inference`] | [`InferenceConfig`] for inference settings |
//! | [`manifest`] | Dataset manifest parsing |
//! | [`dataset`] | Sample loading and batch collation |
//! | [`model`] | The detector network ([`VehicleDetector`]) |
//! | [`checkpoint`] | Weight resolution, saving, and loading |
//! | [`results`] | Output types ([`Results`], [`Boxes`], [`Speed`]) |
//! | [`source`] | Input source handling ([`Source`], [`SourceIterator`]) |
//! | [`error`] | Error types ([`DetectError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `wgpu` | GPU training/inference via the wgpu backend |

// Modules
pub mod annotate;
pub mod checkpoint;
pub mod cli;
pub mod dataset;
pub mod device;
pub mod error;
pub mod inference;
pub mod io;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod postprocessing;
pub mod predictor;
pub mod preprocessing;
pub mod results;
pub mod source;
pub mod train;
pub mod utils;

/// Active tensor backend: wgpu when the `wgpu` feature is enabled, ndarray
/// (CPU) otherwise.
#[cfg(feature = "wgpu")]
pub type ActiveBackend = burn_wgpu::Wgpu<f32>;
/// Active tensor backend: wgpu when the `wgpu` feature is enabled, ndarray
/// (CPU) otherwise.
#[cfg(not(feature = "wgpu"))]
pub type ActiveBackend = burn_ndarray::NdArray<f32>;

// Re-export main types for convenience
pub use checkpoint::WeightSource;
pub use device::Device;
pub use error::{DetectError, Result};
pub use inference::InferenceConfig;
pub use manifest::DatasetManifest;
pub use metadata::ModelMetadata;
pub use model::{VehicleDetector, VehicleDetectorConfig};
pub use predictor::Predictor;
pub use results::{Boxes, Results, Speed};
pub use source::{Source, SourceIterator, SourceMeta};
pub use train::{TrainConfig, TrainReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // Version should be semver format like "0.1.0"
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "vehicle-detect");
    }
}
