// VehicleDetect 🚀 AGPL-3.0 License

//! Detector model definition.
//!
//! [`VehicleDetector`] is a small single-scale convolutional detector: a
//! stem convolution, five stride-2 convolution blocks (overall stride 32),
//! and a 1x1 prediction head. For an input of `(H, W)` the head emits a
//! `(H/32, W/32)` grid with `4 + 1 + num_classes` channels per cell:
//! box offsets `(tx, ty, tw, th)`, objectness, and per-class scores, all
//! raw logits (activations are applied by the loss and the decoder).

use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

use crate::error::{DetectError, Result};

/// Detector output stride: one grid cell per 32x32 input pixels.
pub const STRIDE: usize = 32;

/// Number of non-class output channels (4 box parameters + objectness).
pub const BOX_CHANNELS: usize = 5;

/// Configuration for [`VehicleDetector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleDetectorConfig {
    /// Number of object classes.
    pub num_classes: usize,
    /// Stem width; block widths are derived from it.
    pub base_channels: usize,
}

impl VehicleDetectorConfig {
    /// Nano variant.
    #[must_use]
    pub const fn nano(num_classes: usize) -> Self {
        Self {
            num_classes,
            base_channels: 8,
        }
    }

    /// Small variant.
    #[must_use]
    pub const fn small(num_classes: usize) -> Self {
        Self {
            num_classes,
            base_channels: 16,
        }
    }

    /// Build a configuration from an architecture identifier.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error for unknown identifiers.
    pub fn from_arch(arch: &str, num_classes: usize) -> Result<Self> {
        match arch {
            "vehicledet-n" => Ok(Self::nano(num_classes)),
            "vehicledet-s" => Ok(Self::small(num_classes)),
            _ => Err(DetectError::CheckpointError(format!(
                "unknown architecture '{arch}', expected one of: vehicledet-n, vehicledet-s"
            ))),
        }
    }

    /// Architecture identifier for this configuration.
    #[must_use]
    pub const fn arch(&self) -> &'static str {
        match self.base_channels {
            16 => "vehicledet-s",
            _ => "vehicledet-n",
        }
    }
}

/// Single-scale convolutional vehicle detector.
#[derive(Debug, burn::module::Module)]
pub struct VehicleDetector<B: Backend> {
    stem: Conv2d<B>,
    blocks: Vec<Conv2d<B>>,
    head: Conv2d<B>,
    num_classes: usize,
}

impl<B: Backend> VehicleDetector<B> {
    /// Create a detector with freshly initialized weights.
    pub fn new(config: &VehicleDetectorConfig, device: &B::Device) -> Self {
        let c = config.base_channels.max(1);
        // Width doubles on the first three downsamples, then stays flat.
        let widths = [c, 2 * c, 4 * c, 8 * c, 8 * c, 8 * c];

        let stem = Conv2dConfig::new([3, widths[0]], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let mut blocks = Vec::with_capacity(5);
        for i in 0..5 {
            blocks.push(
                Conv2dConfig::new([widths[i], widths[i + 1]], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
            );
        }

        let head = Conv2dConfig::new([widths[5], BOX_CHANNELS + config.num_classes], [1, 1])
            .init(device);

        Self {
            stem,
            blocks,
            head,
            num_classes: config.num_classes,
        }
    }

    /// Forward pass.
    ///
    /// Input: `[batch, 3, H, W]` normalized to `[0, 1]`, with `H` and `W`
    /// multiples of [`STRIDE`]. Output: `[batch, 5 + num_classes, H/32, W/32]`
    /// raw logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = relu(self.stem.forward(input));
        for block in &self.blocks {
            x = relu(block.forward(x));
        }
        self.head.forward(x)
    }

    /// Number of object classes.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Number of output channels per grid cell.
    #[must_use]
    pub const fn out_channels(&self) -> usize {
        BOX_CHANNELS + self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray<f32>;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let config = VehicleDetectorConfig::nano(4);
        let model = VehicleDetector::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 9, 2, 2]);
        assert_eq!(model.out_channels(), 9);
    }

    #[test]
    fn test_arch_roundtrip() {
        let config = VehicleDetectorConfig::from_arch("vehicledet-s", 2).unwrap();
        assert_eq!(config.base_channels, 16);
        assert_eq!(config.arch(), "vehicledet-s");

        assert!(VehicleDetectorConfig::from_arch("vehicledet-x", 2).is_err());
    }
}
