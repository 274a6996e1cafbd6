// VehicleDetect 🚀 AGPL-3.0 License

//! Inference configuration.
//!
//! [`InferenceConfig`] controls confidence filtering, Non-Maximum
//! Suppression (NMS), input sizing, and the compute device. It uses a
//! builder pattern for convenient construction.

use crate::device::Device;
use crate::error::{DetectError, Result};
use crate::model::STRIDE;

/// Configuration for detection inference.
///
/// # Example
///
/// ```rust
/// use vehicle_detect::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_confidence(0.5)
///     .with_iou(0.45)
///     .with_max_detections(100);
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Confidence threshold for detections (0.0 to 1.0). Detections with
    /// scores lower than this value are discarded.
    pub confidence_threshold: f32,
    /// Intersection over Union (IoU) threshold for NMS (0.0 to 1.0).
    /// Lower values filter more duplicates.
    pub iou_threshold: f32,
    /// Maximum number of detections to return per image.
    pub max_detections: usize,
    /// Explicit input image size (height, width). If `None`, the checkpoint
    /// metadata determines the input size.
    pub imgsz: Option<(usize, usize)>,
    /// Compute device.
    pub device: Device,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            imgsz: None,
            device: Device::Cpu,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the IoU threshold for NMS.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections to return.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the input image size (square).
    #[must_use]
    pub const fn with_imgsz(mut self, size: usize) -> Self {
        self.imgsz = Some((size, size));
        self
    }

    /// Set the compute device.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Validate thresholds and sizing before running inference.
    ///
    /// # Errors
    ///
    /// Returns a config error for out-of-range thresholds or an image size
    /// that is not a positive multiple of the model stride.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectError::ConfigError(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectError::ConfigError(format!(
                "IoU threshold {} outside [0, 1]",
                self.iou_threshold
            )));
        }
        if self.max_detections == 0 {
            return Err(DetectError::ConfigError(
                "max detections must be positive".to_string(),
            ));
        }
        if let Some((h, w)) = self.imgsz {
            if h == 0 || w == 0 || h % STRIDE != 0 || w % STRIDE != 0 {
                return Err(DetectError::ConfigError(format!(
                    "image size {h}x{w} must be a positive multiple of {STRIDE}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert!((config.confidence_threshold - 0.25).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_confidence(0.5)
            .with_iou(0.6)
            .with_max_detections(100)
            .with_imgsz(640)
            .with_device(Device::Cpu);

        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 100);
        assert_eq!(config.imgsz, Some((640, 640)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(InferenceConfig::new().with_confidence(1.5).validate().is_err());
        assert!(InferenceConfig::new().with_imgsz(100).validate().is_err());
        assert!(InferenceConfig::new().with_max_detections(0).validate().is_err());
    }
}
