// VehicleDetect 🚀 AGPL-3.0 License

//! Compute device selection and backend resolution.

use std::fmt;
use std::str::FromStr;

use crate::error::Result;
#[cfg(not(feature = "wgpu"))]
use crate::error::DetectError;

/// Backend device type for the active burn backend.
#[cfg(feature = "wgpu")]
pub type BackendDevice = burn_wgpu::WgpuDevice;
/// Backend device type for the active burn backend.
#[cfg(not(feature = "wgpu"))]
pub type BackendDevice = burn_ndarray::NdArrayDevice;

/// Compute device for training and inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CPU execution.
    Cpu,
    /// GPU execution. The argument specifies the device index.
    Gpu(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu(i) => write!(f, "cuda:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_lowercase();

        // Bare index ("7") selects that GPU, matching the upstream syntax.
        if let Ok(index) = s.parse::<usize>() {
            return Ok(Self::Gpu(index));
        }

        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            _ => {
                if let Some(rest) = s.strip_prefix("cuda").or_else(|| s.strip_prefix("gpu")) {
                    let index = parse_device_index(rest).unwrap_or(0);
                    Ok(Self::Gpu(index))
                } else {
                    Err(format!("Unknown device: {s}"))
                }
            }
        }
    }
}

/// Helper to parse a device index suffix (e.g. ":0").
fn parse_device_index(s: &str) -> Option<usize> {
    if s.is_empty() {
        return None;
    }
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
}

impl Device {
    /// Resolve this device to a device of the active burn backend.
    ///
    /// # Errors
    ///
    /// Returns a config error when a GPU device is requested but the crate
    /// was built without the `wgpu` feature.
    #[cfg(feature = "wgpu")]
    pub fn resolve(&self) -> Result<BackendDevice> {
        match self {
            Self::Cpu => Ok(burn_wgpu::WgpuDevice::Cpu),
            Self::Gpu(i) => Ok(burn_wgpu::WgpuDevice::DiscreteGpu(*i)),
        }
    }

    /// Resolve this device to a device of the active burn backend.
    ///
    /// # Errors
    ///
    /// Returns a config error when a GPU device is requested but the crate
    /// was built without the `wgpu` feature.
    #[cfg(not(feature = "wgpu"))]
    pub fn resolve(&self) -> Result<BackendDevice> {
        match self {
            Self::Cpu => Ok(burn_ndarray::NdArrayDevice::Cpu),
            Self::Gpu(i) => Err(DetectError::ConfigError(format!(
                "device cuda:{i} requires the 'wgpu' feature; rebuild with --features wgpu or use --device cpu"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("cuda").unwrap(), Device::Gpu(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Gpu(1));
        assert_eq!(Device::from_str("7").unwrap(), Device::Gpu(7));
        assert_eq!(Device::from_str("gpu:2").unwrap(), Device::Gpu(2));
        assert!(Device::from_str("tpu").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(Device::Gpu(7).to_string(), "cuda:7");
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::from_str("cuda:7").unwrap(), Device::Gpu(7));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_gpu_rejected_without_wgpu() {
        assert!(Device::Cpu.resolve().is_ok());
        assert!(Device::Gpu(7).resolve().is_err());
    }
}
