// VehicleDetect 🚀 AGPL-3.0 License

//! Checkpoint metadata.
//!
//! Burn weight records carry no custom metadata, so training writes a
//! `metadata.yaml` sidecar next to the weights with everything needed to
//! rebuild the model for inference: architecture, input size, and class
//! names. The file uses the same line-oriented YAML subset as the dataset
//! manifest.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{DetectError, Result};
use crate::manifest::parse_names;

/// Name of the sidecar file written next to checkpoint weights.
pub const METADATA_FILE: &str = "metadata.yaml";

/// Metadata describing a trained checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Architecture identifier (e.g. "vehicledet-n").
    pub arch: String,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            arch: "vehicledet-n".to_string(),
            imgsz: (640, 640),
            names: HashMap::new(),
        }
    }
}

impl ModelMetadata {
    /// Read metadata from a sidecar file.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the file is missing or unreadable, and
    /// a metadata error if the content is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DetectError::CheckpointError(format!(
                "failed to read checkpoint metadata {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse metadata from its YAML representation.
    ///
    /// # Errors
    ///
    /// Returns a metadata error if no class names are present or a field
    /// fails to parse.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self> {
        let mut metadata = Self::default();

        for line in yaml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim().trim_matches('\'').trim_matches('"');
                match key {
                    "arch" => metadata.arch = value.to_string(),
                    "imgsz" => metadata.imgsz = parse_imgsz(value)?,
                    _ => {}
                }
            }
        }

        metadata.names = parse_names(yaml_str)?;
        if metadata.names.is_empty() {
            return Err(DetectError::MetadataError(
                "checkpoint metadata declares no class names".to_string(),
            ));
        }

        Ok(metadata)
    }

    /// Serialize to the YAML representation written next to the weights.
    #[must_use]
    pub fn to_yaml_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("arch: {}\n", self.arch));
        out.push_str(&format!("imgsz: [{}, {}]\n", self.imgsz.0, self.imgsz.1));
        out.push_str("names:\n");

        let mut ids: Vec<usize> = self.names.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            out.push_str(&format!("  {id}: {}\n", self.names[&id]));
        }
        out
    }

    /// Write the sidecar file into `dir`.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the file cannot be written.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(METADATA_FILE);
        std::fs::write(&path, self.to_yaml_string()).map_err(|e| {
            DetectError::CheckpointError(format!(
                "failed to write checkpoint metadata {}: {e}",
                path.display()
            ))
        })
    }

    /// Locate and read the sidecar for a checkpoint weights path.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the sidecar is missing.
    pub fn for_checkpoint<P: AsRef<Path>>(weights: P) -> Result<Self> {
        let weights = weights.as_ref();
        let dir = weights.parent().unwrap_or_else(|| Path::new("."));
        Self::from_file(dir.join(METADATA_FILE))
    }

    /// Get the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }
}

/// Parse an `imgsz` value: `[640, 640]` or a bare `640`.
fn parse_imgsz(value: &str) -> Result<(usize, usize)> {
    if let Some(body) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        let sizes: Vec<usize> = body
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        if sizes.len() >= 2 {
            return Ok((sizes[0], sizes[1]));
        }
        return Err(DetectError::MetadataError(format!(
            "invalid imgsz value: {value}"
        )));
    }

    value.parse::<usize>().map(|s| (s, s)).map_err(|_| {
        DetectError::MetadataError(format!("invalid imgsz value: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_roundtrip() {
        let mut names = HashMap::new();
        names.insert(0, "car".to_string());
        names.insert(1, "truck".to_string());

        let metadata = ModelMetadata {
            arch: "vehicledet-s".to_string(),
            imgsz: (640, 640),
            names,
        };

        let parsed = ModelMetadata::from_yaml_str(&metadata.to_yaml_string()).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_parse_scalar_imgsz() {
        let yaml = "arch: vehicledet-n\nimgsz: 320\nnames:\n  0: car\n";
        let metadata = ModelMetadata::from_yaml_str(yaml).unwrap();
        assert_eq!(metadata.imgsz, (320, 320));
    }

    #[test]
    fn test_missing_names_rejected() {
        let yaml = "arch: vehicledet-n\nimgsz: [640, 640]\n";
        assert!(ModelMetadata::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_missing_sidecar() {
        let result = ModelMetadata::for_checkpoint("nonexistent/weights/best.bin");
        assert!(matches!(result, Err(DetectError::CheckpointError(_))));
    }
}
