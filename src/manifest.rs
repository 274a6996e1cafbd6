// VehicleDetect 🚀 AGPL-3.0 License

//! Dataset manifest parsing.
//!
//! A manifest is a small YAML file describing where a dataset lives and what
//! its classes are:
//!
//! ```yaml
//! path: dataset
//! train: train/images
//! val: valid/images
//! names:
//!   0: car
//!   1: truck
//! ```
//!
//! The format is simple enough that it is parsed with a line-oriented reader
//! rather than a YAML dependency. Both the block form above and the inline
//! form `names: {0: car, 1: truck}` are accepted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{DetectError, Result};

/// Parsed dataset manifest with split directories resolved to the manifest
/// location.
#[derive(Debug, Clone)]
pub struct DatasetManifest {
    /// Resolved dataset root directory.
    pub root: PathBuf,
    /// Resolved training images directory, if declared.
    pub train: Option<PathBuf>,
    /// Resolved validation images directory, if declared.
    pub val: Option<PathBuf>,
    /// Resolved test images directory, if declared.
    pub test: Option<PathBuf>,
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl DatasetManifest {
    /// Load and parse a manifest file.
    ///
    /// Split paths are resolved relative to the manifest's parent directory
    /// (via the optional `path:` root entry).
    ///
    /// # Errors
    ///
    /// Returns a dataset error if the file is missing or unreadable, and a
    /// metadata error if the content is malformed or declares no classes.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DetectError::DatasetError(format!("failed to read manifest {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&content, base)
    }

    /// Parse manifest content, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns a metadata error if the content declares no classes.
    pub fn from_yaml_str(yaml_str: &str, base: &Path) -> Result<Self> {
        let mut root_entry: Option<String> = None;
        let mut train_entry: Option<String> = None;
        let mut val_entry: Option<String> = None;
        let mut test_entry: Option<String> = None;

        for line in yaml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim().trim_matches('\'').trim_matches('"');
                if value.is_empty() {
                    continue;
                }
                match key {
                    "path" => root_entry = Some(value.to_string()),
                    "train" => train_entry = Some(value.to_string()),
                    "val" => val_entry = Some(value.to_string()),
                    "test" => test_entry = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        let names = parse_names(yaml_str)?;
        if names.is_empty() {
            return Err(DetectError::MetadataError(
                "manifest declares no class names".to_string(),
            ));
        }

        let root = root_entry.map_or_else(|| base.to_path_buf(), |p| base.join(p));
        let resolve = |entry: Option<String>| entry.map(|p| root.join(p));

        Ok(Self {
            train: resolve(train_entry),
            val: resolve(val_entry),
            test: resolve(test_entry),
            root,
            names,
        })
    }

    /// Get the training images directory.
    ///
    /// # Errors
    ///
    /// Returns a dataset error if the manifest declares no `train:` entry.
    pub fn train_dir(&self) -> Result<&Path> {
        self.train.as_deref().ok_or_else(|| {
            DetectError::DatasetError("manifest declares no 'train' split".to_string())
        })
    }

    /// Get the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Get a class name by ID.
    #[must_use]
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }
}

/// Parse the `names` mapping from block or inline form.
pub(crate) fn parse_names(yaml_str: &str) -> Result<HashMap<usize, String>> {
    let mut names = HashMap::new();

    // Inline form: `names: {0: car, 1: truck}`.
    if let Some(start) = yaml_str.find("names:") {
        let after_names = yaml_str[start + 6..].trim_start();
        if after_names.starts_with('{') {
            if let Some(end) = after_names.find('}') {
                return parse_inline_names(&after_names[1..end]);
            }
            return Err(DetectError::MetadataError(
                "unterminated inline names mapping".to_string(),
            ));
        }
    }

    // Block form: entries indented under `names:`.
    let mut in_names_block = false;
    for line in yaml_str.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("names:") {
            in_names_block = true;
            continue;
        }

        if in_names_block {
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            // The block ends at the first non-numeric key.
            if !trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                break;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                if let Ok(class_id) = key.trim().parse::<usize>() {
                    let class_name = value.trim().trim_matches('\'').trim_matches('"');
                    names.insert(class_id, class_name.to_string());
                }
            }
        }
    }

    Ok(names)
}

/// Parse an inline mapping body like `0: 'car', 1: 'truck'`.
fn parse_inline_names(body: &str) -> Result<HashMap<usize, String>> {
    let mut names = HashMap::new();

    for entry in body.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some((key, value)) = entry.split_once(':') {
            let value = value.trim().trim_matches('\'').trim_matches('"');
            if let Ok(class_id) = key.trim().parse::<usize>() {
                names.insert(class_id, value.to_string());
            }
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MANIFEST: &str = r"
# vehicles dataset
path: dataset
train: train/images
val: valid/images
test: test/images
names:
  0: car
  1: truck
  2: bus
  3: motorcycle
";

    #[test]
    fn test_parse_manifest() {
        let manifest = DatasetManifest::from_yaml_str(SAMPLE_MANIFEST, Path::new("/data")).unwrap();

        assert_eq!(manifest.root, Path::new("/data/dataset"));
        assert_eq!(
            manifest.train.as_deref(),
            Some(Path::new("/data/dataset/train/images"))
        );
        assert_eq!(
            manifest.val.as_deref(),
            Some(Path::new("/data/dataset/valid/images"))
        );
        assert_eq!(manifest.num_classes(), 4);
        assert_eq!(manifest.class_name(0), Some("car"));
        assert_eq!(manifest.class_name(3), Some("motorcycle"));
    }

    #[test]
    fn test_parse_inline_names() {
        let yaml = "train: images\nnames: {0: 'car', 1: 'truck'}";
        let manifest = DatasetManifest::from_yaml_str(yaml, Path::new(".")).unwrap();
        assert_eq!(manifest.num_classes(), 2);
        assert_eq!(manifest.class_name(1), Some("truck"));
    }

    #[test]
    fn test_empty_names_rejected() {
        let yaml = "train: images\n";
        let result = DatasetManifest::from_yaml_str(yaml, Path::new("."));
        assert!(matches!(result, Err(DetectError::MetadataError(_))));
    }

    #[test]
    fn test_missing_train_split() {
        let yaml = "val: valid/images\nnames:\n  0: car\n";
        let manifest = DatasetManifest::from_yaml_str(yaml, Path::new(".")).unwrap();
        assert!(manifest.train_dir().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = DatasetManifest::from_file("nonexistent/vehicles_dataset.yaml");
        assert!(matches!(result, Err(DetectError::DatasetError(_))));
    }
}
