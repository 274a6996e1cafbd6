// VehicleDetect 🚀 AGPL-3.0 License

//! Saving annotated inference results.

use std::path::{Path, PathBuf};

use crate::error::{DetectError, Result};
use crate::source::SourceMeta;

/// Writes annotated images into a run directory, keeping the source file
/// names.
pub struct SaveResults {
    save_dir: PathBuf,
}

impl SaveResults {
    /// Create a new `SaveResults` for the given directory.
    #[must_use]
    pub fn new(save_dir: PathBuf) -> Self {
        Self { save_dir }
    }

    /// The directory results are saved into.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Save an annotated image under the source's file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the image
    /// cannot be encoded.
    pub fn save(&self, meta: &SourceMeta, annotated: &image::DynamicImage) -> Result<()> {
        let filename = Path::new(&meta.path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        if !self.save_dir.exists() {
            std::fs::create_dir_all(&self.save_dir)?;
        }

        let save_path = self.save_dir.join(filename);
        annotated
            .save(&save_path)
            .map_err(|e| DetectError::ImageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_keeps_filename() {
        let dir = tempfile::tempdir().unwrap();
        let saver = SaveResults::new(dir.path().join("predict"));

        let meta = SourceMeta {
            frame_idx: 0,
            total_frames: 1,
            path: "some/where/bus.png".to_string(),
        };
        let img = image::DynamicImage::new_rgb8(8, 8);
        saver.save(&meta, &img).unwrap();

        assert!(dir.path().join("predict/bus.png").is_file());
    }
}
