// VehicleDetect 🚀 AGPL-3.0 License

//! Input source handling for inference.
//!
//! A source is a single image, a directory of images, a simple glob
//! pattern, or an explicit list of paths. Iteration is strictly sequential:
//! each image is decoded and handed to the caller before the next one is
//! touched.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{DetectError, Result};

/// Represents different input sources for inference.
#[derive(Debug, Clone)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// List of image paths.
    ImageList(Vec<PathBuf>),
    /// Directory containing images.
    Directory(PathBuf),
    /// Glob pattern for images (e.g. "images/*.jpg").
    Glob(String),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Check if this source may yield multiple images.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::Glob(_) | Self::ImageList(_))
    }

    /// Get the path if this source has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Image(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        // Check for glob pattern.
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            return Self::Directory(path);
        }

        // Default to image.
        Self::Image(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

/// Metadata about a source image.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Index of the image within the source (0-based).
    pub frame_idx: usize,
    /// Total number of images in the source.
    pub total_frames: usize,
    /// Source path of the image.
    pub path: String,
}

/// Sequential iterator over the images of a source.
pub struct SourceIterator {
    current: usize,
    image_paths: Vec<PathBuf>,
}

impl SourceIterator {
    /// Create a new source iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the source directory or glob root cannot be read.
    pub fn new(source: &Source) -> Result<Self> {
        let image_paths = match source {
            Source::Directory(path) => Self::collect_images_from_dir(path)?,
            Source::Glob(pattern) => Self::collect_images_from_glob(pattern)?,
            Source::Image(path) => vec![path.clone()],
            Source::ImageList(paths) => paths.clone(),
        };

        Ok(Self {
            current: 0,
            image_paths,
        })
    }

    /// Number of images this iterator will yield.
    #[must_use]
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    /// Check if the source yields no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// The image paths this iterator will yield, in order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    /// Collect image paths from a directory.
    fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(DetectError::ImageError(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| Self::is_image_file(path))
            .collect();

        paths.sort();
        Ok(paths)
    }

    /// Collect image paths from a glob pattern.
    ///
    /// Only simple patterns like "dir/*.jpg" are supported: a directory
    /// part followed by a `*.ext` filter.
    fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
        let Some(star_pos) = pattern.find('*') else {
            return Ok(vec![PathBuf::from(pattern)]);
        };

        let dir_part = &pattern[..star_pos];
        let dir = if dir_part.is_empty() {
            Path::new(".")
        } else {
            Path::new(dir_part.trim_end_matches('/').trim_end_matches('\\'))
        };

        // Extension filter from the pattern (e.g. "*.jpg" -> "jpg").
        let ext_filter: Option<String> = pattern[star_pos..]
            .strip_prefix("*.")
            .map(str::to_lowercase);

        if !dir.is_dir() {
            return Err(DetectError::ImageError(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                ext_filter.as_ref().map_or_else(
                    || Self::is_image_file(path),
                    |ext| {
                        path.extension()
                            .is_some_and(|e| e.to_string_lossy().to_lowercase() == *ext)
                    },
                )
            })
            .collect();

        paths.sort();
        Ok(paths)
    }

    /// Check if a path is an image file based on extension.
    fn is_image_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            matches!(
                ext.as_str(),
                "jpg" | "jpeg" | "png" | "bmp" | "gif" | "webp" | "tiff" | "tif"
            )
        })
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.image_paths.len() {
            return None;
        }

        let path = &self.image_paths[self.current];
        let meta = SourceMeta {
            frame_idx: self.current,
            total_frames: self.image_paths.len(),
            path: path.to_string_lossy().to_string(),
        };

        self.current += 1;

        match crate::annotate::load_image(path) {
            Ok(img) => Some(Ok((img, meta))),
            Err(e) => Some(Err(DetectError::ImageError(format!(
                "Failed to load {}: {e}",
                path.display()
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_string() {
        assert!(matches!(Source::from("image.jpg"), Source::Image(_)));
        assert!(matches!(Source::from("*.jpg"), Source::Glob(_)));
        assert!(matches!(Source::from("images/*.png"), Source::Glob(_)));
    }

    #[test]
    fn test_source_checks() {
        let img = Source::Image(PathBuf::from("test.jpg"));
        assert!(img.is_image());
        assert!(!img.is_batch());

        let dir = Source::Directory(PathBuf::from("./images"));
        assert!(dir.is_batch());
        assert_eq!(dir.path(), Some(Path::new("./images")));
    }

    #[test]
    fn test_directory_iteration_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "notes.txt"] {
            let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
            if name.ends_with(".png") {
                img.save(dir.path().join(name)).unwrap();
            } else {
                std::fs::write(dir.path().join(name), "ignored").unwrap();
            }
        }

        let source = Source::Directory(dir.path().to_path_buf());
        let iter = SourceIterator::new(&source).unwrap();
        assert_eq!(iter.len(), 2);

        let names: Vec<String> = iter
            .map(|item| item.unwrap().1.path)
            .map(|p| Path::new(&p).file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_missing_directory() {
        let source = Source::Directory(PathBuf::from("does/not/exist"));
        assert!(SourceIterator::new(&source).is_err());
    }
}
