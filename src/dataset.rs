// VehicleDetect 🚀 AGPL-3.0 License

//! Dataset loading and batch collation.
//!
//! Splits follow the images/labels sibling convention: for
//! `<root>/train/images/x.jpg` the labels live at
//! `<root>/train/labels/x.txt`, one `class cx cy w h` line per box with
//! coordinates normalized to the image. An image without a label file is a
//! background sample.

use std::path::{Path, PathBuf};

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use image::GenericImageView;

use crate::error::{DetectError, Result};
use crate::preprocessing::{batch_to_tensor, letterbox};
use crate::source::SourceIterator;

/// One ground-truth box: class ID and normalized `[cx, cy, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledBox {
    /// Class ID.
    pub class_id: usize,
    /// Normalized center-format box `[cx, cy, w, h]`.
    pub bbox: [f32; 4],
}

/// One dataset sample: an image path and its ground-truth boxes.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Path to the image file.
    pub image: PathBuf,
    /// Ground-truth boxes (empty for background images).
    pub boxes: Vec<LabeledBox>,
}

/// A collated batch ready for the training loop.
#[derive(Debug)]
pub struct DetectBatch<B: Backend> {
    /// Letterboxed, normalized images `[batch, 3, imgsz, imgsz]`.
    pub images: Tensor<B, 4>,
    /// Per-sample ground-truth boxes in letterbox pixel coordinates,
    /// center format `[cx, cy, w, h]`.
    pub boxes: Vec<Vec<[f32; 4]>>,
    /// Per-sample ground-truth class IDs, parallel to `boxes`.
    pub classes: Vec<Vec<usize>>,
}

/// Derive the labels directory for an images directory: the last `images`
/// path component becomes `labels`, or a sibling `labels` directory is
/// used when no such component exists.
#[must_use]
pub fn labels_dir_for(images_dir: &Path) -> PathBuf {
    let components: Vec<&std::ffi::OsStr> = images_dir.iter().collect();
    if let Some(pos) = components.iter().rposition(|c| *c == "images") {
        let mut out = PathBuf::new();
        for (i, part) in components.iter().enumerate() {
            if i == pos {
                out.push("labels");
            } else {
                out.push(part);
            }
        }
        return out;
    }

    images_dir
        .parent()
        .unwrap_or(images_dir)
        .join("labels")
}

/// Load all samples of a split.
///
/// # Errors
///
/// Returns a dataset error if the images directory does not exist or a
/// label file is malformed.
pub fn load_split(images_dir: &Path, num_classes: usize) -> Result<Vec<Sample>> {
    if !images_dir.is_dir() {
        return Err(DetectError::DatasetError(format!(
            "images directory not found: {}",
            images_dir.display()
        )));
    }

    let labels_dir = labels_dir_for(images_dir);
    let source = crate::source::Source::Directory(images_dir.to_path_buf());
    let iter = SourceIterator::new(&source)?;

    let mut samples = Vec::new();
    for image in iter.paths() {
        let label_path = labels_dir.join(
            Path::new(image.file_stem().unwrap_or_default()).with_extension("txt"),
        );
        let boxes = if label_path.is_file() {
            parse_label_file(&label_path, num_classes)?
        } else {
            Vec::new()
        };
        samples.push(Sample {
            image: image.clone(),
            boxes,
        });
    }

    Ok(samples)
}

/// Parse a label file into boxes.
///
/// # Errors
///
/// Returns a dataset error naming the file for any malformed line.
pub fn parse_label_file(path: &Path, num_classes: usize) -> Result<Vec<LabeledBox>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DetectError::DatasetError(format!("failed to read labels {}: {e}", path.display()))
    })?;

    let mut boxes = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = parse_label_line(line, num_classes).map_err(|e| {
            DetectError::DatasetError(format!(
                "{}:{}: {e}",
                path.display(),
                line_no + 1
            ))
        })?;
        boxes.push(parsed);
    }

    Ok(boxes)
}

/// Parse one `class cx cy w h` label line with normalized coordinates.
///
/// # Errors
///
/// Returns a description of the defect for malformed lines.
pub fn parse_label_line(
    line: &str,
    num_classes: usize,
) -> std::result::Result<LabeledBox, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    }

    let class_id: usize = fields[0]
        .parse()
        .map_err(|_| format!("invalid class ID '{}'", fields[0]))?;
    if class_id >= num_classes {
        return Err(format!(
            "class ID {class_id} out of range for {num_classes} classes"
        ));
    }

    let mut bbox = [0.0f32; 4];
    for (i, field) in fields[1..].iter().enumerate() {
        let value: f32 = field
            .parse()
            .map_err(|_| format!("invalid coordinate '{field}'"))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("coordinate {value} outside [0, 1]"));
        }
        bbox[i] = value;
    }

    Ok(LabeledBox { class_id, bbox })
}

/// Collate samples into a training batch at the given square image size.
///
/// Images are letterboxed and boxes are mapped into letterbox pixel
/// coordinates so targets line up with the model grid.
///
/// # Errors
///
/// Returns a dataset error if an image cannot be loaded, and a training
/// error for an empty batch.
#[allow(clippy::cast_precision_loss)]
pub fn collate<B: Backend>(
    samples: &[Sample],
    imgsz: usize,
    device: &B::Device,
) -> Result<DetectBatch<B>> {
    if samples.is_empty() {
        return Err(DetectError::TrainingError(
            "cannot collate an empty batch".to_string(),
        ));
    }

    let mut images = Vec::with_capacity(samples.len());
    let mut all_boxes = Vec::with_capacity(samples.len());
    let mut all_classes = Vec::with_capacity(samples.len());

    for sample in samples {
        let img = crate::annotate::load_image(&sample.image).map_err(|e| {
            DetectError::DatasetError(format!(
                "failed to open image {}: {e}",
                sample.image.display()
            ))
        })?;
        let (orig_w, orig_h) = img.dimensions();
        let preprocess = letterbox(&img, (imgsz, imgsz));

        let (scale_y, scale_x) = preprocess.scale;
        let (pad_top, pad_left) = preprocess.padding;

        let mut boxes = Vec::with_capacity(sample.boxes.len());
        let mut classes = Vec::with_capacity(sample.boxes.len());
        for labeled in &sample.boxes {
            let [cx, cy, w, h] = labeled.bbox;
            boxes.push([
                cx * orig_w as f32 * scale_x + pad_left,
                cy * orig_h as f32 * scale_y + pad_top,
                w * orig_w as f32 * scale_x,
                h * orig_h as f32 * scale_y,
            ]);
            classes.push(labeled.class_id);
        }

        images.push(preprocess.image);
        all_boxes.push(boxes);
        all_classes.push(classes);
    }

    Ok(DetectBatch {
        images: batch_to_tensor(&images, device),
        boxes: all_boxes,
        classes: all_classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray<f32>;

    #[test]
    fn test_parse_label_line() {
        let parsed = parse_label_line("1 0.5 0.5 0.25 0.25", 4).unwrap();
        assert_eq!(parsed.class_id, 1);
        assert!((parsed.bbox[2] - 0.25).abs() < f32::EPSILON);

        assert!(parse_label_line("1 0.5 0.5", 4).is_err());
        assert!(parse_label_line("9 0.5 0.5 0.25 0.25", 4).is_err());
        assert!(parse_label_line("1 1.5 0.5 0.25 0.25", 4).is_err());
        assert!(parse_label_line("x 0.5 0.5 0.25 0.25", 4).is_err());
    }

    #[test]
    fn test_labels_dir_for() {
        assert_eq!(
            labels_dir_for(Path::new("dataset/train/images")),
            Path::new("dataset/train/labels")
        );
        assert_eq!(
            labels_dir_for(Path::new("dataset/train/frames")),
            Path::new("dataset/train/labels")
        );
    }

    fn write_sample_dataset(root: &Path) {
        let images = root.join("images");
        let labels = root.join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        for name in ["a", "b"] {
            let img = image::RgbImage::from_pixel(64, 64, image::Rgb([30, 30, 30]));
            img.save(images.join(format!("{name}.png"))).unwrap();
        }
        // One labeled image, one background image.
        std::fs::write(labels.join("a.txt"), "0 0.5 0.5 0.5 0.5\n").unwrap();
    }

    #[test]
    fn test_load_split_and_collate() {
        let dir = tempfile::tempdir().unwrap();
        write_sample_dataset(dir.path());

        let samples = load_split(&dir.path().join("images"), 2).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].boxes.len(), 1);
        assert!(samples[1].boxes.is_empty());

        let device = Default::default();
        let batch = collate::<TestBackend>(&samples, 64, &device).unwrap();
        assert_eq!(batch.images.dims(), [2, 3, 64, 64]);

        // 64x64 image at imgsz 64: identity letterbox, so the normalized
        // center box lands at the image center in pixels.
        let b = batch.boxes[0][0];
        assert!((b[0] - 32.0).abs() < 1e-3);
        assert!((b[2] - 32.0).abs() < 1e-3);
        assert_eq!(batch.classes[0][0], 0);
    }

    #[test]
    fn test_load_split_missing_dir() {
        let result = load_split(Path::new("missing/images"), 2);
        assert!(matches!(result, Err(DetectError::DatasetError(_))));
    }
}
