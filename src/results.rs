// VehicleDetect 🚀 AGPL-3.0 License

//! Results types for detection output.

use std::collections::HashMap;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, s};

/// Timing information for inference operations (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Get total time across all stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// Detection bounding boxes.
#[derive(Debug, Clone)]
pub struct Boxes {
    /// Raw data array with shape (N, 6) containing [x1, y1, x2, y2, conf, cls].
    pub data: Array2<f32>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
}

impl Boxes {
    /// Create a new Boxes instance.
    ///
    /// # Arguments
    ///
    /// * `data` - Array with shape (N, 6) containing box data.
    /// * `orig_shape` - Original image shape (height, width).
    #[must_use]
    pub const fn new(data: Array2<f32>, orig_shape: (u32, u32)) -> Self {
        Self { data, orig_shape }
    }

    /// Get the number of boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Check if there are no boxes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get boxes in xyxy format [x1, y1, x2, y2].
    #[must_use]
    pub fn xyxy(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., 0..4])
    }

    /// Get confidence scores.
    #[must_use]
    pub fn conf(&self) -> ArrayView1<'_, f32> {
        self.data.slice(s![.., 4])
    }

    /// Get class IDs.
    #[must_use]
    pub fn cls(&self) -> ArrayView1<'_, f32> {
        self.data.slice(s![.., 5])
    }
}

/// Results container for one inference call on one image.
#[derive(Debug, Clone)]
pub struct Results {
    /// Original image as HWC array (height, width, channels).
    pub orig_img: Array3<u8>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Detection bounding boxes, if any survived filtering.
    pub boxes: Option<Boxes>,
    /// Inference timing information.
    pub speed: Speed,
    /// Class ID to name mapping.
    pub names: HashMap<usize, String>,
    /// Path to the source image.
    pub path: String,
}

impl Results {
    /// Create a new Results instance with no detections.
    #[must_use]
    pub fn new(
        orig_img: Array3<u8>,
        path: String,
        names: HashMap<usize, String>,
        speed: Speed,
    ) -> Self {
        let shape = orig_img.shape();
        #[allow(clippy::cast_possible_truncation)]
        let orig_shape = (shape[0] as u32, shape[1] as u32);

        Self {
            orig_img,
            orig_shape,
            boxes: None,
            speed,
            names,
            path,
        }
    }

    /// Get the number of detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.as_ref().map_or(0, Boxes::len)
    }

    /// Check if there are no detections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate a summary string describing the detections, e.g.
    /// "2 cars, 1 truck".
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn verbose(&self) -> String {
        let Some(ref boxes) = self.boxes else {
            return "(no detections)".to_string();
        };
        if boxes.is_empty() {
            return "(no detections)".to_string();
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for &c in boxes.cls() {
            *counts.entry(c as usize).or_insert(0) += 1;
        }

        let mut sorted_counts: Vec<(usize, usize)> = counts.into_iter().collect();
        sorted_counts.sort_by_key(|(class_id, _)| *class_id);

        let parts: Vec<String> = sorted_counts
            .iter()
            .map(|(class_id, count)| {
                let class_name = self.names.get(class_id).map_or("object", String::as_str);
                let name = if *count > 1 {
                    crate::utils::pluralize(class_name)
                } else {
                    class_name.to_string()
                };
                format!("{count} {name}")
            })
            .collect();

        parts.join(", ")
    }

    /// Save the annotated result to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or written.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> crate::error::Result<()> {
        let img = crate::utils::array_to_image(&self.orig_img)?;
        let annotated = crate::annotate::annotate_image(&img, self);
        annotated
            .save(path)
            .map_err(|e| crate::error::DetectError::ImageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_names() -> HashMap<usize, String> {
        let mut names = HashMap::new();
        names.insert(0, "car".to_string());
        names.insert(1, "truck".to_string());
        names.insert(2, "bus".to_string());
        names
    }

    fn create_dummy_image() -> Array3<u8> {
        Array3::zeros((100, 100, 3))
    }

    #[test]
    fn test_boxes_accessors() {
        let data =
            Array2::from_shape_vec((1, 6), vec![10.0, 20.0, 30.0, 40.0, 0.9, 1.0]).unwrap();
        let boxes = Boxes::new(data, (100, 100));

        assert_eq!(boxes.len(), 1);
        assert!((boxes.conf()[0] - 0.9).abs() < f32::EPSILON);
        assert!((boxes.cls()[0] - 1.0).abs() < f32::EPSILON);
        assert!((boxes.xyxy()[[0, 2]] - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_verbose_counts_classes() {
        let data = Array2::from_shape_vec(
            (3, 6),
            vec![
                10.0, 10.0, 20.0, 20.0, 0.9, 0.0, // car
                30.0, 30.0, 40.0, 40.0, 0.8, 0.0, // car
                50.0, 50.0, 60.0, 60.0, 0.7, 2.0, // bus
            ],
        )
        .unwrap();

        let mut result = Results::new(
            create_dummy_image(),
            "test.jpg".to_string(),
            create_names(),
            Speed::default(),
        );
        result.boxes = Some(Boxes::new(data, (100, 100)));

        assert_eq!(result.verbose(), "2 cars, 1 bus");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_verbose_empty() {
        let result = Results::new(
            create_dummy_image(),
            "test.jpg".to_string(),
            create_names(),
            Speed::default(),
        );
        assert_eq!(result.verbose(), "(no detections)");
        assert!(result.is_empty());
    }

    #[test]
    fn test_speed_total() {
        let speed = Speed::new(1.0, 2.0, 3.0);
        assert!((speed.total() - 6.0).abs() < f64::EPSILON);
    }
}
