// VehicleDetect 🚀 AGPL-3.0 License

//! Detection post-processing: grid decoding, confidence filtering, and NMS.
//!
//! The model emits a `[batch, 5 + num_classes, gh, gw]` grid of raw logits.
//! Each cell decodes to one candidate box:
//!
//! - center `(gx + sigmoid(tx), gy + sigmoid(ty)) * stride`
//! - size `(sigmoid(tw) * W, sigmoid(th) * H)` of the letterboxed input
//! - score `sigmoid(obj) * max(sigmoid(class))`
//!
//! Candidates below the confidence threshold are dropped, the rest go
//! through per-class NMS, and surviving boxes are mapped back to original
//! image coordinates.

use std::collections::HashMap;

use ndarray::{Array2, Array3};

use crate::error::{DetectError, Result};
use crate::inference::InferenceConfig;
use crate::model::{BOX_CHANNELS, STRIDE};
use crate::preprocessing::{PreprocessResult, clip_coords, scale_coords};
use crate::results::{Boxes, Results, Speed};
use crate::utils::nms_per_class;

/// Logistic sigmoid.
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decode one grid of raw logits into final [`Results`].
///
/// # Arguments
///
/// * `output` - Flat model output for one image.
/// * `output_shape` - Output shape `[1, 5 + num_classes, gh, gw]`.
/// * `preprocess` - Letterbox transform of the image.
/// * `config` - Confidence/IoU/max-detection settings.
/// * `names` - Class ID to name mapping.
/// * `orig_img` - Original image as HWC array.
/// * `path` - Source path of the image.
/// * `speed` - Timing collected so far.
///
/// # Errors
///
/// Returns an inference error if the output shape is inconsistent with the
/// flat data.
#[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
pub fn postprocess_detect(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
    names: &HashMap<usize, String>,
    orig_img: Array3<u8>,
    path: String,
    speed: Speed,
) -> Result<Results> {
    let mut results = Results::new(orig_img, path, names.clone(), speed);

    let &[_, channels, gh, gw] = output_shape else {
        return Err(DetectError::InferenceError(format!(
            "unexpected output shape {output_shape:?}, expected [1, C, H, W]"
        )));
    };
    if channels < BOX_CHANNELS || output.len() != channels * gh * gw {
        return Err(DetectError::InferenceError(format!(
            "output data of {} values does not match shape {output_shape:?}",
            output.len()
        )));
    }
    let num_classes = channels - BOX_CHANNELS;

    // Letterboxed input dimensions the grid was produced from.
    let input_w = (gw * STRIDE) as f32;
    let input_h = (gh * STRIDE) as f32;

    let at = |c: usize, gy: usize, gx: usize| output[(c * gh + gy) * gw + gx];

    let mut candidates: Vec<([f32; 4], f32, usize)> = Vec::new();

    for gy in 0..gh {
        for gx in 0..gw {
            let obj = sigmoid(at(4, gy, gx));

            // Best class for this cell.
            let mut best_class = 0;
            let mut best_cls_score = f32::MIN;
            for c in 0..num_classes {
                let score = at(BOX_CHANNELS + c, gy, gx);
                if score > best_cls_score {
                    best_cls_score = score;
                    best_class = c;
                }
            }
            let score = if num_classes == 0 {
                obj
            } else {
                obj * sigmoid(best_cls_score)
            };

            if score < config.confidence_threshold {
                continue;
            }

            // Decode the cell to a box in letterbox space.
            let cx = (gx as f32 + sigmoid(at(0, gy, gx))) * STRIDE as f32;
            let cy = (gy as f32 + sigmoid(at(1, gy, gx))) * STRIDE as f32;
            let w = sigmoid(at(2, gy, gx)) * input_w;
            let h = sigmoid(at(3, gy, gx)) * input_h;

            let xyxy = [
                cx - w / 2.0,
                cy - h / 2.0,
                cx + w / 2.0,
                cy + h / 2.0,
            ];

            // Back to original image coordinates.
            let scaled = scale_coords(&xyxy, preprocess.scale, preprocess.padding);
            let clipped = clip_coords(&scaled, preprocess.orig_shape);

            candidates.push((clipped, score, best_class));
        }
    }

    if candidates.is_empty() {
        return Ok(results);
    }

    let keep_indices = nms_per_class(&candidates, config.iou_threshold);
    let num_kept = keep_indices.len().min(config.max_detections);

    let mut data = Array2::zeros((num_kept, 6));
    for (out_idx, &keep_idx) in keep_indices.iter().take(num_kept).enumerate() {
        let (bbox, score, class) = &candidates[keep_idx];
        data[[out_idx, 0]] = bbox[0];
        data[[out_idx, 1]] = bbox[1];
        data[[out_idx, 2]] = bbox[2];
        data[[out_idx, 3]] = bbox[3];
        data[[out_idx, 4]] = *score;
        data[[out_idx, 5]] = *class as f32;
    }

    results.boxes = Some(Boxes::new(data, preprocess.orig_shape));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn names() -> HashMap<usize, String> {
        let mut names = HashMap::new();
        names.insert(0, "car".to_string());
        names.insert(1, "truck".to_string());
        names
    }

    /// Build a 2x2 grid (64x64 input) with one confident car in cell (0, 0).
    fn one_hit_grid() -> (Vec<f32>, Vec<usize>) {
        let (channels, gh, gw) = (7, 2, 2);
        let mut out = vec![-10.0; channels * gh * gw]; // everything inactive

        let idx = |c: usize, gy: usize, gx: usize| (c * gh + gy) * gw + gx;
        out[idx(0, 0, 0)] = 0.0; // tx -> 0.5
        out[idx(1, 0, 0)] = 0.0; // ty -> 0.5
        out[idx(2, 0, 0)] = 0.0; // tw -> half the input width
        out[idx(3, 0, 0)] = 0.0; // th
        out[idx(4, 0, 0)] = 6.0; // objectness
        out[idx(5, 0, 0)] = 6.0; // class 0

        (out, vec![1, channels, gh, gw])
    }

    fn identity_preprocess() -> PreprocessResult {
        crate::preprocessing::letterbox(&DynamicImage::new_rgb8(64, 64), (64, 64))
    }

    #[test]
    fn test_decode_single_box() {
        let (out, shape) = one_hit_grid();
        let preprocess = identity_preprocess();
        let config = InferenceConfig::new().with_confidence(0.5);

        let results = postprocess_detect(
            &out,
            &shape,
            &preprocess,
            &config,
            &names(),
            Array3::zeros((64, 64, 3)),
            "test.png".to_string(),
            Speed::default(),
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        let boxes = results.boxes.as_ref().unwrap();
        // Cell (0, 0) center offset 0.5 at stride 32 -> center (16, 16),
        // size 32x32 -> box (0, 0, 32, 32).
        let xyxy = boxes.xyxy();
        assert!((xyxy[[0, 0]] - 0.0).abs() < 1e-3);
        assert!((xyxy[[0, 3]] - 32.0).abs() < 1e-3);
        assert!((boxes.cls()[0] - 0.0).abs() < f32::EPSILON);
        assert!(boxes.conf()[0] > 0.9);
    }

    #[test]
    fn test_confidence_threshold_monotonic() {
        let (out, shape) = one_hit_grid();
        let preprocess = identity_preprocess();

        let count_at = |conf: f32| {
            let config = InferenceConfig::new().with_confidence(conf);
            postprocess_detect(
                &out,
                &shape,
                &preprocess,
                &config,
                &names(),
                Array3::zeros((64, 64, 3)),
                "test.png".to_string(),
                Speed::default(),
            )
            .unwrap()
            .len()
        };

        assert!(count_at(0.9) <= count_at(0.5));
        assert!(count_at(0.5) <= count_at(0.1));
        assert_eq!(count_at(0.999), 0);
    }

    #[test]
    fn test_bad_shape_rejected() {
        let preprocess = identity_preprocess();
        let config = InferenceConfig::new();
        let result = postprocess_detect(
            &[0.0; 12],
            &[1, 7, 2, 2],
            &preprocess,
            &config,
            &names(),
            Array3::zeros((64, 64, 3)),
            "test.png".to_string(),
            Speed::default(),
        );
        assert!(matches!(result, Err(DetectError::InferenceError(_))));
    }
}
