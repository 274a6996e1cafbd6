// VehicleDetect 🚀 AGPL-3.0 License

//! Image preprocessing.
//!
//! Images are letterboxed (aspect-preserving resize onto a gray canvas,
//! centered) to the model input size, then converted to normalized NCHW
//! tensors. The scale and padding of each letterbox are kept so detections
//! can be mapped back to original image coordinates.

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Result of preprocessing an image, containing the letterboxed image and
/// the transform needed to undo it.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Letterboxed RGB image at the target size.
    pub image: RgbImage,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Letterbox an image to `target_size` (height, width).
///
/// The image is resized to fit while keeping its aspect ratio and centered
/// on a gray canvas.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn letterbox(image: &DynamicImage, target_size: (usize, usize)) -> PreprocessResult {
    let (orig_width, orig_height) = image.dimensions();
    let orig_shape = (orig_height, orig_width);

    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    // Scale to fit within the target while maintaining aspect ratio.
    let scale = (target_h / orig_h).min(target_w / orig_w);
    let new_w = ((orig_w * scale).round() as u32).max(1);
    let new_h = ((orig_h * scale).round() as u32).max(1);

    // Center alignment: split the padding equally on both sides.
    let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
    let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

    let mut canvas = RgbImage::from_pixel(
        target_size.1 as u32,
        target_size.0 as u32,
        Rgb(LETTERBOX_COLOR),
    );
    image::imageops::overlay(&mut canvas, &resized, i64::from(pad_left), i64::from(pad_top));

    // Effective scale factors for coordinate conversion back to original.
    let scale_x = new_w as f32 / orig_w;
    let scale_y = new_h as f32 / orig_h;

    PreprocessResult {
        image: canvas,
        orig_shape,
        scale: (scale_y, scale_x),
        padding: (pad_top as f32, pad_left as f32),
    }
}

/// Convert a letterboxed RGB image to a normalized `[1, 3, H, W]` tensor.
pub fn image_to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
    batch_to_tensor(std::slice::from_ref(image), device)
}

/// Convert a batch of equally sized RGB images to a normalized
/// `[N, 3, H, W]` tensor.
///
/// # Panics
///
/// Panics if `images` is empty (callers batch at least one image).
pub fn batch_to_tensor<B: Backend>(images: &[RgbImage], device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = images[0].dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut buf: Vec<f32> = Vec::with_capacity(images.len() * 3 * h * w);
    for image in images {
        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    buf.push(f32::from(image.get_pixel(x, y)[c]) / 255.0);
                }
            }
        }
    }

    Tensor::from_data(TensorData::new(buf, [images.len(), 3, h, w]), device)
}

/// Map letterboxed coordinates back to original image space.
///
/// # Arguments
///
/// * `coords` - Box coordinates [x1, y1, x2, y2] in letterbox space.
/// * `scale` - Scale factors (`scale_y`, `scale_x`) from preprocessing.
/// * `padding` - Padding (`pad_top`, `pad_left`) from preprocessing.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;

    [
        (coords[0] - pad_left) / scale_x, // x1
        (coords[1] - pad_top) / scale_y,  // y1
        (coords[2] - pad_left) / scale_x, // x2
        (coords[3] - pad_top) / scale_y,  // y2
    ]
}

/// Clip coordinates to image bounds.
///
/// # Arguments
///
/// * `coords` - Box coordinates [x1, y1, x2, y2].
/// * `shape` - Image shape (height, width).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    let (height, width) = (shape.0 as f32, shape.1 as f32);

    [
        coords[0].clamp(0.0, width),
        coords[1].clamp(0.0, height),
        coords[2].clamp(0.0, width),
        coords[3].clamp(0.0, height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray<f32>;

    #[test]
    fn test_letterbox_wide_image() {
        let img = DynamicImage::new_rgb8(100, 50);
        let result = letterbox(&img, (64, 64));

        assert_eq!(result.image.dimensions(), (64, 64));
        assert_eq!(result.orig_shape, (50, 100));
        // Scaled to 64x32, padded 16 top and bottom.
        assert!((result.scale.1 - 0.64).abs() < 1e-6);
        assert!((result.padding.0 - 16.0).abs() < f32::EPSILON);
        assert!((result.padding.1 - 0.0).abs() < f32::EPSILON);

        // Padding rows keep the canvas color.
        assert_eq!(result.image.get_pixel(0, 0).0, LETTERBOX_COLOR);
    }

    #[test]
    fn test_scale_coords_inverts_letterbox() {
        let img = DynamicImage::new_rgb8(100, 50);
        let result = letterbox(&img, (64, 64));

        // A box covering the full resized image maps back to the original.
        let coords = [0.0, 16.0, 64.0, 48.0];
        let scaled = scale_coords(&coords, result.scale, result.padding);
        let clipped = clip_coords(&scaled, result.orig_shape);
        assert!((clipped[0] - 0.0).abs() < 1e-3);
        assert!((clipped[1] - 0.0).abs() < 1e-3);
        assert!((clipped[2] - 100.0).abs() < 1e-3);
        assert!((clipped[3] - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_image_to_tensor_shape() {
        let img = RgbImage::from_pixel(8, 4, Rgb([255, 0, 0]));
        let device = Default::default();
        let tensor = image_to_tensor::<TestBackend>(&img, &device);
        assert_eq!(tensor.dims(), [1, 3, 4, 8]);

        let data = tensor.into_data().to_vec::<f32>().unwrap();
        // Red channel first in CHW order, normalized.
        assert!((data[0] - 1.0).abs() < f32::EPSILON);
        assert!((data[32] - 0.0).abs() < f32::EPSILON);
    }
}
