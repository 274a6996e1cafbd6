// VehicleDetect 🚀 AGPL-3.0 License

//! Annotation of detection results onto images.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::results::Results;

/// Class color palette, cycled by class ID.
pub const COLORS: [[u8; 3]; 10] = [
    [255, 56, 56],   // #ff3838
    [255, 157, 151], // #ff9d97
    [255, 112, 31],  // #ff701f
    [255, 178, 29],  // #ffb21d
    [207, 210, 49],  // #cfd231
    [72, 249, 10],   // #48f90a
    [146, 204, 23],  // #92cc17
    [61, 219, 134],  // #3ddb86
    [26, 147, 52],   // #1a9334
    [0, 212, 187],   // #00d4bb
];

/// Conventional path checked for the label font.
pub const FONT_PATH: &str = "assets/font.ttf";

/// Get color for a class ID.
#[must_use]
pub fn get_class_color(class_id: usize) -> Rgb<u8> {
    let color = COLORS[class_id % COLORS.len()];
    Rgb(color)
}

/// Find the next available run directory (predict, predict2, predict3, ...).
#[must_use]
pub fn find_next_run_dir(base: &str, prefix: &str) -> String {
    let base_path = Path::new(base);

    // First try without number.
    let first = base_path.join(prefix);
    if !first.exists() {
        return first.to_string_lossy().to_string();
    }

    // Try with incrementing numbers.
    for i in 2.. {
        let numbered = base_path.join(format!("{prefix}{i}"));
        if !numbered.exists() {
            return numbered.to_string_lossy().to_string();
        }
    }

    // Fallback (should never reach here)
    base_path.join(prefix).to_string_lossy().to_string()
}

/// Load an image, decoding JPEGs through `jpeg-decoder` to bypass stride
/// issues in the default decoder.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded by any path.
pub fn load_image<P: AsRef<Path>>(path: P) -> image::ImageResult<DynamicImage> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if let Some("jpg" | "jpeg") = ext.as_deref() {
        if let Ok(file) = File::open(path) {
            let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
            if let Ok(pixels) = decoder.decode() {
                if let Some(info) = decoder.info() {
                    let width = u32::from(info.width);
                    let height = u32::from(info.height);
                    match info.pixel_format {
                        jpeg_decoder::PixelFormat::RGB24 => {
                            if let Some(buffer) =
                                image::ImageBuffer::from_raw(width, height, pixels)
                            {
                                return Ok(DynamicImage::ImageRgb8(buffer));
                            }
                        }
                        jpeg_decoder::PixelFormat::L8 => {
                            if let Some(buffer) =
                                image::ImageBuffer::from_raw(width, height, pixels)
                            {
                                return Ok(DynamicImage::ImageLuma8(buffer));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Fallback
    image::open(path)
}

/// Load the label font from the conventional assets location, if present.
fn load_label_font() -> Option<FontVec> {
    let data = std::fs::read(FONT_PATH).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Annotate an image with detection boxes and labels.
///
/// Boxes are always drawn; labels only when a font is available at
/// [`FONT_PATH`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn annotate_image(image: &DynamicImage, result: &Results) -> DynamicImage {
    let mut img = image.to_rgb8();
    let (width, height) = img.dimensions();

    let font = load_label_font();

    if let Some(ref boxes) = result.boxes {
        let xyxy = boxes.xyxy();
        let conf = boxes.conf();
        let cls = boxes.cls();

        for i in 0..boxes.len() {
            #[allow(clippy::cast_sign_loss)]
            let class_id = cls[i] as usize;
            let confidence = conf[i];

            // Box coordinates clamped to image bounds.
            let mut x1 = xyxy[[i, 0]].round() as i32;
            let mut y1 = xyxy[[i, 1]].round() as i32;
            let mut x2 = xyxy[[i, 2]].round() as i32;
            let mut y2 = xyxy[[i, 3]].round() as i32;

            if x1 > x2 {
                std::mem::swap(&mut x1, &mut x2);
            }
            if y1 > y2 {
                std::mem::swap(&mut y1, &mut y2);
            }

            x1 = x1.clamp(0, width as i32 - 1);
            y1 = y1.clamp(0, height as i32 - 1);
            x2 = x2.clamp(0, width as i32 - 1);
            y2 = y2.clamp(0, height as i32 - 1);

            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            let color = get_class_color(class_id);

            // Box outline with fixed thickness.
            let thickness = 3;
            for t in 0..thickness {
                let tx1 = (x1 + t).min(x2);
                let ty1 = (y1 + t).min(y2);
                let tx2 = (x2 - t).max(tx1);
                let ty2 = (y2 - t).max(ty1);
                if tx2 > tx1 && ty2 > ty1 {
                    #[allow(clippy::cast_sign_loss)]
                    let rect =
                        Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
                    draw_hollow_rect_mut(&mut img, rect, color);
                }
            }

            // Label above the box when there is room, below otherwise.
            let class_name = result
                .names
                .get(&class_id)
                .map(String::as_str)
                .unwrap_or("object");
            let label = format!("{class_name} {confidence:.2}");

            if let Some(ref f) = font {
                let scale = PxScale::from(16.0);
                let text_y = if y1 > 20 { y1 - 20 } else { y2 + 5 };
                let text_x = x1.max(0);
                if text_x < width as i32 && text_y >= 0 && text_y < height as i32 {
                    draw_text_mut(&mut img, color, text_x, text_y, scale, f, &label);
                }
            }
        }
    }

    DynamicImage::ImageRgb8(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Boxes, Speed};
    use ndarray::{Array2, Array3};
    use std::collections::HashMap;

    #[test]
    fn test_class_colors_cycle() {
        assert_eq!(get_class_color(0), get_class_color(COLORS.len()));
        assert_ne!(get_class_color(0), get_class_color(1));
    }

    #[test]
    fn test_find_next_run_dir_increments() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();

        let first = find_next_run_dir(&base, "predict");
        assert!(first.ends_with("predict"));

        std::fs::create_dir_all(&first).unwrap();
        let second = find_next_run_dir(&base, "predict");
        assert!(second.ends_with("predict2"));
    }

    #[test]
    fn test_annotate_draws_boxes_without_font() {
        let image = DynamicImage::new_rgb8(64, 64);

        let data =
            Array2::from_shape_vec((1, 6), vec![8.0, 8.0, 40.0, 40.0, 0.9, 0.0]).unwrap();
        let mut names = HashMap::new();
        names.insert(0, "car".to_string());

        let mut result = crate::results::Results::new(
            Array3::zeros((64, 64, 3)),
            "test.png".to_string(),
            names,
            Speed::default(),
        );
        result.boxes = Some(Boxes::new(data, (64, 64)));

        let annotated = annotate_image(&image, &result).to_rgb8();
        // The outline must differ from the all-black input.
        assert_ne!(annotated.get_pixel(8, 8).0, [0, 0, 0]);
    }
}
