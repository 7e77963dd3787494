use std::path::Path;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};

use crate::annotation::domain::face_annotator::{AnnotateError, FaceAnnotator};
use crate::detection::domain::face_result::{FaceBox, FaceResult};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ENGINE_LABEL_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Glyph cell edge in font pixels.
const GLYPH: i64 = 8;
const ENGINE_LABEL_SCALE: i64 = 3;
const FACE_LABEL_SCALE: i64 = 2;
const ENGINE_LABEL_ORIGIN: (i64, i64) = (10, 10);
/// Gap between a face label and the top edge of its box.
const FACE_LABEL_GAP: i64 = 4;

/// Draws each engine's boxes on its own copy of the image and stacks the
/// copies top to bottom in result order. Output is always JPEG.
///
/// Every panel carries its engine name in the top-left corner. Each box is
/// labelled with its confidence and relative size when the engine reported
/// them.
#[derive(Debug, Clone, Default)]
pub struct StackedBoxAnnotator;

impl StackedBoxAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl FaceAnnotator for StackedBoxAnnotator {
    fn annotate(
        &self,
        image_path: &Path,
        results: &[FaceResult],
        output: &Path,
    ) -> Result<(), AnnotateError> {
        if results.is_empty() {
            return Err(AnnotateError::NothingToDraw(image_path.to_path_buf()));
        }
        let source = image::open(image_path)
            .map_err(|source| AnnotateError::Decode {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let canvas = stack_panels(&source, results)
            .ok_or_else(|| AnnotateError::TooLarge(image_path.to_path_buf()))?;

        canvas
            .save_with_format(output, ImageFormat::Jpeg)
            .map_err(|source| AnnotateError::Save {
                path: output.to_path_buf(),
                source,
            })
    }
}

/// `None` when the stacked height overflows `u32`.
fn stack_panels(source: &RgbImage, results: &[FaceResult]) -> Option<RgbImage> {
    let (w, h) = source.dimensions();
    let total_h = h.checked_mul(u32::try_from(results.len()).ok()?)?;
    let mut canvas = RgbImage::new(w, total_h);

    for (i, result) in results.iter().enumerate() {
        let mut panel = source.clone();
        draw_panel(&mut panel, result);
        image::imageops::replace(&mut canvas, &panel, 0, i as i64 * h as i64);
    }
    Some(canvas)
}

fn draw_panel(panel: &mut RgbImage, result: &FaceResult) {
    let (x, y) = ENGINE_LABEL_ORIGIN;
    draw_text(panel, x, y, &result.engine_name, ENGINE_LABEL_SCALE, ENGINE_LABEL_COLOR);

    if !result.has_faces() {
        return;
    }
    for face in &result.faces {
        draw_box(panel, face, BOX_COLOR);
        if let Some(label) = face_label(face) {
            let top = i64::from(face.y) - FACE_LABEL_GAP - GLYPH * FACE_LABEL_SCALE;
            draw_text(panel, i64::from(face.x), top, &label, FACE_LABEL_SCALE, BOX_COLOR);
        }
    }
}

/// `[87%] [W:0.25,H:0.50]`, omitting parts the engine left at zero.
fn face_label(face: &FaceBox) -> Option<String> {
    let mut parts = Vec::new();
    if face.confidence > 0.0 {
        parts.push(format!("[{:.0}%]", face.confidence * 100.0));
    }
    if face.percent_width > 0.0 || face.percent_height > 0.0 {
        parts.push(format!(
            "[W:{:.2},H:{:.2}]",
            face.percent_width, face.percent_height
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Two-pixel outline: the edge itself plus one pixel outside it.
///
/// Edges are computed in `i64` and line spans are clipped to the image
/// first, so work is bounded by the image size whatever the box says.
fn draw_box(img: &mut RgbImage, face: &FaceBox, color: Rgb<u8>) {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let (min_x, min_y) = (i64::from(face.x), i64::from(face.y));
    let (max_x, max_y) = (i64::from(face.max_x()), i64::from(face.max_y()));

    for x in min_x.max(0)..=max_x.min(w - 1) {
        for y in [min_y - 1, min_y, max_y, max_y + 1] {
            put(img, x, y, color);
        }
    }
    for y in min_y.max(0)..=max_y.min(h - 1) {
        for x in [min_x - 1, min_x, max_x, max_x + 1] {
            put(img, x, y, color);
        }
    }
}

/// Renders `text` from the 8×8 bitmap font with its top-left corner at
/// `(x, y)`, each font pixel drawn as a `scale`×`scale` block.
/// Characters without a glyph are skipped.
fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let advance = GLYPH * scale;
    if y >= h || y + advance <= 0 {
        return;
    }

    let mut pen_x = x;
    for ch in text.chars() {
        if pen_x >= w {
            break;
        }
        let Some(rows) = BASIC_FONTS.get(ch) else {
            continue;
        };
        if pen_x + advance > 0 {
            draw_glyph(img, pen_x, y, &rows, scale, color);
        }
        pen_x += advance;
    }
}

fn draw_glyph(img: &mut RgbImage, x: i64, y: i64, rows: &[u8; 8], scale: i64, color: Rgb<u8>) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..8 {
            if bits & (1 << col) == 0 {
                continue;
            }
            let (px, py) = (x + col as i64 * scale, y + row as i64 * scale);
            for dy in 0..scale {
                for dx in 0..scale {
                    put(img, px + dx, py + dy, color);
                }
            }
        }
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}
