/// YOLO face engine using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// Landmark keypoints in the model output are ignored.
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::detection::domain::face_engine::{
    DetectionError, EngineInitError, EngineProvider, FaceEngine,
};
use crate::detection::domain::face_result::{FaceBox, FaceResult};
use crate::shared::constants::{YOLO_MODEL_NAME, YOLO_MODEL_URL};
use crate::shared::settings::{EngineKind, Settings, YOLO_MODEL_FILE};

use super::image_source::load_rgb;
use super::math::{clip_to_image, nms, ScoredBox};
use super::model_resolver::ModelResolver;
use super::onnx_session::{inference_error, SharedSession};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face engine backed by a shared ONNX Runtime session.
pub struct OnnxYoloEngine {
    session: SharedSession,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloEngine {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, EngineInitError> {
        let session = SharedSession::load(model_path)?;

        let input_size = {
            let guard = session.lock().map_err(|e| EngineInitError::Model {
                path: model_path.to_path_buf(),
                message: e.to_string(),
            })?;
            guard
                .inputs()
                .first()
                .and_then(|input| {
                    if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                        // [N, C, H, W]; square input so H is enough
                        if shape.len() >= 4 && shape[2] > 0 {
                            Some(shape[2] as u32)
                        } else {
                            None
                        }
                    } else {
                        None
                    }
                })
                .unwrap_or(DEFAULT_INPUT_SIZE)
        };

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceEngine for OnnxYoloEngine {
    fn name(&self) -> &str {
        EngineKind::Yolo.name()
    }

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError> {
        let image = load_rgb(image_path)?;
        let (iw, ih) = image.dimensions();

        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, lb) = letterbox(&image, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference_error)?;
        let mut candidates = {
            let mut session = self.session.lock()?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(inference_error)?;
            if outputs.len() == 0 {
                return Err(DetectionError::Inference(
                    "YOLO model produced no outputs".to_string(),
                ));
            }
            let tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(inference_error)?;
            let data = tensor
                .as_slice()
                .ok_or_else(|| inference_error("cannot get tensor slice"))?;
            decode_predictions(tensor.shape(), data, self.confidence, &lb)?
        };

        // 3. NMS
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        let faces = kept
            .iter()
            .map(|d| {
                let (x, y, w, h) = clip_to_image(&d.bbox, iw, ih);
                FaceBox::from_pixels(x, y, w, h, iw, ih).with_confidence(d.score)
            })
            .collect();

        Ok(FaceResult::new(self.name(), faces))
    }
}

/// Mapping from letterboxed model coordinates back to the source image.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_source(self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize an image to `target_size` × `target_size`.
fn letterbox(image: &RgbImage, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let (src_w, src_h) = image.dimensions();
    let fw = src_w as f64;
    let fh = src_h as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let pixel = image.get_pixel(src_x, src_y).0;
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Parses raw YOLO output into candidate boxes in source-image coordinates.
///
/// Output shape is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; each row starts `[cx, cy, w, h, conf, ...]`.
fn decode_predictions(
    shape: &[usize],
    data: &[f32],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Vec<ScoredBox>, DetectionError> {
    if shape.len() != 3 {
        return Err(DetectionError::Inference(format!(
            "unexpected YOLO output shape: {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(DetectionError::Inference(format!(
            "YOLO output too small for shape {shape:?}"
        )));
    }

    let at = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = at(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
        boxes.push(ScoredBox {
            bbox: [x1, y1, x2, y2],
            score: conf,
        });
    }
    Ok(boxes)
}

/// Builds [`OnnxYoloEngine`] from settings.
///
/// Uses `FDA_YOLO_MODEL_FILE` when set, otherwise the cached or downloaded
/// default model.
pub struct OnnxYoloProvider {
    resolver: ModelResolver,
}

impl OnnxYoloProvider {
    pub fn new(resolver: ModelResolver) -> Self {
        Self { resolver }
    }

    fn model_path(&self, settings: &Settings) -> Result<PathBuf, EngineInitError> {
        if let Some(path) = settings.get(YOLO_MODEL_FILE) {
            return Ok(PathBuf::from(path));
        }
        log::info!("Resolving model: {YOLO_MODEL_NAME}");
        self.resolver
            .resolve(YOLO_MODEL_NAME, YOLO_MODEL_URL)
            .map_err(|e| EngineInitError::ModelResolve(Box::new(e)))
    }
}

impl EngineProvider for OnnxYoloProvider {
    fn name(&self) -> &str {
        EngineKind::Yolo.name()
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError> {
        let confidence = settings.confidence()?.unwrap_or(DEFAULT_CONFIDENCE);
        let model_path = self.model_path(settings)?;
        Ok(Box::new(OnnxYoloEngine::new(&model_path, confidence)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_image(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([value, value, value]))
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, content 640x320, vertical pad 160
        let (tensor, lb) = letterbox(&uniform_image(200, 100, 255), 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_square_image_has_no_padding() {
        let (_, lb) = letterbox(&uniform_image(100, 100, 0), 640);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let (tensor, _) = letterbox(&uniform_image(200, 100, 255), 640);
        // Padding row keeps the gray fill, content row is white
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0);
        assert_relative_eq!(tensor[[0, 0, 320, 320]], 1.0);
    }

    #[test]
    fn test_letterbox_to_source_inverts_padding_and_scale() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 10,
            pad_y: 20,
        };
        let (x, y) = lb.to_source(110.0, 220.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 100.0);
    }

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_decode_row_major_filters_by_confidence() {
        // [1, 6 detections, 5 features]; rows after the second are empty
        let mut data = vec![0.0f32; 6 * 5];
        data[..10].copy_from_slice(&[
            50.0, 50.0, 20.0, 20.0, 0.9, //
            10.0, 10.0, 4.0, 4.0, 0.1,
        ]);
        let boxes = decode_predictions(&[1, 6, 5], &data, 0.25, &identity()).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].bbox, [40.0, 40.0, 60.0, 60.0]);
        assert_relative_eq!(boxes[0].score, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_transposed_layout() {
        // [1, 5 features, 6 detections]; only detection 3 is confident
        let mut data = vec![0.0f32; 5 * 6];
        let set = |data: &mut Vec<f32>, feat: usize, val: f32| data[feat * 6 + 3] = val;
        set(&mut data, 0, 100.0);
        set(&mut data, 1, 80.0);
        set(&mut data, 2, 40.0);
        set(&mut data, 3, 20.0);
        set(&mut data, 4, 0.8);

        let boxes = decode_predictions(&[1, 5, 6], &data, 0.25, &identity()).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].bbox, [80.0, 70.0, 120.0, 90.0]);
    }

    #[test]
    fn test_decode_rejects_unexpected_shape() {
        assert!(decode_predictions(&[1, 5], &[0.0; 5], 0.25, &identity()).is_err());
        assert!(decode_predictions(&[1, 2, 5], &[0.0; 3], 0.25, &identity()).is_err());
    }

    #[test]
    fn test_provider_prefers_configured_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let provider = OnnxYoloProvider::new(ModelResolver::with_cache_dir(dir.path()));
        let settings = Settings::new().with_value(YOLO_MODEL_FILE, "/models/custom.onnx");
        assert_eq!(
            provider.model_path(&settings).unwrap(),
            PathBuf::from("/models/custom.onnx")
        );
    }

    #[test]
    fn test_provider_uses_cached_default_model() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join(YOLO_MODEL_NAME);
        std::fs::write(&cached, b"fake model").unwrap();
        let provider = OnnxYoloProvider::new(ModelResolver::with_cache_dir(dir.path()));
        assert_eq!(provider.model_path(&Settings::new()).unwrap(), cached);
    }
}
