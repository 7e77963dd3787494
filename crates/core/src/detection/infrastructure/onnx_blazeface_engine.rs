/// BlazeFace face engine using ONNX Runtime via `ort`.
///
/// A lightweight classifier that provides bounding boxes only. The model
/// file must be supplied through `FDA_BLAZEFACE_MODEL_FILE`.
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::detection::domain::face_engine::{
    DetectionError, EngineInitError, EngineProvider, FaceEngine,
};
use crate::detection::domain::face_result::{FaceBox, FaceResult};
use crate::shared::settings::{EngineKind, Settings, BLAZEFACE_MODEL_FILE};

use super::image_source::load_rgb;
use super::math::{clip_to_image, nms, sigmoid, ScoredBox};
use super::onnx_session::{inference_error, SharedSession};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box deltas + keypoints).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceEngine {
    session: SharedSession,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceEngine {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, EngineInitError> {
        Ok(Self {
            session: SharedSession::load(model_path)?,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceEngine for OnnxBlazefaceEngine {
    fn name(&self) -> &str {
        EngineKind::Blazeface.name()
    }

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError> {
        let image = load_rgb(image_path)?;
        let (iw, ih) = image.dimensions();

        let input_tensor = preprocess(&image, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference_error)?;

        let mut candidates = {
            let mut session = self.session.lock()?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(inference_error)?;

            // regressors: [1, 896, 16], classificators: [1, 896, 1]
            if outputs.len() < 2 {
                return Err(DetectionError::Inference(format!(
                    "BlazeFace model expected 2 outputs, got {}",
                    outputs.len()
                )));
            }
            let regressors = outputs[0]
                .try_extract_array::<f32>()
                .map_err(inference_error)?;
            let scores = outputs[1]
                .try_extract_array::<f32>()
                .map_err(inference_error)?;
            let reg_data = regressors
                .as_slice()
                .ok_or_else(|| inference_error("cannot get regressor slice"))?;
            let score_data = scores
                .as_slice()
                .ok_or_else(|| inference_error("cannot get score slice"))?;

            decode_anchors(&self.anchors, reg_data, score_data, self.confidence, iw, ih)
        };

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

/// Resize to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(image: &RgbImage, size: u32) -> ndarray::Array4<f32> {
    let (src_w, src_h) = image.dimensions();
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as u32).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as u32).min(src_w - 1);
            let pixel = image.get_pixel(src_x, src_y).0;
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Generate BlazeFace anchors for the short-range model.
///
/// Two feature maps: 16×16 with 2 anchors per cell and 8×8 with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// Decode anchor-relative boxes whose score clears `confidence` into
/// image-pixel coordinates.
fn decode_anchors(
    anchors: &[[f32; 2]],
    reg_data: &[f32],
    score_data: &[f32],
    confidence: f64,
    image_width: u32,
    image_height: u32,
) -> Vec<ScoredBox> {
    let fw = image_width as f32;
    let fh = image_height as f32;
    let input = INPUT_SIZE as f32;
    let mut boxes = Vec::new();

    for (i, (&raw_score, anchor)) in score_data.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let cx = anchor[0] + reg_data[offset] / input;
        let cy = anchor[1] + reg_data[offset + 1] / input;
        let w = reg_data[offset + 2] / input;
        let h = reg_data[offset + 3] / input;

        boxes.push(ScoredBox {
            bbox: [
                ((cx - w / 2.0) * fw) as f64,
                ((cy - h / 2.0) * fh) as f64,
                ((cx + w / 2.0) * fw) as f64,
                ((cy + h / 2.0) * fh) as f64,
            ],
            score: score as f64,
        });
    }

    boxes
}

pub struct OnnxBlazefaceProvider;

impl EngineProvider for OnnxBlazefaceProvider {
    fn name(&self) -> &str {
        EngineKind::Blazeface.name()
    }

    fn required_settings(&self) -> &[&'static str] {
        &[BLAZEFACE_MODEL_FILE]
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError> {
        let model_path = PathBuf::from(settings.require(self.name(), BLAZEFACE_MODEL_FILE)?);
        let confidence = settings.confidence()?.unwrap_or(DEFAULT_CONFIDENCE);
        Ok(Box::new(OnnxBlazefaceEngine::new(&model_path, confidence)?))
    }
}
