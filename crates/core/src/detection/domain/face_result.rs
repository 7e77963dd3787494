use serde::{Deserialize, Deserializer, Serialize};

/// One detected face: a pixel rectangle plus its size relative to the image.
///
/// `confidence` is 0 when the engine does not report one and is never
/// negative.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "width_per")]
    pub percent_width: f64,
    #[serde(rename = "height_per")]
    pub percent_height: f64,
    pub confidence: f64,
}

impl FaceBox {
    /// Builds a box from pixel geometry, deriving the relative size from
    /// the source image dimensions.
    pub fn from_pixels(
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            percent_width: ratio(width, image_width),
            percent_height: ratio(height, image_height),
            confidence: 0.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.max(0.0)
        } else {
            0.0
        };
        self
    }

    /// Right edge. Saturates, since boxes may come from untrusted detail JSON.
    pub fn max_x(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn max_y(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

fn ratio(part: i32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part.max(0) as f64 / whole as f64
    }
}

/// All faces one engine found in one image, in engine-native order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    #[serde(rename = "engine")]
    pub engine_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub faces: Vec<FaceBox>,
}

// Older detail files were written with `"faces":null` for face-less images.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FaceBox>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FaceBox>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FaceResult {
    pub fn new(engine_name: impl Into<String>, faces: Vec<FaceBox>) -> Self {
        Self {
            engine_name: engine_name.into(),
            faces,
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    /// JSON form stored in a `<engine>:detail` cell.
    pub fn to_detail_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_detail_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
