use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::detection::domain::face_engine::{
    DetectionError, EngineInitError, EngineProvider, FaceEngine,
};
use crate::detection::domain::face_result::{FaceBox, FaceResult};
use crate::shared::settings::{EngineKind, Settings, GOOGLE_API_KEY};

use super::http::{build_client, read_json};
use super::image_source::{dimensions, read_bytes};

const ANNOTATE_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Google Cloud Vision `FACE_DETECTION`.
pub struct GoogleVisionEngine {
    client: Client,
    api_key: String,
}

impl GoogleVisionEngine {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize, Debug)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    fd_bounding_poly: Option<BoundingPoly>,
    #[serde(default)]
    detection_confidence: f64,
}

#[derive(Deserialize, Debug)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

/// Zero coordinates are omitted from the wire format.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(default)]
struct Vertex {
    x: i32,
    y: i32,
}

fn request_body(content: &[u8]) -> serde_json::Value {
    json!({
        "requests": [{
            "image": { "content": STANDARD.encode(content) },
            "features": [{ "type": "FACE_DETECTION" }]
        }]
    })
}

/// Uses the tight `fdBoundingPoly`; vertex 0 is top-left, vertex 2
/// bottom-right. Annotations with fewer than three vertices are skipped.
fn to_faces(
    response: AnnotateResponse,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<FaceBox>, DetectionError> {
    let mut faces = Vec::new();
    for image in response.responses {
        if let Some(status) = image.error {
            return Err(DetectionError::Response(status.message));
        }
        for annotation in image.face_annotations {
            let Some(poly) = annotation.fd_bounding_poly else {
                continue;
            };
            if poly.vertices.len() < 3 {
                continue;
            }
            let (tl, br) = (poly.vertices[0], poly.vertices[2]);
            faces.push(
                FaceBox::from_pixels(
                    tl.x,
                    tl.y,
                    br.x - tl.x,
                    br.y - tl.y,
                    image_width,
                    image_height,
                )
                .with_confidence(annotation.detection_confidence),
            );
        }
    }
    Ok(faces)
}

impl FaceEngine for GoogleVisionEngine {
    fn name(&self) -> &str {
        EngineKind::Google.name()
    }

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError> {
        let (iw, ih) = dimensions(image_path)?;
        let content = read_bytes(image_path)?;

        let response = self
            .client
            .post(ANNOTATE_ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(request_body(&content).to_string())
            .send()?;
        let parsed: AnnotateResponse = read_json(response)?;

        Ok(FaceResult::new(self.name(), to_faces(parsed, iw, ih)?))
    }
}

pub struct GoogleVisionProvider;

impl EngineProvider for GoogleVisionProvider {
    fn name(&self) -> &str {
        EngineKind::Google.name()
    }

    fn required_settings(&self) -> &[&'static str] {
        &[GOOGLE_API_KEY]
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError> {
        let key = settings.require(self.name(), GOOGLE_API_KEY)?;
        let client = build_client(settings.http_timeout()?)?;
        Ok(Box::new(GoogleVisionEngine::new(client, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::http::parse_json;
    use approx::assert_relative_eq;

    #[test]
    fn test_request_body_embeds_base64_content() {
        let body = request_body(b"abc");
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(body["requests"][0]["features"][0]["type"], "FACE_DETECTION");
    }

    #[test]
    fn test_parses_bounding_poly() {
        let body = r#"{"responses": [{"faceAnnotations": [
            {"boundingPoly": {"vertices": [{"x": 1}, {"x": 90}, {"x": 90, "y": 80}, {"x": 1, "y": 80}]},
             "fdBoundingPoly": {"vertices": [{"x": 10, "y": 20}, {"x": 60, "y": 20},
                                             {"x": 60, "y": 70}, {"x": 10, "y": 70}]},
             "detectionConfidence": 0.93}
        ]}]}"#;
        let faces = to_faces(parse_json(body).unwrap(), 100, 200).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!((faces[0].x, faces[0].y, faces[0].width, faces[0].height), (10, 20, 50, 50));
        assert_relative_eq!(faces[0].percent_width, 0.5);
        assert_relative_eq!(faces[0].percent_height, 0.25);
        assert_relative_eq!(faces[0].confidence, 0.93);
    }

    #[test]
    fn test_missing_vertex_coordinates_default_to_zero() {
        let body = r#"{"responses": [{"faceAnnotations": [
            {"fdBoundingPoly": {"vertices": [{}, {"x": 30}, {"x": 30, "y": 40}, {"y": 40}]}}
        ]}]}"#;
        let faces = to_faces(parse_json(body).unwrap(), 100, 100).unwrap();
        assert_eq!((faces[0].x, faces[0].y, faces[0].width, faces[0].height), (0, 0, 30, 40));
        assert_eq!(faces[0].confidence, 0.0);
    }

    #[test]
    fn test_degenerate_polygons_are_skipped() {
        let body = r#"{"responses": [{"faceAnnotations": [
            {"fdBoundingPoly": {"vertices": [{"x": 1}, {"x": 2}]}},
            {"detectionConfidence": 0.5}
        ]}]}"#;
        assert!(to_faces(parse_json(body).unwrap(), 10, 10).unwrap().is_empty());
    }

    #[test]
    fn test_no_faces_is_empty() {
        assert!(to_faces(parse_json(r#"{"responses": [{}]}"#).unwrap(), 10, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_per_image_error_is_reported() {
        let body = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        let err = to_faces(parse_json(body).unwrap(), 10, 10).unwrap_err();
        assert!(matches!(err, DetectionError::Response(ref m) if m == "Bad image data."));
    }

    #[test]
    fn test_provider_requires_api_key() {
        assert!(GoogleVisionProvider.initialize(&Settings::new()).is_err());
        let settings = Settings::new().with_value(GOOGLE_API_KEY, "k");
        assert_eq!(GoogleVisionProvider.initialize(&settings).unwrap().name(), "google");
    }
}
