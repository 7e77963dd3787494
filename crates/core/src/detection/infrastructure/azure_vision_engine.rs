use std::path::Path;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::detection::domain::face_engine::{
    DetectionError, EngineInitError, EngineProvider, FaceEngine,
};
use crate::detection::domain::face_result::{FaceBox, FaceResult};
use crate::shared::settings::{EngineKind, Settings, AZURE_SUBSCRIPTION_KEY};

use super::http::{build_client, read_json};
use super::image_source::{dimensions, read_bytes};

const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Azure Computer Vision `analyze` endpoint with the `Faces` feature.
pub struct AzureVisionEngine {
    client: Client,
    endpoint: String,
    subscription_key: String,
}

impl AzureVisionEngine {
    pub fn new(client: Client, region: &str, subscription_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: analyze_endpoint(region),
            subscription_key: subscription_key.into(),
        }
    }
}

fn analyze_endpoint(region: &str) -> String {
    format!("https://{region}.api.cognitive.microsoft.com/vision/v2.0/analyze?visualFeatures=Faces")
}

#[derive(Deserialize, Debug)]
struct AnalyzeResponse {
    #[serde(default)]
    faces: Option<Vec<AzureFace>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AzureFace {
    face_rectangle: Rectangle,
}

#[derive(Deserialize, Debug)]
struct Rectangle {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

/// Azure does not report a per-face confidence; it stays 0.
fn to_faces(response: AnalyzeResponse, image_width: u32, image_height: u32) -> Vec<FaceBox> {
    response
        .faces
        .unwrap_or_default()
        .into_iter()
        .map(|f| {
            let r = f.face_rectangle;
            FaceBox::from_pixels(r.left, r.top, r.width, r.height, image_width, image_height)
        })
        .collect()
}

impl FaceEngine for AzureVisionEngine {
    fn name(&self) -> &str {
        EngineKind::Azure.name()
    }

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError> {
        let (iw, ih) = dimensions(image_path)?;
        let body = read_bytes(image_path)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(SUBSCRIPTION_HEADER, &self.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()?;
        let parsed: AnalyzeResponse = read_json(response)?;
        Ok(FaceResult::new(self.name(), to_faces(parsed, iw, ih)))
    }
}

pub struct AzureVisionProvider;

impl EngineProvider for AzureVisionProvider {
    fn name(&self) -> &str {
        EngineKind::Azure.name()
    }

    fn required_settings(&self) -> &[&'static str] {
        &[AZURE_SUBSCRIPTION_KEY]
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError> {
        let key = settings.require(self.name(), AZURE_SUBSCRIPTION_KEY)?;
        let client = build_client(settings.http_timeout()?)?;
        Ok(Box::new(AzureVisionEngine::new(
            client,
            settings.azure_region(),
            key,
        )))
    }
}
