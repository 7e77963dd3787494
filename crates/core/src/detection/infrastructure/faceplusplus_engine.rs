use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::detection::domain::face_engine::{
    DetectionError, EngineInitError, EngineProvider, FaceEngine,
};
use crate::detection::domain::face_result::{FaceBox, FaceResult};
use crate::shared::settings::{
    EngineKind, Settings, FACEPLUSPLUS_API_KEY, FACEPLUSPLUS_API_SECRET,
};

use super::http::{build_client, read_json};
use super::image_source::{dimensions, read_bytes};

const DETECT_ENDPOINT: &str = "https://api-us.faceplusplus.com/facepp/v3/detect";

pub struct FacePlusPlusEngine {
    client: Client,
    api_key: String,
    api_secret: String,
}

impl FacePlusPlusEngine {
    pub fn new(client: Client, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<Face>,
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Face {
    face_rectangle: Rectangle,
}

#[derive(Deserialize, Debug)]
struct Rectangle {
    top: i32,
    left: i32,
    width: i32,
    height: i32,
}

fn to_faces(
    response: DetectResponse,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<FaceBox>, DetectionError> {
    if let Some(message) = response.error_message {
        return Err(DetectionError::Response(message));
    }
    Ok(response
        .faces
        .into_iter()
        .map(|f| {
            let r = f.face_rectangle;
            FaceBox::from_pixels(r.left, r.top, r.width, r.height, image_width, image_height)
        })
        .collect())
}

impl FaceEngine for FacePlusPlusEngine {
    fn name(&self) -> &str {
        EngineKind::FacePlusPlus.name()
    }

    fn detect(&self, image_path: &Path) -> Result<FaceResult, DetectionError> {
        let (iw, ih) = dimensions(image_path)?;
        let encoded = STANDARD.encode(read_bytes(image_path)?);

        let response = self
            .client
            .post(DETECT_ENDPOINT)
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("api_secret", self.api_secret.as_str()),
                ("image_base64", encoded.as_str()),
            ])
            .send()?;
        let parsed: DetectResponse = read_json(response)?;

        Ok(FaceResult::new(self.name(), to_faces(parsed, iw, ih)?))
    }
}

pub struct FacePlusPlusProvider;

impl EngineProvider for FacePlusPlusProvider {
    fn name(&self) -> &str {
        EngineKind::FacePlusPlus.name()
    }

    fn required_settings(&self) -> &[&'static str] {
        &[FACEPLUSPLUS_API_KEY, FACEPLUSPLUS_API_SECRET]
    }

    fn initialize(&self, settings: &Settings) -> Result<Box<dyn FaceEngine>, EngineInitError> {
        let key = settings.require(self.name(), FACEPLUSPLUS_API_KEY)?;
        let secret = settings.require(self.name(), FACEPLUSPLUS_API_SECRET)?;
        let client = build_client(settings.http_timeout()?)?;
        Ok(Box::new(FacePlusPlusEngine::new(client, key, secret)))
    }
}
