use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::detection::domain::face_engine::{DetectionError, EngineInitError};

/// Blocking client shared by a remote engine's calls. `timeout` bounds
/// each request end to end.
pub fn build_client(timeout: Duration) -> Result<Client, EngineInitError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("facebatch/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Reads the body of `response` and decodes it as JSON.
///
/// Non-2xx responses become [`DetectionError::Status`] carrying the body.
pub fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, DetectionError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(DetectionError::Status {
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }
    parse_json(&body)
}

pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, DetectionError> {
    serde_json::from_str(body).map_err(|e| DetectionError::Response(e.to_string()))
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
