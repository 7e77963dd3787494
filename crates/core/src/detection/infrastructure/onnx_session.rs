use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ort::session::Session;

use crate::detection::domain::face_engine::{DetectionError, EngineInitError};

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// An ONNX Runtime session behind a lock.
///
/// `Session::run` needs exclusive access, so concurrent `detect` calls on
/// the same engine queue here. Batch workers share one engine instance and
/// rely on this.
pub struct SharedSession {
    session: Mutex<Session>,
}

impl SharedSession {
    pub fn load(model_path: &Path) -> Result<Self, EngineInitError> {
        let model_error = |e: &dyn std::fmt::Display| EngineInitError::Model {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        };
        let session = Session::builder()
            .map_err(|e| model_error(&e))?
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| model_error(&e))?
            .commit_from_file(model_path)
            .map_err(|e| model_error(&e))?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Session>, DetectionError> {
        self.session
            .lock()
            .map_err(|e| DetectionError::Inference(format!("session lock poisoned: {e}")))
    }
}

pub fn inference_error(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}
