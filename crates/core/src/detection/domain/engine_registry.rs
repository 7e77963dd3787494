use thiserror::Error;

use crate::detection::domain::face_engine::{EngineInitError, EngineProvider, FaceEngine};
use crate::shared::settings::{ConfigError, Settings};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no face detection engine specified")]
    NoEngine,
    #[error("engine '{name}' is not available in this build (available: {available})")]
    Unavailable { name: String, available: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to initialize engine '{engine}': {source}")]
    Init {
        engine: String,
        #[source]
        source: EngineInitError,
    },
}

/// Resolves engine names to providers and initializes them.
///
/// The provider list is fixed at construction; selecting engines never
/// mutates the registry.
pub struct EngineRegistry {
    providers: Vec<Box<dyn EngineProvider>>,
}

impl EngineRegistry {
    pub fn new(providers: Vec<Box<dyn EngineProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Initializes the engines selected in `settings`, in selection order.
    pub fn select_from_settings(
        &self,
        settings: &Settings,
    ) -> Result<Vec<Box<dyn FaceEngine>>, RegistryError> {
        let names: Vec<&str> = settings
            .selected_engines()
            .into_iter()
            .map(|kind| kind.name())
            .collect();
        self.select(&names, settings)
    }

    /// Initializes exactly the requested engines, in the requested order.
    ///
    /// Every provider's required settings are checked before any engine is
    /// initialized, so a missing credential fails before a model is loaded.
    /// Any initialization failure aborts the whole selection.
    pub fn select(
        &self,
        requested: &[&str],
        settings: &Settings,
    ) -> Result<Vec<Box<dyn FaceEngine>>, RegistryError> {
        let mut chosen: Vec<&dyn EngineProvider> = Vec::with_capacity(requested.len());
        for &name in requested {
            if chosen.iter().any(|p| p.name() == name) {
                continue;
            }
            let provider = self
                .providers
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| RegistryError::Unavailable {
                    name: name.to_string(),
                    available: self.provider_names().join(", "),
                })?;
            chosen.push(provider.as_ref());
        }

        if chosen.is_empty() {
            return Err(RegistryError::NoEngine);
        }

        for provider in &chosen {
            for &key in provider.required_settings() {
                settings.require(provider.name(), key)?;
            }
        }

        let mut engines = Vec::with_capacity(chosen.len());
        for provider in chosen {
            let engine = provider
                .initialize(settings)
                .map_err(|source| RegistryError::Init {
                    engine: provider.name().to_string(),
                    source,
                })?;
            log::info!("Using engine {}", engine.name());
            engines.push(engine);
        }

        Ok(engines)
    }
}
