use crate::detection::domain::engine_registry::EngineRegistry;
use crate::detection::domain::face_engine::EngineProvider;

use super::azure_vision_engine::AzureVisionProvider;
use super::faceplusplus_engine::FacePlusPlusProvider;
use super::google_vision_engine::GoogleVisionProvider;
use super::model_resolver::ModelResolver;
use super::onnx_blazeface_engine::OnnxBlazefaceProvider;
use super::onnx_yolo_engine::OnnxYoloProvider;

/// Every engine compiled into this build, in default column order.
pub fn default_providers(resolver: ModelResolver) -> Vec<Box<dyn EngineProvider>> {
    vec![
        Box::new(OnnxYoloProvider::new(resolver)),
        Box::new(OnnxBlazefaceProvider),
        Box::new(AzureVisionProvider),
        Box::new(GoogleVisionProvider),
        Box::new(FacePlusPlusProvider),
    ]
}

pub fn default_registry(resolver: ModelResolver) -> EngineRegistry {
    EngineRegistry::new(default_providers(resolver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::settings::EngineKind;

    #[test]
    fn test_every_engine_kind_has_a_provider() {
        let registry = default_registry(ModelResolver::with_cache_dir("/nonexistent"));
        let names = registry.provider_names();
        let expected: Vec<&str> = EngineKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, expected);
    }
}
