pub mod azure_vision_engine;
pub mod engine_catalog;
pub mod faceplusplus_engine;
pub mod google_vision_engine;
pub mod http;
pub mod image_source;
pub mod math;
pub mod model_resolver;
pub mod onnx_blazeface_engine;
pub mod onnx_session;
pub mod onnx_yolo_engine;
