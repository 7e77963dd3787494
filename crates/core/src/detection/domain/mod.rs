pub mod engine_registry;
pub mod face_engine;
pub mod face_result;
