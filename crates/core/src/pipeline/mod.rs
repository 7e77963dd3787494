pub mod annotate_use_case;
pub mod batch_executor;
pub mod detect_batch_use_case;
pub mod detect_image_use_case;
pub mod infrastructure;
pub mod list_images_use_case;
pub mod pipeline_logger;
pub mod result_row;
