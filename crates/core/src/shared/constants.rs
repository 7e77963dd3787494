pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Maximum number of images undergoing detection at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Extensions picked up by the `list` command when no `--type` is given.
pub const DEFAULT_LIST_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Input files with these extensions are treated as image lists (batch mode).
pub const TABLE_EXTENSIONS: &[&str] = &["csv", "tsv"];

pub const PATH_COLUMN: &str = "path";
pub const COUNT_COLUMN: &str = "count";
pub const COUNT_SUFFIX: &str = ":count";
pub const DETAIL_SUFFIX: &str = ":detail";

pub const DEFAULT_OUTPUT_PATH: &str = "./output.tsv";
pub const ANNOTATED_PREFIX: &str = "_annotated_";

pub const DEFAULT_AZURE_REGION: &str = "eastus";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
