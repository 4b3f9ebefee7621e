// Metrologist Constants
// Protocol values are shared with the scoring engine. Do not change one side without the other.

// Engine stdout protocol
pub const SCORE_PREFIX: &str = "SCORE:";
pub const ENGINE_LOG_PREFIX: &str = "[engine]";

// Engine resolution
pub const ENGINE_NAME: &str = "metrologist-engine";
pub const ENGINE_PATH_ENV: &str = "METROLOGIST_ENGINE_PATH";
pub const PYTHON_PATH_ENV: &str = "METROLOGIST_PYTHON_PATH";
pub const DEFAULT_PYTHON: &str = "python";
pub const SCRIPT_EXTENSIONS: [&str; 2] = ["py", "vpy"];

// Job file
pub const DEFAULT_CONFIG_FILENAME: &str = "config.json";
pub const JSON_INDENT: &[u8] = b"    ";

// Butteraugli defaults
pub const BUTTERAUGLI_DEFAULT_INTENSITY_TARGET: i32 = 80;

// Statistics
pub const MEDIAN_PERCENTILE: f64 = 50.0;
pub const LOW_PERCENTILE_1: f64 = 1.0;
pub const LOW_PERCENTILE_5: f64 = 5.0;

// Random job generation bounds
pub const GENERATE_MAX_SCENES: usize = 6;
pub const GENERATE_MAX_VARIANTS: usize = 3;
pub const GENERATE_MAX_SCENE_LENGTH: u32 = 240;
