use passage_pipeline::PipelineConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Base URL of the attendance backend.
    pub api_base_url: String,
    /// Maximum encoding distance accepted as a match.
    pub tolerance: f32,
    /// Liveness score below this is treated as a spoof.
    pub liveness_threshold: f32,
    /// Per-identity debounce between attendance actions.
    pub cooldown: Duration,
    /// Continuous unknown presence before the fallback flow starts.
    pub unknown_timeout: Duration,
    /// Tick cadence of the capture loop.
    pub tick_interval: Duration,
    /// Run full analysis on every Nth tick.
    pub frame_stride: u64,
    /// Downscale factor applied to frames before detection.
    pub detect_scale: f32,
    /// How long overlay feedback stays visible.
    pub display_duration: Duration,
    /// Attendance worker queue depth.
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from `PASSAGE_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("PASSAGE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/passage/models"));

        Self {
            camera_device: std::env::var("PASSAGE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            api_base_url: std::env::var("PASSAGE_API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            tolerance: env_f32("PASSAGE_TOLERANCE", 0.45),
            liveness_threshold: env_f32("PASSAGE_LIVENESS_THRESHOLD", 0.23),
            cooldown: Duration::from_secs(env_u64("PASSAGE_COOLDOWN_SECS", 10)),
            unknown_timeout: Duration::from_secs(env_u64("PASSAGE_UNKNOWN_TIMEOUT_SECS", 5)),
            tick_interval: Duration::from_millis(env_u64("PASSAGE_TICK_MS", 30)),
            frame_stride: env_u64("PASSAGE_FRAME_STRIDE", 5),
            detect_scale: env_f32("PASSAGE_DETECT_SCALE", 0.25),
            display_duration: Duration::from_secs(env_u64("PASSAGE_DISPLAY_SECS", 3)),
            queue_depth: env_u64("PASSAGE_QUEUE_DEPTH", 8) as usize,
        }
    }

    /// Path to the face detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("detector.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face encoding model.
    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("encoder.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the anti-spoofing model.
    pub fn liveness_model_path(&self) -> String {
        self.model_dir
            .join("OULU_Protocol_2_model_0_0.onnx")
            .to_string_lossy()
            .into_owned()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tolerance: self.tolerance,
            liveness_threshold: self.liveness_threshold,
            cooldown: self.cooldown,
            unknown_timeout: self.unknown_timeout,
            display_duration: self.display_duration,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
