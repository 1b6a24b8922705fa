use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::pipeline::services::factory::PipelineConfiguration;

/// Process-wide settings.
///
/// Sources, later ones winning: built-in defaults, an optional
/// `product-extractor.toml`, the flat variables `GEMINI_API_KEY`,
/// `STATIC_DIR`, `FRAME_SAMPLE_RATE`, `MAX_VIDEO_DURATION`, `MAX_FRAMES`,
/// `LOG_LEVEL`, and finally `PRODUCT_EXTRACTOR__*` with `__` separating
/// nested keys (e.g. `PRODUCT_EXTRACTOR__PIPELINE__MIN_ENHANCED=3`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini_api_key: String,
    pub gemini_endpoint: String,
    pub text_vision_model: String,
    pub image_model: String,
    pub static_dir: PathBuf,
    pub public_url_prefix: String,
    /// Seconds between sampled frames
    pub frame_sample_rate: u64,
    /// Longest accepted source video, in seconds
    pub max_video_duration: u64,
    pub max_frames: usize,
    pub log_level: String,
    pub yt_dlp_path: String,
    pub ffmpeg_path: String,
    pub pipeline: PipelineConfiguration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_vision_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            static_dir: PathBuf::from("./static"),
            public_url_prefix: "/static".to_string(),
            frame_sample_rate: 2,
            max_video_duration: 300,
            max_frames: 15,
            log_level: "info".to_string(),
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            pipeline: PipelineConfiguration::default(),
        }
    }
}

const FLAT_VARIABLES: &[(&str, &str)] = &[
    ("GEMINI_API_KEY", "gemini_api_key"),
    ("STATIC_DIR", "static_dir"),
    ("FRAME_SAMPLE_RATE", "frame_sample_rate"),
    ("MAX_VIDEO_DURATION", "max_video_duration"),
    ("MAX_FRAMES", "max_frames"),
    ("LOG_LEVEL", "log_level"),
];

impl Settings {
    /// Load settings from the default file name and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("product-extractor")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(file_stem, std::env::vars())
    }

    /// Load from `file_stem` with `vars` standing in for the process environment.
    pub fn load_with_env<I>(file_stem: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Map<String, String> = vars.into_iter().collect();

        let mut flat = Config::builder();
        for (variable, key) in FLAT_VARIABLES {
            flat = flat.set_override_option(*key, vars.get(*variable).cloned())?;
        }

        let settings: Settings = Config::builder()
            .add_source(File::with_name(file_stem).required(false))
            .add_source(flat.build()?)
            .add_source(
                Environment::with_prefix("PRODUCT_EXTRACTOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "Frame sample rate must be greater than 0".to_string(),
            ));
        }

        if self.max_frames == 0 {
            return Err(ConfigError::Invalid(
                "Max frames must be greater than 0".to_string(),
            ));
        }

        if self.max_video_duration == 0 {
            return Err(ConfigError::Invalid(
                "Max video duration must be greater than 0".to_string(),
            ));
        }

        self.pipeline.validate().map_err(ConfigError::Invalid)
    }

    /// The API key, or an error when the remote backend is required but unset.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::Missing("GEMINI_API_KEY"));
        }
        Ok(key)
    }
}
