//! Viewer configuration loading and defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Default camera position
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],
    /// Default orbit target
    #[serde(default)]
    pub target: [f32; 3],
    /// Vertical field of view in degrees
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    /// Closest allowed distance to the target
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,
    /// Farthest allowed distance from the target
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "default_true")]
    pub enable_damping: bool,
    /// Fraction of the pending orbit/pan input applied per tick
    #[serde(default = "default_damping_factor")]
    pub damping_factor: f32,
    #[serde(default = "default_one")]
    pub rotate_speed: f32,
    #[serde(default = "default_one")]
    pub zoom_speed: f32,
    #[serde(default = "default_one")]
    pub pan_speed: f32,
    /// Nudge step as a fraction of the distance to the target
    #[serde(default = "default_nudge_fraction")]
    pub nudge_fraction: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            target: [0.0, 0.0, 0.0],
            fov_degrees: default_fov(),
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            enable_damping: true,
            damping_factor: default_damping_factor(),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            nudge_fraction: default_nudge_fraction(),
        }
    }
}

fn default_camera_position() -> [f32; 3] {
    [0.0, 2.0, 6.0]
}

fn default_fov() -> f32 {
    45.0
}

fn default_min_distance() -> f32 {
    0.5
}

fn default_max_distance() -> f32 {
    25.0
}

fn default_damping_factor() -> f32 {
    0.05
}

fn default_nudge_fraction() -> f32 {
    0.1
}

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,
    #[serde(default = "default_zoom_in")]
    pub zoom_in_factor: f32,
    #[serde(default = "default_zoom_out")]
    pub zoom_out_factor: f32,
    /// Yaw speed in radians per second while auto-rotate is on
    #[serde(default = "default_auto_rotate_speed")]
    pub auto_rotate_speed: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            zoom_in_factor: default_zoom_in(),
            zoom_out_factor: default_zoom_out(),
            auto_rotate_speed: default_auto_rotate_speed(),
        }
    }
}

fn default_min_scale() -> f32 {
    0.1
}

fn default_max_scale() -> f32 {
    5.0
}

fn default_zoom_in() -> f32 {
    1.2
}

fn default_zoom_out() -> f32 {
    0.8
}

fn default_auto_rotate_speed() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Prefix for relative catalog locators (directory or URL)
    #[serde(default = "default_assets_base")]
    pub base: String,
    /// Catalog file replacing the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    /// Model ids to warm into the cache at start-up
    #[serde(default)]
    pub preload: Vec<String>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base: default_assets_base(),
            catalog: None,
            preload: Vec::new(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_assets_base() -> String {
    "./assets".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_title() -> String {
    "MedAR Anatomy Viewer".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    800
}

impl ViewerConfig {
    /// Load configuration from file, falling back to defaults when missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ViewerConfig = toml::from_str(&content)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            info!(
                path = %path.display(),
                "Configuration file not found, using defaults"
            );
            Ok(Self::default())
        }
    }

    /// Write a default configuration file
    pub fn save_default(path: &Path) -> Result<(), ConfigError> {
        let config = ViewerConfig {
            assets: AssetsConfig {
                preload: vec!["heart".to_string()],
                ..AssetsConfig::default()
            },
            ..ViewerConfig::default()
        };
        let content = toml::to_string_pretty(&config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
