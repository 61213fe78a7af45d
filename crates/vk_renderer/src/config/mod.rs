//! Configuration system
//!
//! Every field has a serde default, so a config file only needs the values it
//! changes and an absent file means [`EngineConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::render::backends::vulkan::state::sync::{DEFAULT_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            ConfigFormat::Toml => Self::from_toml_str(&contents),
            ConfigFormat::Ron => Self::from_ron_str(&contents),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Parse from TOML text
    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse from RON text
    fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window creation parameters
    pub window: WindowConfig,
    /// Renderer parameters
    pub renderer: RendererConfig,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: LogLevel,
}

impl Config for EngineConfig {}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Renderer".to_string(),
            width: 1600,
            height: 900,
        }
    }
}

/// Renderer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Number of frame slots; clamped to `1..=8`
    pub frames_in_flight: usize,
    /// Request the Khronos validation layer; `None` means debug builds only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_validation: Option<bool>,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// SPIR-V shader locations
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Frame slot count after clamping
    pub fn effective_frames_in_flight(&self) -> usize {
        let clamped = self.frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT);
        if clamped != self.frames_in_flight {
            log::warn!(
                "frames_in_flight {} out of range, using {clamped}",
                self.frames_in_flight
            );
        }
        clamped
    }

    /// Whether the validation layer should be requested
    pub fn validation_requested(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Triangle".to_string(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            enable_validation: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
        }
    }
}

/// Shader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("assets/shaders/vert.spv", "assets/shaders/frag.spv")
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Startup milestones
    #[default]
    Info,
    /// Resource creation
    Debug,
    /// Per-frame stages
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window.title, "Vulkan Renderer");
        assert_eq!(config.window.width, 1600);
        assert_eq!(config.window.height, 900);
        assert_eq!(config.renderer.frames_in_flight, 2);
        assert_eq!(config.renderer.shaders.vertex_shader_path, "assets/shaders/vert.spv");
        assert_eq!(config.renderer.shaders.fragment_shader_path, "assets/shaders/frag.spv");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            log_level = "debug"

            [window]
            title = "Triangle"

            [renderer]
            frames_in_flight = 3
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Triangle");
        assert_eq!(config.window.width, 1600);
        assert_eq!(config.renderer.frames_in_flight, 3);
        assert_relative_eq!(config.renderer.clear_color[1], 0.2);
        assert_eq!(config.renderer.shaders, ShaderConfig::default());
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_ron_partial_uses_defaults() {
        let config = EngineConfig::from_ron_str(
            r#"(
                window: (width: 800, height: 600),
                renderer: (enable_validation: Some(false)),
            )"#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Vulkan Renderer");
        assert_eq!(config.renderer.enable_validation, Some(false));
        assert!(!config.renderer.validation_requested());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("[window\nwidth = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_frames_in_flight_clamped() {
        let mut renderer = RendererConfig::default();
        assert_eq!(renderer.effective_frames_in_flight(), 2);
        renderer.frames_in_flight = 0;
        assert_eq!(renderer.effective_frames_in_flight(), 1);
        renderer.frames_in_flight = 64;
        assert_eq!(renderer.effective_frames_in_flight(), 8);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = EngineConfig::load_from_file("config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
        assert!(matches!(ConfigFormat::from_path(Path::new("a.json")), Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let path = std::env::temp_dir().join(format!("vk_renderer_config_{}.toml", std::process::id()));
        let mut config = EngineConfig::default();
        config.window.title = "Saved".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
