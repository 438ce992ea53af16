use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ash::vk;
use log::*;
use serde::{Deserialize, Serialize};

use crate::renderer::RendererConfig;
use crate::shaders::compiled_shader_path;
use crate::util::resolve_asset_path;

/// Names a JSON file overriding any of the defaults below
pub const CONFIG_ENV_VAR: &str = "MODEL_VIEWER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,

    /// asset paths are relative to the crate root unless absolute
    pub model_path: PathBuf,
    pub texture_path: PathBuf,
    pub vertex_shader_path: PathBuf,
    pub fragment_shader_path: PathBuf,

    pub frame_delay_ms: u64,
    /// upper bound on the MSAA sample count; rounded down to a power of two
    pub max_msaa_samples: u32,
    pub rotation_degrees_per_second: f64,
    /// defaults to on in debug builds
    pub enable_validation: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let compiled_dir: PathBuf = ["shaders", "compiled"].iter().collect();

        Self {
            window_title: "Model Viewer".to_string(),
            window_width: 800,
            window_height: 600,
            model_path: ["models", "viking_room.obj"].iter().collect(),
            texture_path: ["textures", "viking_room.png"].iter().collect(),
            vertex_shader_path: compiled_shader_path(&compiled_dir, "model", "vert"),
            fragment_shader_path: compiled_shader_path(&compiled_dir, "model", "frag"),
            frame_delay_ms: 15,
            max_msaa_samples: 64,
            rotation_degrees_per_second: 90.0,
            enable_validation: None,
        }
    }
}

impl AppConfig {
    /// Reads the file named by `MODEL_VIEWER_CONFIG`, or falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                debug!("{CONFIG_ENV_VAR} not set; using the default config");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path:?}"))?;
        let config = Self::from_json(&json)
            .with_context(|| format!("failed to parse config: {path:?}"))?;

        info!("loaded config from {path:?}");

        Ok(config)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        anyhow::ensure!(
            config.max_msaa_samples >= 1,
            "max_msaa_samples must be at least 1"
        );

        Ok(config)
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn model_file(&self) -> PathBuf {
        resolve_asset_path(&self.model_path)
    }

    pub fn texture_file(&self) -> PathBuf {
        resolve_asset_path(&self.texture_path)
    }

    pub fn vertex_shader_file(&self) -> PathBuf {
        resolve_asset_path(&self.vertex_shader_path)
    }

    pub fn fragment_shader_file(&self) -> PathBuf {
        resolve_asset_path(&self.fragment_shader_path)
    }

    pub fn renderer_config(&self) -> RendererConfig {
        let defaults = RendererConfig::default();

        RendererConfig {
            max_msaa_samples: sample_count_flags(self.max_msaa_samples),
            enable_validation: self.enable_validation.unwrap_or(defaults.enable_validation),
        }
    }
}

/// The largest Vulkan sample count not above `max`
pub fn sample_count_flags(max: u32) -> vk::SampleCountFlags {
    [
        (64, vk::SampleCountFlags::TYPE_64),
        (32, vk::SampleCountFlags::TYPE_32),
        (16, vk::SampleCountFlags::TYPE_16),
        (8, vk::SampleCountFlags::TYPE_8),
        (4, vk::SampleCountFlags::TYPE_4),
        (2, vk::SampleCountFlags::TYPE_2),
    ]
    .into_iter()
    .find(|&(count, _)| count <= max)
    .map_or(vk::SampleCountFlags::TYPE_1, |(_, flags)| flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_the_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_json_overrides_only_what_it_names() {
        let config = AppConfig::from_json(
            r#"{ "window_width": 1280, "model_path": "/models/teapot.obj", "enable_validation": false }"#,
        )
        .unwrap();

        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 600);
        assert_eq!(config.model_file(), PathBuf::from("/models/teapot.obj"));
        assert!(!config.renderer_config().enable_validation);
    }

    #[test]
    fn rejects_zero_samples() {
        assert!(AppConfig::from_json(r#"{ "max_msaa_samples": 0 }"#).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(AppConfig::from_json("{ window_width: ").is_err());
    }

    #[test]
    fn relative_asset_paths_resolve_under_the_crate() {
        let config = AppConfig::default();
        assert!(config.texture_file().starts_with(env!("CARGO_MANIFEST_DIR")));
        assert!(config.vertex_shader_file().ends_with("shaders/compiled/model.vert.spv"));
        assert!(config.fragment_shader_file().ends_with("shaders/compiled/model.frag.spv"));
    }

    #[test]
    fn sample_counts_round_down() {
        assert_eq!(sample_count_flags(1), vk::SampleCountFlags::TYPE_1);
        assert_eq!(sample_count_flags(4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(sample_count_flags(6), vk::SampleCountFlags::TYPE_4);
        assert_eq!(sample_count_flags(1000), vk::SampleCountFlags::TYPE_64);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = AppConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(result.is_err());
    }
}
