use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no physical device supports graphics, presentation and the swapchain extension")]
    NoSuitableDevice,

    #[error("no memory type matches type bits {type_bits:#b} with properties {properties:?}")]
    NoCompatibleMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    #[error("none of {candidates:?} support {features:?} with {tiling:?} tiling")]
    NoSupportedFormat {
        candidates: Vec<vk::Format>,
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    },

    #[error("missing required layer: {0}")]
    MissingLayer(String),

    #[error("missing required extension: {0}")]
    MissingExtension(String),

    #[error("texture format {0:?} does not support linear blitting")]
    LinearBlitUnsupported(vk::Format),

    #[error("no swapchain to draw to")]
    NoSwapchain,

    #[error("timed out waiting on a frame fence (device lost?)")]
    FenceTimeout,

    #[error("failed to load shader {path:?}")]
    Shader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("window error: {0}")]
    Window(String),

    #[error("vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

impl From<sdl3::Error> for RendererError {
    fn from(error: sdl3::Error) -> Self {
        Self::Window(error.to_string())
    }
}
