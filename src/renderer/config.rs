use std::time::Duration;

use ash::vk;

/// how many frames may have outstanding GPU work at once
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// upper bound on a frame fence wait; exceeding it is treated as device loss
pub const FENCE_TIMEOUT: Duration = Duration::from_secs(10);

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Runtime knobs passed to `Renderer::init`
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// highest MSAA sample count the renderer will pick, even if the device allows more
    pub max_msaa_samples: vk::SampleCountFlags,
    /// validation layers and the debug messenger
    pub enable_validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_msaa_samples: vk::SampleCountFlags::TYPE_64,
            enable_validation: cfg!(debug_assertions),
        }
    }
}

pub(super) fn fence_timeout_nanos() -> u64 {
    FENCE_TIMEOUT.as_nanos() as u64
}
