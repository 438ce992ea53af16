use ash::vk;

use super::RendererError;

/// What the renderer needs from the windowing layer
///
/// The renderer never creates windows; resize and minimize
/// notifications arrive through `Renderer::flag_resize`.
pub trait HostWindow {
    /// instance extensions required to present to this window
    fn instance_extensions(&self) -> Result<Vec<String>, RendererError>;

    fn create_surface(&self, instance: &ash::Instance) -> Result<vk::SurfaceKHR, RendererError>;

    /// the drawable size in pixels (not window coordinates)
    fn pixel_extent(&self) -> vk::Extent2D;
}

impl HostWindow for sdl3::video::Window {
    fn instance_extensions(&self) -> Result<Vec<String>, RendererError> {
        Ok(self.vulkan_instance_extensions()?)
    }

    fn create_surface(&self, instance: &ash::Instance) -> Result<vk::SurfaceKHR, RendererError> {
        // the sdl3 `ash` feature makes these the ash handle types
        Ok(self.vulkan_create_surface(instance.handle())?)
    }

    fn pixel_extent(&self) -> vk::Extent2D {
        let (width, height) = self.size_in_pixels();
        vk::Extent2D { width, height }
    }
}
