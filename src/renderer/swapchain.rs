use ash::khr;
use ash::vk;
use log::*;

use super::RendererError;
use super::config::PREFERRED_SURFACE_FORMAT;
use super::device::{DeviceContext, QueueFamilyIndices};
use super::image::{Attachment, ImageView};
use super::instance::Surface;

/// What a physical device can do with the surface
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(
        surface: &Surface,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, RendererError> {
        let loader = &surface.loader;
        unsafe {
            Ok(Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical_device, surface.handle)?,
                formats: loader
                    .get_physical_device_surface_formats(physical_device, surface.handle)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical_device, surface.handle)?,
            })
        }
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// B8G8R8A8_SRGB with the sRGB color space when offered, otherwise the first format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or(formats.first())
        .copied()
        .unwrap_or(PREFERRED_SURFACE_FORMAT)
}

/// MAILBOX when offered; FIFO is always available
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's fixed extent, or the window's pixel size clamped to the allowed range
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: window_extent.width.clamp(min.width, max.width),
        height: window_extent.height.clamp(min.height, max.height),
    }
}

/// One more than the minimum, bounded by the maximum (0 means unbounded)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// The swapchain parameters chosen for a surface; a pure function of its support and the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    pub fn choose(support: &SwapchainSupport, window_extent: vk::Extent2D) -> Self {
        let capabilities = &support.capabilities;

        Self {
            format: choose_surface_format(&support.formats),
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(capabilities, window_extent),
            image_count: choose_image_count(capabilities),
            pre_transform: capabilities.current_transform,
        }
    }
}

pub struct Swapchain {
    // views are destroyed before the swapchain that owns their images
    pub image_views: Vec<ImageView>,
    pub images: Vec<vk::Image>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub handle: vk::SwapchainKHR,
    pub loader: khr::swapchain::Device,
}

impl Swapchain {
    pub fn create(
        ctx: &DeviceContext,
        loader: &khr::swapchain::Device,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self, RendererError> {
        let support = SwapchainSupport::query(surface, ctx.physical_device)?;
        let SwapchainPlan {
            format,
            present_mode,
            extent,
            image_count,
            pre_transform,
        } = SwapchainPlan::choose(&support, window_extent);

        let queue_family_indices = [ctx.queue_families.graphics, ctx.queue_families.present];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        let create_info = match sharing_mode(&ctx.queue_families) {
            vk::SharingMode::CONCURRENT => create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices),
            sharing_mode => create_info.image_sharing_mode(sharing_mode),
        };

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };
        let mut swapchain = Self {
            image_views: vec![],
            images: vec![],
            format,
            extent,
            handle,
            loader: loader.clone(),
        };

        swapchain.images = unsafe { loader.get_swapchain_images(handle)? };
        for &image in &swapchain.images {
            let view = ImageView::create(
                &ctx.device,
                image,
                format.format,
                vk::ImageAspectFlags::COLOR,
                1,
            )?;
            swapchain.image_views.push(view);
        }

        info!(
            "created swapchain: {} images, {}x{}, {:?}, {:?}",
            swapchain.images.len(),
            extent.width,
            extent.height,
            format.format,
            present_mode
        );

        Ok(swapchain)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.image_views.clear();
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
    }
}

/// exclusive ownership when one family does both jobs, concurrent otherwise
pub fn sharing_mode(queue_families: &QueueFamilyIndices) -> vk::SharingMode {
    if queue_families.is_shared() {
        vk::SharingMode::EXCLUSIVE
    } else {
        vk::SharingMode::CONCURRENT
    }
}

/// The image views a framebuffer binds, in render pass attachment order
pub fn framebuffer_attachments(
    swapchain_view: vk::ImageView,
    color: Option<vk::ImageView>,
    depth: vk::ImageView,
) -> Vec<vk::ImageView> {
    match color {
        // multisampled color, depth, then the swapchain image as resolve target
        Some(color) => vec![color, depth, swapchain_view],
        None => vec![swapchain_view, depth],
    }
}

/// One framebuffer per swapchain image
pub struct Framebuffers {
    pub handles: Vec<vk::Framebuffer>,
    device: ash::Device,
}

impl Framebuffers {
    pub fn create(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        swapchain: &Swapchain,
        color: Option<&Attachment>,
        depth: &Attachment,
    ) -> Result<Self, RendererError> {
        let mut framebuffers = Self {
            handles: Vec::with_capacity(swapchain.image_count()),
            device: device.clone(),
        };

        for swapchain_view in &swapchain.image_views {
            let attachments = framebuffer_attachments(
                swapchain_view.view,
                color.map(|c| c.view.view),
                depth.view.view,
            );

            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(swapchain.extent.width)
                .height(swapchain.extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&create_info, None)? };
            framebuffers.handles.push(framebuffer);
        }

        Ok(framebuffers)
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for framebuffer in self.handles.drain(..) {
            unsafe { self.device.destroy_framebuffer(framebuffer, None) };
        }
    }
}
