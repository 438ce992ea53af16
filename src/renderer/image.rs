use ash::vk;

use super::RendererError;
use super::commands::CommandPool;
use super::device::DeviceContext;
use super::memory::{Image, ImageDescription};

/// floor(log2(max(width, height))) + 1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// the extent of the mip level after `extent`: halved, rounded down, never below 1
pub fn next_mip_extent(extent: vk::Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: (extent.width / 2).max(1),
        height: (extent.height / 2).max(1),
    }
}

/// The source/destination access masks and pipeline stages for a layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// # Panics
///
/// on any layout pair the renderer never issues
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> TransitionMasks {
    use vk::ImageLayout as L;

    let (src_access, dst_access, src_stage, dst_stage) = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        (old, new) => panic!("unsupported image layout transition: {old:?} -> {new:?}"),
    };

    TransitionMasks {
        src_access,
        dst_access,
        src_stage,
        dst_stage,
    }
}

pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

fn aspect_for(format: vk::Format, layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    if layout != vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        vk::ImageAspectFlags::COLOR
    } else if has_stencil_component(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

/// Records a barrier moving `levels` mip levels starting at `base_level`
fn record_transition(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: &Image,
    base_level: u32,
    levels: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) {
    let masks = transition_masks(old, new);

    let subresource_range = vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_for(image.format, new))
        .base_mip_level(base_level)
        .level_count(levels)
        .base_array_layer(0)
        .layer_count(1);

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image.image)
        .subresource_range(subresource_range)
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            masks.src_stage,
            masks.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        )
    };
}

/// Transitions every mip level of `image`, blocking until done
pub fn transition_image_layout(
    ctx: &DeviceContext,
    commands: &CommandPool,
    image: &Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<(), RendererError> {
    // checked before recording so a bad pair panics outside the command buffer
    transition_masks(old, new);

    commands.run_one_time(ctx.graphics_queue, |device, command_buffer| {
        record_transition(device, command_buffer, image, 0, image.mip_levels, old, new);
    })
}

/// Copies tightly packed pixels from `buffer` into mip level 0, which must be TRANSFER_DST
pub fn copy_buffer_to_image(
    ctx: &DeviceContext,
    commands: &CommandPool,
    buffer: vk::Buffer,
    image: &Image,
) -> Result<(), RendererError> {
    let region = vk::BufferImageCopy::default()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: image.extent.width,
            height: image.extent.height,
            depth: 1,
        });

    commands.run_one_time(ctx.graphics_queue, |device, command_buffer| unsafe {
        device.cmd_copy_buffer_to_image(
            command_buffer,
            buffer,
            image.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        )
    })
}

/// Fills levels 1.. by repeatedly blitting the previous level at half size
///
/// Expects every level in TRANSFER_DST; leaves every level in SHADER_READ_ONLY.
pub fn generate_mipmaps(
    ctx: &DeviceContext,
    commands: &CommandPool,
    image: &Image,
) -> Result<(), RendererError> {
    let format_properties = ctx.format_properties(image.format);
    if !format_properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    {
        return Err(RendererError::LinearBlitUnsupported(image.format));
    }

    commands.run_one_time(ctx.graphics_queue, |device, command_buffer| {
        let mut extent = image.extent;

        for level in 1..image.mip_levels {
            let next = next_mip_extent(extent);

            record_transition(
                device,
                command_buffer,
                image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );

            let blit = vk::ImageBlit::default()
                .src_offsets([vk::Offset3D::default(), far_corner(extent)])
                .src_subresource(color_layer(level - 1))
                .dst_offsets([vk::Offset3D::default(), far_corner(next)])
                .dst_subresource(color_layer(level));

            unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    image.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                )
            };

            record_transition(
                device,
                command_buffer,
                image,
                level - 1,
                1,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );

            extent = next;
        }

        // the last level was only ever a blit destination
        record_transition(
            device,
            command_buffer,
            image,
            image.mip_levels - 1,
            1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    })
}

fn far_corner(extent: vk::Extent2D) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    }
}

fn color_layer(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(mip_level)
        .base_array_layer(0)
        .layer_count(1)
}

/// The first candidate whose `tiling` features (from `query`) include `features`
pub fn find_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    query: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format, RendererError> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let properties = query(format);
            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| RendererError::NoSupportedFormat {
            candidates: candidates.to_vec(),
            tiling,
            features,
        })
}

pub struct ImageView {
    pub view: vk::ImageView,
    device: ash::Device,
}

impl ImageView {
    pub fn create(
        device: &ash::Device,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> Result<Self, RendererError> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(mip_levels)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { device.create_image_view(&create_info, None)? };

        Ok(Self {
            view,
            device: device.clone(),
        })
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.view, None) };
    }
}

/// A render target owned by the swapchain: the multisampled color or the depth buffer
pub struct Attachment {
    // view before image, so the view is destroyed first
    pub view: ImageView,
    pub image: Image,
}

impl Attachment {
    pub fn color(
        ctx: &DeviceContext,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self, RendererError> {
        Self::create(
            ctx,
            format,
            extent,
            vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )
    }

    pub fn depth(
        ctx: &DeviceContext,
        commands: &CommandPool,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self, RendererError> {
        let attachment = Self::create(
            ctx,
            format,
            extent,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;

        transition_image_layout(
            ctx,
            commands,
            &attachment.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        Ok(attachment)
    }

    fn create(
        ctx: &DeviceContext,
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self, RendererError> {
        let image = Image::create(
            ctx,
            &ImageDescription {
                extent,
                mip_levels: 1,
                samples: ctx.msaa_samples,
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;
        let view = ImageView::create(&ctx.device, image.image, format, aspect_mask, 1)?;

        Ok(Self { view, image })
    }
}
