use ash::vk;
use image::DynamicImage;
use log::*;

use super::RendererError;
use super::commands::CommandPool;
use super::config::TEXTURE_FORMAT;
use super::device::DeviceContext;
use super::image::{
    ImageView, copy_buffer_to_image, generate_mipmaps, mip_level_count, transition_image_layout,
};
use super::memory::{Buffer, Image, ImageDescription};

/// A sampled, fully mipmapped texture
pub struct Texture {
    pub sampler: vk::Sampler,
    pub view: ImageView,
    #[expect(unused)] // sampled through `view`, held until drop
    pub image: Image,
    device: ash::Device,
}

impl Texture {
    /// Uploads `image` as sRGB RGBA8 and generates its mip chain
    pub fn create(
        ctx: &DeviceContext,
        commands: &CommandPool,
        image: &DynamicImage,
        source_file_name: &str,
    ) -> Result<Self, RendererError> {
        let pixels = image.to_rgba8();
        let (width, height) = pixels.dimensions();
        let mip_levels = mip_level_count(width, height);

        let staging = Buffer::create(
            ctx,
            pixels.as_raw().len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write(pixels.as_raw().as_slice())?;

        let texture_image = Image::create(
            ctx,
            &ImageDescription {
                extent: vk::Extent2D { width, height },
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                // blits read from earlier levels, so the image is also a transfer source
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        transition_image_layout(
            ctx,
            commands,
            &texture_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        copy_buffer_to_image(ctx, commands, staging.buffer, &texture_image)?;
        drop(staging);

        generate_mipmaps(ctx, commands, &texture_image)?;

        let view = ImageView::create(
            &ctx.device,
            texture_image.image,
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
            mip_levels,
        )?;

        let sampler_info = sampler_create_info(mip_levels, ctx.max_sampler_anisotropy);
        let sampler = unsafe { ctx.device.create_sampler(&sampler_info, None)? };

        debug!("loaded texture {source_file_name}: {width}x{height}, {mip_levels} mip levels");

        Ok(Self {
            sampler,
            view,
            image: texture_image,
            device: ctx.device.clone(),
        })
    }

    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(self.view.view)
            .sampler(self.sampler)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}

/// Linear filtering across every mip level; anisotropic only when the device supports it
pub fn sampler_create_info(
    mip_levels: u32,
    max_anisotropy: Option<f32>,
) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(max_anisotropy.is_some())
        .max_anisotropy(max_anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
}
