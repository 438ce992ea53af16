use ash::vk;
use log::*;

use super::RendererError;
use super::commands::CommandPool;
use super::device::DeviceContext;
use super::gpu_write::{GPUWrite, write_to_gpu_buffer};

/// The first memory type allowed by `type_bits` that has every flag in `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32, RendererError> {
    let count = memory_properties.memory_type_count as usize;

    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
        .ok_or(RendererError::NoCompatibleMemoryType {
            type_bits,
            properties,
        })
}

/// A buffer and its dedicated memory allocation
pub struct Buffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    device: ash::Device,
}

impl Buffer {
    pub fn create(
        ctx: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self, RendererError> {
        let device = &ctx.device;

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = match allocate(ctx, requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let buffer = Self {
            buffer,
            memory,
            size,
            device: device.clone(),
        };
        unsafe { device.bind_buffer_memory(buffer.buffer, buffer.memory, 0)? };

        Ok(buffer)
    }

    /// Maps the whole buffer until `unmap`; the memory must be host visible
    pub fn map(&self) -> Result<*mut std::ffi::c_void, RendererError> {
        let mapped = unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?
        };
        Ok(mapped)
    }

    pub fn unmap(&self) {
        unsafe { self.device.unmap_memory(self.memory) };
    }

    /// Copies `elements` to the start of a host-visible buffer
    pub fn write<T: GPUWrite>(&self, elements: &[T]) -> Result<(), RendererError> {
        debug_assert!(std::mem::size_of_val(elements) as vk::DeviceSize <= self.size);
        unsafe { write_to_gpu_buffer(&self.device, self.memory, elements) }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Uploads `elements` into a new device-local buffer through a temporary staging buffer
///
/// Blocks until the copy has finished; the staging buffer is released on return.
pub fn upload_via_staging<T: GPUWrite>(
    ctx: &DeviceContext,
    commands: &CommandPool,
    elements: &[T],
    usage: vk::BufferUsageFlags,
) -> Result<Buffer, RendererError> {
    // zero-sized buffers are invalid, so an empty upload still gets one element's worth
    let size = (std::mem::size_of_val(elements) as vk::DeviceSize).max(1);

    let staging = Buffer::create(
        ctx,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    staging.write(elements)?;

    let destination = Buffer::create(
        ctx,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    commands.run_one_time(ctx.graphics_queue, |device, command_buffer| {
        let region = vk::BufferCopy::default().size(size);
        unsafe {
            device.cmd_copy_buffer(
                command_buffer,
                staging.buffer,
                destination.buffer,
                &[region],
            )
        };
    })?;

    trace!("uploaded {size} bytes for {usage:?}");

    Ok(destination)
}

/// A 2D image and its dedicated memory allocation
pub struct Image {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    device: ash::Device,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageDescription {
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
}

impl Image {
    pub fn create(ctx: &DeviceContext, desc: &ImageDescription) -> Result<Self, RendererError> {
        let device = &ctx.device;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(desc.samples);
        let image = unsafe { device.create_image(&image_info, None)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate(ctx, requirements, desc.properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let image = Self {
            image,
            memory,
            format: desc.format,
            extent: desc.extent,
            mip_levels: desc.mip_levels,
            device: device.clone(),
        };
        unsafe { device.bind_image_memory(image.image, image.memory, 0)? };

        Ok(image)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn allocate(
    ctx: &DeviceContext,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory, RendererError> {
    let memory_type_index = find_memory_type(
        &ctx.memory_properties,
        requirements.memory_type_bits,
        properties,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    Ok(unsafe { ctx.device.allocate_memory(&alloc_info, None)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            properties.memory_types[i].property_flags = *flags;
        }
        properties
    }

    #[test]
    fn memory_type_must_match_bits_and_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(find_memory_type(&props, 0b111, host).unwrap(), 2);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            1
        );
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            2
        );
    }

    #[test]
    fn no_compatible_memory_type() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let result = find_memory_type(&props, 0b01, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(
            result,
            Err(RendererError::NoCompatibleMemoryType { type_bits: 0b01, .. })
        ));
    }

    #[test]
    fn types_beyond_the_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        let result = find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(result.is_err());
    }
}
