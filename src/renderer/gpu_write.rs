use ash::vk;

use super::RendererError;

/// A marker for plain-data types that get copied byte-for-byte into GPU memory
///
/// An implementing struct must be repr(C) with the layout its shader expects;
/// uniform blocks additionally need std140 alignment (align(16)).
pub trait GPUWrite: Copy {}

impl GPUWrite for u8 {}
impl GPUWrite for u32 {}

/// Maps `buffer_memory`, copies `elements` to its start, and unmaps it again
///
/// The memory must be host visible and coherent, and not in use by the GPU.
pub(super) unsafe fn write_to_gpu_buffer<T: GPUWrite>(
    device: &ash::Device,
    buffer_memory: vk::DeviceMemory,
    elements: &[T],
) -> Result<(), RendererError> {
    if elements.is_empty() {
        return Ok(());
    }
    let buffer_size = std::mem::size_of_val(elements) as vk::DeviceSize;

    unsafe {
        let mapped_dst =
            device.map_memory(buffer_memory, 0, buffer_size, Default::default())? as *mut T;
        std::ptr::copy_nonoverlapping(elements.as_ptr(), mapped_dst, elements.len());
        device.unmap_memory(buffer_memory);
    };

    Ok(())
}
