use ash::vk;

use super::RendererError;
use super::gpu_write::GPUWrite;
use super::texture::Texture;
use super::uniform_buffer::UniformBuffers;

/// pool sizes for `set_count` sets of one uniform buffer plus one sampled texture
pub fn pool_sizes(set_count: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: set_count,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: set_count,
        },
    ]
}

/// The pool and one descriptor set per frame in flight
///
/// Sets are freed with the pool.
pub struct FrameDescriptors {
    pub sets: Vec<vk::DescriptorSet>,
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl FrameDescriptors {
    pub fn create<T: GPUWrite>(
        device: &ash::Device,
        layout: vk::DescriptorSetLayout,
        uniform_buffers: &UniformBuffers<T>,
        texture: &Texture,
    ) -> Result<Self, RendererError> {
        let set_count = uniform_buffers.len() as u32;

        let sizes = pool_sizes(set_count);
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&sizes)
            .max_sets(set_count);
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };

        let mut descriptors = Self {
            sets: vec![],
            pool,
            device: device.clone(),
        };

        let layouts = vec![layout; set_count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        descriptors.sets = unsafe { device.allocate_descriptor_sets(&alloc_info)? };

        for (slot, &set) in descriptors.sets.iter().enumerate() {
            let buffer_infos = [uniform_buffers.get(slot).descriptor_info()];
            let image_infos = [texture.descriptor_info()];

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos),
            ];

            unsafe { device.update_descriptor_sets(&writes, &[]) };
        }

        Ok(descriptors)
    }
}

impl Drop for FrameDescriptors {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}
