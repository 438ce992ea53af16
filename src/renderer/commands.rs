use ash::vk;

use super::RendererError;
use super::device::DeviceContext;

/// A command pool bound to the graphics queue family
pub struct CommandPool {
    pub pool: vk::CommandPool,
    device: ash::Device,
}

impl CommandPool {
    /// For short-lived upload commands
    pub fn transient(ctx: &DeviceContext) -> Result<Self, RendererError> {
        Self::create(ctx, vk::CommandPoolCreateFlags::TRANSIENT)
    }

    /// For the per-frame command buffers, which are reset and re-recorded every frame
    pub fn resettable(ctx: &DeviceContext) -> Result<Self, RendererError> {
        Self::create(ctx, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    }

    fn create(
        ctx: &DeviceContext,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self, RendererError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(flags)
            .queue_family_index(ctx.queue_families.graphics);
        let pool = unsafe { ctx.device.create_command_pool(&create_info, None)? };

        Ok(Self {
            pool,
            device: ctx.device.clone(),
        })
    }

    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>, RendererError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info)? })
    }

    /// Records with `record`, submits to `queue`, and blocks until the queue is idle
    pub fn run_one_time(
        &self,
        queue: vk::Queue,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<(), RendererError> {
        let command_buffer = self.allocate(1)?[0];
        let result = self.submit_and_wait(queue, command_buffer, record);

        unsafe {
            self.device
                .free_command_buffers(self.pool, &[command_buffer])
        };

        result
    }

    fn submit_and_wait(
        &self,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<(), RendererError> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info)? };
        record(&self.device, command_buffer);
        unsafe { self.device.end_command_buffer(command_buffer)? };

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.device
                .queue_submit(queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(queue)?;
        }

        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}
