use std::time::Instant;

use ash::khr;
use ash::vk;
use log::*;

mod commands;
mod config;
mod debug;
mod descriptors;
mod device;
mod draw;
mod error;
mod frame;
pub mod gpu_write;
mod image;
mod instance;
mod memory;
mod mesh_buffers;
mod pipeline;
mod platform;
mod swapchain;
mod texture;
mod uniform_buffer;
mod vertex_description;
mod window;

pub use config::*;
pub use debug::{DebugCategory, DebugReporter, DebugSeverity, LogReporter};
pub use error::RendererError;
pub use frame::{Acquire, FrameBackend, FrameOutcome, FrameScheduler, Present, SlotState};
pub use gpu_write::GPUWrite;
pub use pipeline::ShaderCode;
pub use uniform_buffer::{MVPMatrices, make_mvp_matrices};
pub use vertex_description::VertexDescription;
pub use window::HostWindow;

use commands::CommandPool;
use descriptors::FrameDescriptors;
use device::DeviceContext;
use draw::{DrawTargets, record_draw};
use frame::FrameSync;
use self::image::{Attachment, find_supported_format};
use instance::{Surface, VulkanInstance};
use mesh_buffers::MeshBuffers;
use pipeline::{GraphicsPipeline, PipelineDescription, PipelineLayout, VertexInput};
use swapchain::{Framebuffers, Swapchain};
use texture::Texture;
use uniform_buffer::UniformBuffers;

/// What the renderer draws: one textured mesh with its shaders
pub struct SceneDescription<'a, V: VertexDescription> {
    pub shaders: ShaderCode,
    pub vertices: &'a [V],
    pub indices: &'a [u32],
    pub texture: &'a ::image::DynamicImage,
    pub texture_name: &'a str,
    pub rotation_degrees_per_second: f64,
}

pub struct Renderer {
    scheduler: FrameScheduler,
    gpu: Gpu,
}

impl Renderer {
    pub fn init<V: VertexDescription>(
        window: Box<dyn HostWindow>,
        config: &RendererConfig,
        scene: SceneDescription<V>,
    ) -> Result<Self, RendererError> {
        Self::init_with_reporter(window, config, scene, Box::new(LogReporter::default()))
    }

    /// Like `init`, with validation messages sent to `reporter` instead of `log`
    pub fn init_with_reporter<V: VertexDescription>(
        window: Box<dyn HostWindow>,
        config: &RendererConfig,
        scene: SceneDescription<V>,
        reporter: Box<dyn DebugReporter>,
    ) -> Result<Self, RendererError> {
        let gpu = Gpu::init(window, config, scene, reporter)?;
        let scheduler = FrameScheduler::new(MAX_FRAMES_IN_FLIGHT, gpu.image_count());

        Ok(Self { scheduler, gpu })
    }

    /// Draws and presents one frame, or does nothing while the window has no area
    pub fn draw_frame(&mut self) -> Result<(), RendererError> {
        let extent = self.gpu.window.pixel_extent();
        if extent.width == 0 || extent.height == 0 {
            // keep the request so the swapchain is rebuilt once the window is restored
            self.scheduler.flag_resize();
            return Ok(());
        }

        if self.gpu.presentation.is_none() {
            self.scheduler.recreate(&mut self.gpu)?;
            if self.gpu.presentation.is_none() {
                return Ok(());
            }
        }

        self.scheduler.draw_frame(&mut self.gpu)?;

        Ok(())
    }

    /// Called by the host when the window's pixel size changed
    pub fn flag_resize(&mut self) {
        debug!("resize flagged");
        self.scheduler.flag_resize();
    }

    /// Waits for all submitted work; call before exiting the main loop
    pub fn drain_gpu(&mut self) -> Result<(), RendererError> {
        self.gpu.ctx.wait_idle()
    }

    pub fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.gpu.ctx.msaa_samples
    }

    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.gpu
            .presentation
            .as_ref()
            .map(|presentation| presentation.swapchain.extent)
    }
}

/// Everything rebuilt when the swapchain is invalidated, in destruction order
struct Presentation {
    framebuffers: Framebuffers,
    pipeline: GraphicsPipeline,
    #[expect(unused)] // referenced by the framebuffers, held until drop
    depth: Attachment,
    #[expect(unused)] // referenced by the framebuffers, held until drop
    color: Option<Attachment>,
    swapchain: Swapchain,
}

impl Presentation {
    fn create(gpu: &Gpu, window_extent: vk::Extent2D) -> Result<Self, RendererError> {
        let ctx = &gpu.ctx;

        let swapchain = Swapchain::create(ctx, &gpu.swapchain_loader, &gpu.surface, window_extent)?;

        let pipeline = GraphicsPipeline::create(
            &ctx.device,
            &PipelineDescription {
                shaders: &gpu.shaders,
                vertex_input: &gpu.vertex_input,
                layout: &gpu.pipeline_layout,
                color_format: swapchain.format.format,
                depth_format: gpu.depth_format,
                extent: swapchain.extent,
                samples: ctx.msaa_samples,
            },
        )?;

        let color = if ctx.msaa_samples != vk::SampleCountFlags::TYPE_1 {
            Some(Attachment::color(
                ctx,
                swapchain.format.format,
                swapchain.extent,
            )?)
        } else {
            None
        };
        let depth = Attachment::depth(ctx, &gpu.upload_commands, gpu.depth_format, swapchain.extent)?;

        let framebuffers = Framebuffers::create(
            &ctx.device,
            pipeline.render_pass.handle,
            &swapchain,
            color.as_ref(),
            &depth,
        )?;

        Ok(Self {
            framebuffers,
            pipeline,
            depth,
            color,
            swapchain,
        })
    }
}

/// The renderer's GPU state; fields are dropped top to bottom
struct Gpu {
    presentation: Option<Presentation>,
    descriptors: FrameDescriptors,
    uniform_buffers: UniformBuffers<MVPMatrices>,
    mesh: MeshBuffers,
    #[expect(unused)] // bound through the descriptor sets
    texture: Texture,
    sync: FrameSync,
    command_buffers: Vec<vk::CommandBuffer>,
    #[expect(unused)] // owns command_buffers
    frame_commands: CommandPool,
    upload_commands: CommandPool,
    pipeline_layout: PipelineLayout,
    swapchain_loader: khr::swapchain::Device,
    ctx: DeviceContext,
    surface: Surface,
    _instance: VulkanInstance,
    window: Box<dyn HostWindow>,

    shaders: ShaderCode,
    vertex_input: VertexInput,
    depth_format: vk::Format,
    start_time: Instant,
    rotation_degrees_per_second: f64,
}

impl Gpu {
    fn init<V: VertexDescription>(
        window: Box<dyn HostWindow>,
        config: &RendererConfig,
        scene: SceneDescription<V>,
        reporter: Box<dyn DebugReporter>,
    ) -> Result<Self, RendererError> {
        let instance = VulkanInstance::create(window.as_ref(), config.enable_validation, reporter)?;
        let surface = Surface::create(&instance, window.as_ref())?;
        let ctx = DeviceContext::create(&instance, &surface, config.max_msaa_samples)?;
        let swapchain_loader = khr::swapchain::Device::new(&instance.instance, &ctx.device);

        let depth_format = find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| ctx.format_properties(format),
        )?;
        debug!("depth format: {depth_format:?}");

        let pipeline_layout = PipelineLayout::create(&ctx.device)?;
        let upload_commands = CommandPool::transient(&ctx)?;
        let frame_commands = CommandPool::resettable(&ctx)?;
        let command_buffers = frame_commands.allocate(MAX_FRAMES_IN_FLIGHT as u32)?;
        let sync = FrameSync::create(&ctx.device, MAX_FRAMES_IN_FLIGHT)?;

        let texture = Texture::create(&ctx, &upload_commands, scene.texture, scene.texture_name)?;
        let mesh = MeshBuffers::upload(&ctx, &upload_commands, scene.vertices, scene.indices)?;
        let uniform_buffers = UniformBuffers::create(&ctx, MAX_FRAMES_IN_FLIGHT)?;
        let descriptors = FrameDescriptors::create(
            &ctx.device,
            pipeline_layout.descriptor_set_layout,
            &uniform_buffers,
            &texture,
        )?;

        let mut gpu = Self {
            presentation: None,
            descriptors,
            uniform_buffers,
            mesh,
            texture,
            sync,
            command_buffers,
            frame_commands,
            upload_commands,
            pipeline_layout,
            swapchain_loader,
            ctx,
            surface,
            _instance: instance,
            window,
            shaders: scene.shaders,
            vertex_input: VertexInput::of::<V>(),
            depth_format,
            start_time: Instant::now(),
            rotation_degrees_per_second: scene.rotation_degrees_per_second,
        };

        let extent = gpu.window.pixel_extent();
        if extent.width > 0 && extent.height > 0 {
            gpu.presentation = Some(Presentation::create(&gpu, extent)?);
        }

        info!("renderer initialized");

        Ok(gpu)
    }

    fn presentation(&self) -> Result<&Presentation, RendererError> {
        self.presentation.as_ref().ok_or(RendererError::NoSwapchain)
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            error!("failed to wait for device idle during shutdown: {e}");
        }
    }
}

impl FrameBackend for Gpu {
    fn image_count(&self) -> usize {
        self.presentation
            .as_ref()
            .map_or(0, |presentation| presentation.swapchain.image_count())
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RendererError> {
        let fences = [self.sync.in_flight[slot]];
        let result = unsafe {
            self.ctx
                .device
                .wait_for_fences(&fences, true, config::fence_timeout_nanos())
        };

        match result {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(RendererError::FenceTimeout),
            Err(e) => Err(e.into()),
        }
    }

    fn acquire_image(&mut self, slot: usize) -> Result<Acquire, RendererError> {
        let swapchain = &self.presentation()?.swapchain;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                swapchain.handle,
                u64::MAX,
                self.sync.image_available[slot],
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn update_uniforms(&mut self, slot: usize) {
        let Some(presentation) = &self.presentation else {
            return;
        };

        let mvp = make_mvp_matrices(
            self.start_time.elapsed(),
            self.rotation_degrees_per_second,
            presentation.swapchain.extent,
        );
        self.uniform_buffers.write(slot, &mvp);
    }

    fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError> {
        unsafe { self.ctx.device.reset_fences(&[self.sync.in_flight[slot]])? };
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), RendererError> {
        let presentation = self.presentation()?;

        let targets = DrawTargets {
            render_pass: presentation.pipeline.render_pass.handle,
            framebuffer: presentation.framebuffers.handles[image_index as usize],
            extent: presentation.swapchain.extent,
            pipeline: presentation.pipeline.pipeline,
            pipeline_layout: self.pipeline_layout.layout,
            vertex_buffer: self.mesh.vertex_buffer.buffer,
            index_buffer: self.mesh.index_buffer.buffer,
            index_count: self.mesh.index_count,
            descriptor_set: self.descriptors.sets[slot],
        };

        record_draw(&self.ctx.device, self.command_buffers[slot], &targets)
    }

    fn submit(&mut self, slot: usize) -> Result<(), RendererError> {
        let wait_semaphores = [self.sync.image_available[slot]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffers[slot]];
        let signal_semaphores = [self.sync.render_finished[slot]];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx.device.queue_submit(
                self.ctx.graphics_queue,
                &[submit_info],
                self.sync.in_flight[slot],
            )?
        };

        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<Present, RendererError> {
        let swapchain = &self.presentation()?.swapchain;

        let wait_semaphores = [self.sync.render_finished[slot]];
        let swapchains = [swapchain.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.ctx.present_queue, &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(Present::Done { suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn recreate(&mut self) -> Result<(), RendererError> {
        self.ctx.wait_idle()?;
        self.presentation = None;

        let extent = self.window.pixel_extent();
        if extent.width == 0 || extent.height == 0 {
            debug!("window has no area, deferring swapchain recreation");
            return Ok(());
        }

        info!(
            "recreating swapchain for {}x{}",
            extent.width, extent.height
        );
        self.presentation = Some(Presentation::create(self, extent)?);

        Ok(())
    }
}
