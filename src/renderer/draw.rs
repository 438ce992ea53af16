use ash::vk;

use super::RendererError;
use super::config::CLEAR_COLOR;

/// The commands recorded for one frame, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassCommand {
    BeginRenderPass,
    BindPipeline,
    BindVertexBuffer,
    BindIndexBuffer,
    BindDescriptorSet,
    DrawIndexed { index_count: u32 },
    EndRenderPass,
}

/// An empty mesh still gets a full pass, so the image is cleared and presentable
pub fn pass_commands(index_count: u32) -> [PassCommand; 7] {
    [
        PassCommand::BeginRenderPass,
        PassCommand::BindPipeline,
        PassCommand::BindVertexBuffer,
        PassCommand::BindIndexBuffer,
        PassCommand::BindDescriptorSet,
        PassCommand::DrawIndexed { index_count },
        PassCommand::EndRenderPass,
    ]
}

/// color then depth; a resolve attachment is never cleared
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

/// Handles bound while recording one frame
pub struct DrawTargets {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub descriptor_set: vk::DescriptorSet,
}

pub fn record_draw(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    targets: &DrawTargets,
) -> Result<(), RendererError> {
    unsafe {
        device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
        device.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default())?;
    }

    let clear_values = clear_values();

    for command in pass_commands(targets.index_count) {
        match command {
            PassCommand::BeginRenderPass => {
                let begin_info = vk::RenderPassBeginInfo::default()
                    .render_pass(targets.render_pass)
                    .framebuffer(targets.framebuffer)
                    .render_area(vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent: targets.extent,
                    })
                    .clear_values(&clear_values);
                unsafe {
                    device.cmd_begin_render_pass(
                        command_buffer,
                        &begin_info,
                        vk::SubpassContents::INLINE,
                    )
                };
            }
            PassCommand::BindPipeline => unsafe {
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    targets.pipeline,
                )
            },
            PassCommand::BindVertexBuffer => unsafe {
                device.cmd_bind_vertex_buffers(command_buffer, 0, &[targets.vertex_buffer], &[0])
            },
            PassCommand::BindIndexBuffer => unsafe {
                device.cmd_bind_index_buffer(
                    command_buffer,
                    targets.index_buffer,
                    0,
                    vk::IndexType::UINT32,
                )
            },
            PassCommand::BindDescriptorSet => unsafe {
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    targets.pipeline_layout,
                    0,
                    &[targets.descriptor_set],
                    &[],
                )
            },
            PassCommand::DrawIndexed { index_count } => unsafe {
                device.cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0)
            },
            PassCommand::EndRenderPass => unsafe { device.cmd_end_render_pass(command_buffer) },
        }
    }

    unsafe { device.end_command_buffer(command_buffer)? };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mesh_still_records_the_whole_pass() {
        let commands = pass_commands(0);

        assert_eq!(commands.first(), Some(&PassCommand::BeginRenderPass));
        assert_eq!(commands.last(), Some(&PassCommand::EndRenderPass));
        assert!(commands.contains(&PassCommand::DrawIndexed { index_count: 0 }));
    }

    #[test]
    fn bindings_precede_the_draw() {
        let commands = pass_commands(36);
        let draw = commands
            .iter()
            .position(|c| *c == PassCommand::DrawIndexed { index_count: 36 })
            .unwrap();

        for binding in [
            PassCommand::BindPipeline,
            PassCommand::BindVertexBuffer,
            PassCommand::BindIndexBuffer,
            PassCommand::BindDescriptorSet,
        ] {
            let position = commands.iter().position(|c| *c == binding).unwrap();
            assert!(position < draw, "{binding:?} after the draw");
        }
    }

    #[test]
    fn depth_clears_to_the_far_plane() {
        let [color, depth] = clear_values();
        unsafe {
            assert_eq!(color.color.float32, CLEAR_COLOR);
            assert_eq!(depth.depth_stencil.depth, 1.0);
        }
    }
}
