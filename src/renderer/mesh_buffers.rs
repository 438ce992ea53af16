use ash::vk;
use log::*;

use super::RendererError;
use super::commands::CommandPool;
use super::device::DeviceContext;
use super::memory::{Buffer, upload_via_staging};
use super::vertex_description::VertexDescription;

/// Device-local vertex and index buffers for one mesh
pub struct MeshBuffers {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    /// # Panics
    ///
    /// if any index is out of range for `vertices`
    pub fn upload<V: VertexDescription>(
        ctx: &DeviceContext,
        commands: &CommandPool,
        vertices: &[V],
        indices: &[u32],
    ) -> Result<Self, RendererError> {
        assert!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "mesh index out of range for {} vertices",
            vertices.len()
        );

        let vertex_buffer =
            upload_via_staging(ctx, commands, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer =
            upload_via_staging(ctx, commands, indices, vk::BufferUsageFlags::INDEX_BUFFER)?;

        debug!(
            "uploaded mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }
}
