use std::marker::PhantomData;
use std::time::Duration;

use ash::vk;

use super::RendererError;
use super::device::DeviceContext;
use super::gpu_write::GPUWrite;
use super::memory::Buffer;

/// The transform block read by the vertex shader (binding 0)
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(16))]
pub struct MVPMatrices {
    pub model: glam::Mat4,
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
}

impl GPUWrite for MVPMatrices {}

const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 10.0;

/// The model spins about +Z at `degrees_per_second`, seen from (2, 2, 2)
///
/// The angle is reduced modulo a full turn in f64 before narrowing,
/// so long-running sessions keep full precision.
pub fn make_mvp_matrices(
    elapsed: Duration,
    degrees_per_second: f64,
    extent: vk::Extent2D,
) -> MVPMatrices {
    let turn = (elapsed.as_secs_f64() * degrees_per_second.to_radians()) % std::f64::consts::TAU;

    let model = glam::Mat4::from_rotation_z(turn as f32);
    let view = glam::Mat4::look_at_rh(
        glam::Vec3::splat(2.0),
        glam::Vec3::ZERO,
        glam::Vec3::Z,
    );

    let aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
    let mut projection = glam::Mat4::perspective_rh(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        aspect_ratio,
        NEAR_PLANE,
        FAR_PLANE,
    );

    // "GLM was originally designed for OpenGL,
    // where the Y coordinate of the clip coordinates is inverted.
    // The easiest way to compensate for that is to flip the sign
    // on the scaling factor of the Y axis in the projection matrix.
    // If you don’t do this, then the image will be rendered upside down."
    // https://docs.vulkan.org/tutorial/latest/05_Uniform_buffers/00_Descriptor_set_layout_and_buffer.html
    projection.y_axis.y *= -1.0;

    MVPMatrices {
        model,
        view,
        projection,
    }
}

/// A host-coherent uniform buffer that stays mapped for its whole lifetime
pub struct UniformBuffer<T: GPUWrite> {
    mapped: *mut T,
    pub buffer: Buffer,
    _phantom_data: PhantomData<T>,
}

impl<T: GPUWrite> UniformBuffer<T> {
    pub fn create(ctx: &DeviceContext) -> Result<Self, RendererError> {
        let buffer = Buffer::create(
            ctx,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let mapped = buffer.map()? as *mut T;

        Ok(Self {
            mapped,
            buffer,
            _phantom_data: PhantomData,
        })
    }

    /// The caller must know the GPU is not reading this buffer (its frame fence has signaled)
    pub fn write(&mut self, value: &T) {
        unsafe { self.mapped.write(*value) };
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer.buffer)
            .offset(0)
            .range(std::mem::size_of::<T>() as vk::DeviceSize)
    }
}

impl<T: GPUWrite> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        self.buffer.unmap();
    }
}

/// One uniform buffer per frame in flight
pub struct UniformBuffers<T: GPUWrite> {
    frames: Vec<UniformBuffer<T>>,
}

impl<T: GPUWrite> UniformBuffers<T> {
    pub fn create(ctx: &DeviceContext, frames_in_flight: usize) -> Result<Self, RendererError> {
        let frames = (0..frames_in_flight)
            .map(|_| UniformBuffer::create(ctx))
            .collect::<Result<_, _>>()?;

        Ok(Self { frames })
    }

    pub fn write(&mut self, frame_slot: usize, value: &T) {
        self.frames[frame_slot].write(value);
    }

    pub fn get(&self, frame_slot: usize) -> &UniformBuffer<T> {
        &self.frames[frame_slot]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn approx_eq(a: glam::Mat4, b: glam::Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn layout_is_three_column_major_matrices() {
        assert_eq!(std::mem::size_of::<MVPMatrices>(), 3 * 64);
        assert_eq!(std::mem::align_of::<MVPMatrices>(), 16);
    }

    #[test]
    fn starts_unrotated() {
        let mvp = make_mvp_matrices(Duration::ZERO, 90.0, EXTENT);
        assert!(approx_eq(mvp.model, glam::Mat4::IDENTITY));
    }

    #[test]
    fn rotation_is_continuous_across_full_turns() {
        // at 90 degrees per second a full turn takes four seconds
        let one_second = make_mvp_matrices(Duration::from_secs(1), 90.0, EXTENT);
        let five_seconds = make_mvp_matrices(Duration::from_secs(5), 90.0, EXTENT);
        assert!(approx_eq(one_second.model, five_seconds.model));

        let quarter_turn = glam::Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(approx_eq(one_second.model, quarter_turn));
    }

    #[test]
    fn long_sessions_keep_precision() {
        // a day in, the reduced angle still lands on an exact quarter turn
        let day = Duration::from_secs(24 * 60 * 60 + 1);
        let mvp = make_mvp_matrices(day, 90.0, EXTENT);
        let quarter_turn = glam::Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!(approx_eq(mvp.model, quarter_turn));
    }

    #[test]
    fn projection_tracks_the_current_extent() {
        let wide = make_mvp_matrices(Duration::ZERO, 90.0, EXTENT);
        let square = make_mvp_matrices(
            Duration::ZERO,
            90.0,
            vk::Extent2D {
                width: 600,
                height: 600,
            },
        );

        let ratio = square.projection.x_axis.x / wide.projection.x_axis.x;
        assert!((ratio - 800.0 / 600.0).abs() < 1e-5);
    }

    #[test]
    fn projection_flips_y() {
        let mvp = make_mvp_matrices(Duration::ZERO, 90.0, EXTENT);
        assert!(mvp.projection.y_axis.y < 0.0);
        assert!(mvp.projection.x_axis.x > 0.0);
    }

    #[test]
    fn camera_looks_at_the_origin() {
        let mvp = make_mvp_matrices(Duration::ZERO, 90.0, EXTENT);
        let origin = mvp.view.transform_point3(glam::Vec3::ZERO);

        // straight ahead in view space is -Z
        assert!(origin.x.abs() < 1e-5);
        assert!(origin.y.abs() < 1e-5);
        assert!((origin.z + 12.0_f32.sqrt()).abs() < 1e-5);
    }
}
