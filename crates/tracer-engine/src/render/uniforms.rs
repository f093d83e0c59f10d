use bytemuck::{Pod, Zeroable};

use crate::device::{BufferDescriptor, BufferId, BufferUsage, GpuDevice, GpuError, StorageMode};

use super::lifecycle::Lifecycle;

/// Slot the transform uniform is bound at on every frame's encoder.
pub const UNIFORM_SLOT: u32 = 1;

/// Amount the tracked scalar advances per frame.
pub const SCALAR_STEP: f32 = 10.0;

/// One 4x4 float matrix (64 bytes), column-major.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub mvp: [[f32; 4]; 4],
}

impl TransformUniform {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Owns the per-frame transform buffer and publishes CPU writes to the GPU.
///
/// `update` must run before the buffer is bound for the frame; the render
/// submission path guarantees this ordering.
#[derive(Debug)]
pub struct UniformBufferUpdater {
    buffer: Lifecycle<u64, BufferId>,
    data: TransformUniform,
    last_frame: Option<u64>,
    updates: u64,
}

impl Default for UniformBufferUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformBufferUpdater {
    pub fn new() -> Self {
        let mut buffer = Lifecycle::default();
        buffer.configure(TransformUniform::SIZE);
        Self {
            buffer,
            data: TransformUniform::zeroed(),
            last_frame: None,
            updates: 0,
        }
    }

    /// Allocates the managed buffer (once).
    pub fn prepare(&mut self, device: &dyn GpuDevice) -> Result<BufferId, GpuError> {
        let id = self.buffer.get_or_build("uniform buffer", |size| {
            device.create_buffer(&BufferDescriptor {
                label: "transform matrix (MVP)",
                size: *size,
                usage: BufferUsage::Uniform,
                storage: StorageMode::Managed,
            })
        })?;
        Ok(*id)
    }

    pub fn buffer(&self) -> Result<BufferId, GpuError> {
        self.buffer.ready("uniform buffer").copied()
    }

    /// The scalar advanced once per frame.
    pub fn tracked_scalar(&self) -> f32 {
        self.data.mvp[0][0]
    }

    pub fn transform(&self) -> &TransformUniform {
        &self.data
    }

    /// Number of published updates.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Advances the tracked scalar, writes the whole matrix into CPU-visible
    /// memory and publishes the full 64-byte range.
    ///
    /// A second call with the same `frame_index` is a no-op, so the buffer is
    /// mutated at most once per frame.
    pub fn update(&mut self, device: &dyn GpuDevice, frame_index: u64) -> Result<bool, GpuError> {
        let buffer = self.buffer()?;
        if self.last_frame == Some(frame_index) {
            return Ok(false);
        }

        self.data.mvp[0][0] += SCALAR_STEP;

        device.write_buffer(buffer, 0, bytemuck::bytes_of(&self.data))?;
        device.did_modify_range(buffer, 0..TransformUniform::SIZE)?;

        self.last_frame = Some(frame_index);
        self.updates += 1;
        Ok(true)
    }
}
