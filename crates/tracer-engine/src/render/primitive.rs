use bytemuck::{Pod, Zeroable};

use crate::device::{
    BufferDescriptor, BufferId, BufferUsage, GpuDevice, GpuError, RenderCommandEncoder,
    StorageMode,
};

use super::lifecycle::Lifecycle;
use super::pipeline::{VertexAttribute, VertexFormat, VertexLayout};

/// Emits geometry into a render encoder and closes it.
///
/// Implementations own their vertex data. The frame submission path binds
/// pipeline and uniform state before calling `encode`, and never touches the
/// encoder afterwards.
pub trait PrimitiveEncoder {
    /// Layout of the vertex buffer this encoder binds at slot 0.
    fn vertex_layout(&self) -> VertexLayout;

    fn encode(
        &mut self,
        device: &dyn GpuDevice,
        encoder: Box<dyn RenderCommandEncoder + '_>,
    ) -> Result<(), GpuError>;
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 4],
}

/// Two counter-clockwise triangles covering clip space.
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, -1.0, 0.0, 1.0] },
    QuadVertex { position: [1.0, 1.0, 0.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0, 0.0, 1.0] },
    QuadVertex { position: [-1.0, -1.0, 0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0, 0.0, 1.0] },
    QuadVertex { position: [1.0, 1.0, 0.0, 1.0] },
];

/// Default primitive: a screen-space quad, 6 vertices, 1 instance.
#[derive(Debug)]
pub struct QuadEncoder {
    vertex_buffer: Lifecycle<[QuadVertex; 6], BufferId>,
}

impl Default for QuadEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadEncoder {
    pub const DEBUG_GROUP: &'static str = "test quad";
    pub const VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;

    pub fn new() -> Self {
        let mut vertex_buffer = Lifecycle::default();
        vertex_buffer.configure(QUAD_VERTICES);
        Self { vertex_buffer }
    }

    /// The uploaded vertex buffer, once the first frame has been encoded.
    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.vertex_buffer.ready("quad vertex buffer").ok().copied()
    }
}

impl PrimitiveEncoder for QuadEncoder {
    fn vertex_layout(&self) -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<QuadVertex>() as u64,
            attributes: vec![VertexAttribute {
                format: VertexFormat::Float32x4,
                offset: 0,
                location: 0,
            }],
        }
    }

    fn encode(
        &mut self,
        device: &dyn GpuDevice,
        mut encoder: Box<dyn RenderCommandEncoder + '_>,
    ) -> Result<(), GpuError> {
        encoder.push_debug_group(Self::DEBUG_GROUP);

        let vertex_buffer = *self.vertex_buffer.get_or_build("quad vertex buffer", |vertices| {
            let contents: &[u8] = bytemuck::cast_slice(vertices);
            let id = device.create_buffer_init(
                &BufferDescriptor {
                    label: "quad vertices",
                    size: contents.len() as u64,
                    usage: BufferUsage::Vertex,
                    storage: StorageMode::Shared,
                },
                contents,
            )?;
            log::debug!("uploaded quad vertex buffer {id}");
            Ok(id)
        })?;

        encoder.set_vertex_buffer(vertex_buffer, 0, 0);
        encoder.draw_primitives(0, Self::VERTEX_COUNT, 1);
        encoder.pop_debug_group();
        encoder.end_encoding();
        Ok(())
    }
}
