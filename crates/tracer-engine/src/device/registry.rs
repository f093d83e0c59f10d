//! Id → wgpu object tables owned by `Gpu`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    BufferId, DepthStencilDescriptor, DepthStencilStateId, DrawableId, GpuError, PipelineId,
    TextureId, TextureInfo, Winding,
};

pub(crate) struct BufferEntry {
    pub buffer: wgpu::Buffer,
    /// CPU-visible copy for managed buffers; published by `did_modify_range`.
    pub shadow: Option<Vec<u8>>,
}

pub(crate) struct TextureEntry {
    /// `None` for drawable textures, which the surface owns.
    pub texture: Option<wgpu::Texture>,
    pub view: wgpu::TextureView,
    pub info: TextureInfo,
}

pub(crate) struct PipelineEntry {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub uniform_slot: u32,
    pub depth_stencil: DepthStencilDescriptor,
    pub front_face: Winding,
}

pub(crate) struct DrawableEntry {
    pub surface_texture: wgpu::SurfaceTexture,
    pub texture: TextureId,
}

#[derive(Default)]
pub(crate) struct Tables {
    pub buffers: HashMap<BufferId, BufferEntry>,
    pub textures: HashMap<TextureId, TextureEntry>,
    pub pipelines: HashMap<PipelineId, PipelineEntry>,
    pub depth_states: HashMap<DepthStencilStateId, DepthStencilDescriptor>,
    pub drawables: HashMap<DrawableId, DrawableEntry>,
    /// Uniform bind groups keyed by the pipeline layout they were built for.
    pub bind_groups: HashMap<(PipelineId, BufferId), wgpu::BindGroup>,
}

impl Tables {
    pub fn buffer(&self, id: BufferId) -> Result<&BufferEntry, GpuError> {
        self.buffers.get(&id).ok_or(GpuError::UnknownResource {
            kind: "buffer",
            id: id.raw(),
        })
    }

    pub fn view(&self, id: TextureId) -> Result<&wgpu::TextureView, GpuError> {
        self.textures
            .get(&id)
            .map(|t| &t.view)
            .ok_or(GpuError::UnknownResource {
                kind: "texture",
                id: id.raw(),
            })
    }

    /// Removes a drawable and its color texture entry.
    pub fn take_drawable(&mut self, id: DrawableId) -> Option<wgpu::SurfaceTexture> {
        let entry = self.drawables.remove(&id)?;
        self.textures.remove(&entry.texture);
        Some(entry.surface_texture)
    }
}

/// Shared registry: monotonically increasing ids plus the tables behind a mutex.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    tables: Mutex<Tables>,
}

impl Registry {
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves the tables consistent (inserts and
        // removes are single operations), so poisoning is not treated as fatal.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
