//! Pipeline state construction.
//!
//! Shader compilation is out of scope: programs arrive as opaque, name-keyed
//! entries of a [`ShaderLibrary`]. The builder resolves two of them, combines
//! them with fixed-function configuration and asks the device to compile the
//! result once.

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::{
    CompareFunction, DepthStencilDescriptor, DepthStencilStateId, GpuDevice, GpuError, PipelineId,
    PixelFormat, SurfaceState, Winding,
};

/// A compiled (or compilable) shader entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    pub name: String,
    /// Module source; identical `Arc`s are compiled once by backends that cache.
    pub source: Arc<str>,
    pub entry_point: String,
}

/// Name-keyed program library.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    programs: HashMap<String, ShaderProgram>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library shipped with the engine: `vertex` and `fragment` programs of the
    /// built-in quad shader.
    pub fn default_library() -> Self {
        let source: Arc<str> = Arc::from(include_str!("shaders/quad.wgsl"));
        let mut lib = Self::new();
        lib.insert("vertex", source.clone(), "vs_main");
        lib.insert("fragment", source, "fs_main");
        lib
    }

    pub fn insert(&mut self, name: &str, source: Arc<str>, entry_point: &str) {
        self.programs.insert(
            name.to_string(),
            ShaderProgram {
                name: name.to_string(),
                source,
                entry_point: entry_point.to_string(),
            },
        );
    }

    pub fn function(&self, name: &str) -> Result<&ShaderProgram, GpuError> {
        self.programs.get(name).ok_or_else(|| GpuError::MissingProgram {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    /// Size of one attribute in bytes.
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub location: u32,
}

/// Layout of the vertex buffer bound at slot 0.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Checks that every attribute fits in one stride, sits at a 4-byte aligned
    /// offset and uses its own shader location.
    pub fn validate(&self) -> Result<(), String> {
        if self.attributes.is_empty() {
            return Err("vertex layout has no attributes".into());
        }
        if self.stride == 0 || self.stride % 4 != 0 {
            return Err(format!(
                "vertex stride {} is not a non-zero multiple of 4",
                self.stride
            ));
        }
        for (i, a) in self.attributes.iter().enumerate() {
            if a.offset % 4 != 0 {
                return Err(format!(
                    "attribute at location {} has unaligned offset {}",
                    a.location, a.offset
                ));
            }
            if a.offset + a.format.size() > self.stride {
                return Err(format!(
                    "attribute at location {} ({:?} at offset {}) overruns stride {}",
                    a.location, a.format, a.offset, self.stride
                ));
            }
            if self.attributes[..i].iter().any(|b| b.location == a.location) {
                return Err(format!("shader location {} is used twice", a.location));
            }
        }
        Ok(())
    }
}

/// Inputs of the pipeline builder.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub label: String,
    pub vertex_program: String,
    pub fragment_program: String,
    pub color_format: PixelFormat,
    pub depth_format: Option<PixelFormat>,
    pub stencil_format: Option<PixelFormat>,
    pub sample_count: u32,
    pub vertex_layout: VertexLayout,
    /// Slot the per-frame uniform buffer is bound at.
    pub uniform_slot: u32,
}

/// Resolved descriptor handed to the device.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor<'a> {
    pub label: &'a str,
    pub vertex: &'a ShaderProgram,
    pub fragment: &'a ShaderProgram,
    pub color_format: PixelFormat,
    pub depth_format: Option<PixelFormat>,
    pub stencil_format: Option<PixelFormat>,
    pub sample_count: u32,
    pub vertex_layout: &'a VertexLayout,
    pub uniform_slot: u32,
    pub depth_stencil: DepthStencilDescriptor,
    pub front_face: Winding,
}

impl PipelineDescriptor<'_> {
    /// Format, vertex layout and sample-count checks shared by every backend.
    pub fn validate(&self, surface: &SurfaceState) -> Result<(), GpuError> {
        let reject = |reason: String| GpuError::PipelineRejected {
            label: self.label.to_string(),
            reason,
        };

        if !self.color_format.is_color() {
            return Err(reject(format!(
                "{:?} is not a color format",
                self.color_format
            )));
        }
        if self.color_format != surface.pixel_format {
            return Err(reject(format!(
                "color format {:?} does not match surface format {:?}",
                self.color_format, surface.pixel_format
            )));
        }
        if let Some(f) = self.depth_format {
            if !f.has_depth() {
                return Err(reject(format!("{f:?} is not a depth format")));
            }
        }
        if let Some(f) = self.stencil_format {
            if !f.has_stencil() {
                return Err(reject(format!("{f:?} is not a stencil format")));
            }
        }
        self.vertex_layout.validate().map_err(reject)?;
        // Drawables are single-sampled and there is no resolve step.
        if self.sample_count != 1 {
            return Err(reject(format!(
                "sample count {} does not match single-sampled drawables",
                self.sample_count
            )));
        }
        Ok(())
    }
}

/// Immutable result of the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub pipeline: PipelineId,
    pub depth_stencil: DepthStencilStateId,
    pub color_format: PixelFormat,
    pub depth_format: Option<PixelFormat>,
    pub stencil_format: Option<PixelFormat>,
    pub sample_count: u32,
    pub front_face: Winding,
}

/// Depth test that always passes but still writes depth.
pub fn passthrough_depth_state() -> DepthStencilDescriptor {
    DepthStencilDescriptor {
        depth_compare: CompareFunction::Always,
        depth_write_enabled: true,
    }
}

/// Resolves both programs and compiles the pipeline plus its depth-stencil state.
pub fn build_pipeline(
    device: &dyn GpuDevice,
    library: &ShaderLibrary,
    config: &PipelineConfig,
) -> Result<PipelineState, GpuError> {
    let vertex = library.function(&config.vertex_program)?;
    let fragment = library.function(&config.fragment_program)?;

    let depth_stencil = passthrough_depth_state();
    let depth_state = device.create_depth_stencil_state(&depth_stencil)?;

    let desc = PipelineDescriptor {
        label: &config.label,
        vertex,
        fragment,
        color_format: config.color_format,
        depth_format: config.depth_format,
        stencil_format: config.stencil_format,
        sample_count: config.sample_count,
        vertex_layout: &config.vertex_layout,
        uniform_slot: config.uniform_slot,
        depth_stencil,
        front_face: Winding::CounterClockwise,
    };

    let pipeline = device.create_render_pipeline(&desc)?;
    log::debug!(
        "built pipeline '{}' ({pipeline}): color={:?} depth={:?} stencil={:?} samples={}",
        config.label,
        config.color_format,
        config.depth_format,
        config.stencil_format,
        config.sample_count
    );

    Ok(PipelineState {
        pipeline,
        depth_stencil: depth_state,
        color_format: desc.color_format,
        depth_format: desc.depth_format,
        stencil_format: desc.stencil_format,
        sample_count: desc.sample_count,
        front_face: desc.front_face,
    })
}
