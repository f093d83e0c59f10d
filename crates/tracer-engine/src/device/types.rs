//! Backend-neutral resource descriptions and handles.
//!
//! Handles are small `Copy` ids. The backend owns the real objects and looks
//! them up on use, so render code never holds a borrow into the device.

use std::fmt;
use std::ops::Range;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Raw id value, for diagnostics only.
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

resource_id!(
    /// GPU buffer handle.
    BufferId
);
resource_id!(
    /// GPU texture handle (owned textures and drawable color targets).
    TextureId
);
resource_id!(
    /// Compiled render pipeline handle.
    PipelineId
);
resource_id!(
    /// Depth/stencil test state handle.
    DepthStencilStateId
);
resource_id!(
    /// Presentable drawable handle.
    DrawableId
);

/// Pixel formats understood by the harness.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Depth32Float,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
    Stencil8,
}

impl PixelFormat {
    /// True for 4x8-bit normalized color formats.
    pub fn is_color(self) -> bool {
        matches!(
            self,
            Self::Bgra8Unorm | Self::Bgra8UnormSrgb | Self::Rgba8Unorm | Self::Rgba8UnormSrgb
        )
    }

    pub fn has_depth(self) -> bool {
        matches!(
            self,
            Self::Depth32Float | Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            Self::Stencil8 | Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8
        )
    }
}

/// Size and sampling properties of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub format: PixelFormat,
}

/// A texture id together with the properties it was created with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureHandle {
    pub id: TextureId,
    pub info: TextureInfo,
}

impl TextureHandle {
    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn sample_count(&self) -> u32 {
        self.info.sample_count
    }
}

/// Single-use presentable target obtained from the surface.
///
/// Not `Clone`: a drawable is consumed by `present` or `discard_drawable`.
#[derive(Debug, Eq, PartialEq)]
pub struct Drawable {
    pub id: DrawableId,
    pub texture: TextureHandle,
}

/// Where a buffer's memory lives and how CPU writes reach the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StorageMode {
    /// Initialized once at creation, never written by the CPU again.
    Shared,
    /// CPU-visible shadow copy; writes reach the GPU through `did_modify_range`.
    Managed,
    /// GPU-only memory.
    Private,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    Vertex,
    Uniform,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
    pub storage: StorageMode,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub format: PixelFormat,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    NotEqual,
    Always,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DepthStencilDescriptor {
    pub depth_compare: CompareFunction,
    pub depth_write_enabled: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// Half-open byte range of a buffer.
pub type ByteRange = Range<u64>;

/// Frame rectangle of the presented view, in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct FrameRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FrameRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Observable surface configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SurfaceState {
    pub pixel_format: PixelFormat,
    /// Drawables can only be render targets (no readback).
    pub framebuffer_only: bool,
    pub frame: FrameRect,
}

/// Completion status reported to command-buffer handlers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandBufferStatus {
    Completed,
    /// The buffer was dropped or failed before reaching the GPU.
    Abandoned,
}
