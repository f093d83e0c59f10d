//! Conversions between backend-neutral types and wgpu.

use super::{CompareFunction, PixelFormat, Winding};
use crate::render::{LoadAction, StoreAction, VertexFormat};

pub(crate) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        PixelFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        PixelFormat::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
        PixelFormat::Stencil8 => wgpu::TextureFormat::Stencil8,
    }
}

/// Maps a surface format back; `None` for formats the harness does not render to.
pub(crate) fn pixel_format(format: wgpu::TextureFormat) -> Option<PixelFormat> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm => Some(PixelFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(PixelFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba8Unorm => Some(PixelFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(PixelFormat::Rgba8UnormSrgb),
        _ => None,
    }
}

pub(crate) fn compare_function(f: CompareFunction) -> wgpu::CompareFunction {
    match f {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

pub(crate) fn front_face(winding: Winding) -> wgpu::FrontFace {
    match winding {
        Winding::Clockwise => wgpu::FrontFace::Cw,
        Winding::CounterClockwise => wgpu::FrontFace::Ccw,
    }
}

pub(crate) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub(crate) fn operations<V>(load: LoadAction, store: StoreAction, clear: V) -> wgpu::Operations<V> {
    wgpu::Operations {
        load: match load {
            LoadAction::Clear => wgpu::LoadOp::Clear(clear),
            LoadAction::Load => wgpu::LoadOp::Load,
        },
        store: match store {
            StoreAction::Store => wgpu::StoreOp::Store,
            StoreAction::Discard => wgpu::StoreOp::Discard,
        },
    }
}
