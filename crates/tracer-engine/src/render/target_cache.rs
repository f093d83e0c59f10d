use crate::device::{GpuDevice, GpuError, PixelFormat, TextureDescriptor, TextureHandle};

use super::pass::{DepthAttachment, LoadAction, RenderPassConfig, StencilAttachment, StoreAction};

/// True iff `existing` is present and matches `reference` in width, height and
/// sample count.
pub fn is_compatible(existing: Option<&TextureHandle>, reference: &TextureHandle) -> bool {
    let Some(existing) = existing else {
        return false;
    };

    existing.width() == reference.width()
        && existing.height() == reference.height()
        && existing.sample_count() == reference.sample_count()
}

/// Lazily (re)allocated depth and stencil attachments.
///
/// Each attachment is reallocated only when it is incompatible with the color
/// texture it is paired with; the replaced texture is released immediately.
#[derive(Debug, Default)]
pub struct RenderTargetCache {
    depth_format: Option<PixelFormat>,
    stencil_format: Option<PixelFormat>,
    depth: Option<TextureHandle>,
    stencil: Option<TextureHandle>,
    allocations: u64,
}

impl RenderTargetCache {
    pub fn new(depth_format: Option<PixelFormat>, stencil_format: Option<PixelFormat>) -> Self {
        Self {
            depth_format,
            stencil_format,
            ..Self::default()
        }
    }

    pub fn depth_texture(&self) -> Option<&TextureHandle> {
        self.depth.as_ref()
    }

    pub fn stencil_texture(&self) -> Option<&TextureHandle> {
        self.stencil.as_ref()
    }

    /// Total textures allocated since creation.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Ensures both attachments track `color`. Returns true if anything was reallocated.
    pub fn ensure_attachments(
        &mut self,
        device: &dyn GpuDevice,
        color: &TextureHandle,
        pass: &mut RenderPassConfig,
    ) -> Result<bool, GpuError> {
        let depth = self.ensure_depth_attachment(device, color, pass)?;
        let stencil = self.ensure_stencil_attachment(device, color, pass)?;
        Ok(depth || stencil)
    }

    /// Returns true if a new depth texture was allocated.
    pub fn ensure_depth_attachment(
        &mut self,
        device: &dyn GpuDevice,
        color: &TextureHandle,
        pass: &mut RenderPassConfig,
    ) -> Result<bool, GpuError> {
        let Some(format) = self.depth_format else {
            return Ok(false);
        };
        if is_compatible(self.depth.as_ref(), color) {
            return Ok(false);
        }

        let texture = self.allocate(device, "depth attachment", format, color)?;
        if let Some(old) = self.depth.replace(texture) {
            device.release_texture(old);
        }
        pass.depth = Some(DepthAttachment {
            texture,
            load: LoadAction::Clear,
            store: StoreAction::Discard,
            clear_depth: 1.0,
        });
        Ok(true)
    }

    /// Returns true if a new stencil texture was allocated.
    pub fn ensure_stencil_attachment(
        &mut self,
        device: &dyn GpuDevice,
        color: &TextureHandle,
        pass: &mut RenderPassConfig,
    ) -> Result<bool, GpuError> {
        let Some(format) = self.stencil_format else {
            return Ok(false);
        };
        if is_compatible(self.stencil.as_ref(), color) {
            return Ok(false);
        }

        let texture = self.allocate(device, "stencil attachment", format, color)?;
        if let Some(old) = self.stencil.replace(texture) {
            device.release_texture(old);
        }
        pass.stencil = Some(StencilAttachment {
            texture,
            load: LoadAction::Clear,
            store: StoreAction::Discard,
            clear_stencil: 0,
        });
        Ok(true)
    }

    /// Releases both attachments and detaches them from `pass`.
    pub fn release(&mut self, device: &dyn GpuDevice, pass: &mut RenderPassConfig) {
        for texture in [self.depth.take(), self.stencil.take()].into_iter().flatten() {
            device.release_texture(texture);
        }
        pass.depth = None;
        pass.stencil = None;
    }

    fn allocate(
        &mut self,
        device: &dyn GpuDevice,
        label: &str,
        format: PixelFormat,
        color: &TextureHandle,
    ) -> Result<TextureHandle, GpuError> {
        let texture = device.create_texture(&TextureDescriptor {
            label,
            width: color.width(),
            height: color.height(),
            sample_count: color.sample_count(),
            format,
        })?;
        self.allocations += 1;
        log::debug!(
            "allocated {label} {}: {}x{} {:?} x{}",
            texture.id,
            texture.width(),
            texture.height(),
            format,
            texture.sample_count()
        );
        Ok(texture)
    }
}
