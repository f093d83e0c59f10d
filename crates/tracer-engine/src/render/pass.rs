use crate::device::TextureHandle;

/// What happens to an attachment's contents when the pass begins.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadAction {
    Clear,
    Load,
}

/// What happens to an attachment's contents when the pass ends.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreAction {
    Store,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorAttachment {
    /// Swapped to the current drawable's texture every frame.
    pub texture: Option<TextureHandle>,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_color: [f64; 4],
}

impl Default for ColorAttachment {
    fn default() -> Self {
        Self {
            texture: None,
            load: LoadAction::Clear,
            store: StoreAction::Store,
            clear_color: [0.0, 1.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthAttachment {
    pub texture: TextureHandle,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_depth: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StencilAttachment {
    pub texture: TextureHandle,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_stencil: u32,
}

/// Attachments and load/store behavior for one frame's render pass.
///
/// The color target is replaced every frame; depth and stencil entries are
/// only rewritten by the render target cache when their textures change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassConfig {
    pub color: ColorAttachment,
    pub depth: Option<DepthAttachment>,
    pub stencil: Option<StencilAttachment>,
}

impl RenderPassConfig {
    pub fn new(clear_color: [f64; 4]) -> Self {
        Self {
            color: ColorAttachment {
                clear_color,
                ..ColorAttachment::default()
            },
            depth: None,
            stencil: None,
        }
    }

    /// Points the color attachment at this frame's drawable texture.
    pub fn set_color_target(&mut self, texture: TextureHandle) {
        self.color.texture = Some(texture);
    }

    /// Drops the color target once the frame has been handed off.
    pub fn clear_color_target(&mut self) {
        self.color.texture = None;
    }
}
