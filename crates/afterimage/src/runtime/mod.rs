//! Runtime layer: turns configs into wgpu objects and drives rendering.

pub mod builtins;
pub mod codegen;
pub mod group;
pub mod input;
pub mod options;
pub mod pass;
pub mod shader;
pub mod trigger_points;

pub use group::RuntimeShaderGroup;
pub use shader::RuntimeShader;
pub use trigger_points::TriggerPointManager;

/// Native EFB dimensions. Negative pass output scales are fractions of this
/// space rather than of the (possibly upscaled) render target.
pub const EFB_WIDTH: u32 = 640;
pub const EFB_HEIGHT: u32 = 528;

/// An integer pixel rectangle (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn of_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }
}

/// Everything a render hook supplies for one application of a shader group.
pub struct ApplyParams<'a> {
    /// Destination color attachment; the final output lands in `dest_rect`.
    pub dest_texture: &'a wgpu::Texture,
    pub dest_rect: Rect,
    /// The color buffer the effect reads from.
    pub source_color: &'a wgpu::Texture,
    pub source_rect: Rect,
    pub source_depth: Option<&'a wgpu::Texture>,
    pub source_layer: i32,
    /// Host window client size, for the `window_resolution` builtin.
    pub window_size: (u32, u32),
    /// Current (scaled) EFB target size, for negative output scales.
    pub efb_target_size: (u32, u32),
}
