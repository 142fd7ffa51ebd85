use bytemuck::{Pod, Zeroable};

use super::Rect;

/// Component count of the builtin block (25 32-bit words).
pub const TOTAL_COMPONENTS: u32 = 25;
/// Widest field in the block; custom options pad against this.
pub const MAX_COMPONENTS: u32 = 4;

/// Builtin uniforms written at the head of every pass's uniform buffer.
/// Must stay in sync with the struct fields `codegen` declares.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct BuiltinUniforms {
    /// Previous output width, height, 1/width, 1/height.
    pub prev_resolution: [f32; 4],
    /// Source rect normalized to the previous output's size.
    pub prev_rect: [f32; 4],
    /// Source texture width, height, 1/width, 1/height.
    pub src_resolution: [f32; 4],
    /// Window client width, height, 1/width, 1/height.
    pub window_resolution: [f32; 4],
    /// Source rect normalized to the source texture's size.
    pub src_rect: [f32; 4],
    /// Elapsed milliseconds since the clock started.
    pub time: i32,
    /// Source array layer being sampled.
    pub layer: i32,
    pub z_depth_near: f32,
    pub z_depth_far: f32,
    /// Output scale of the previous pass.
    pub output_scale: f32,
}

impl BuiltinUniforms {
    pub fn compute(
        prev_size: (u32, u32),
        src_size: (u32, u32),
        source_rect: Rect,
        window_size: (u32, u32),
        time_ms: i32,
        layer: i32,
        depth_near: f32,
        depth_far: f32,
        last_output_scale: f32,
    ) -> Self {
        let prev_w = prev_size.0 as f32;
        let prev_h = prev_size.1 as f32;
        let rcp_prev_w = 1.0 / prev_w;
        let rcp_prev_h = 1.0 / prev_h;

        let src_w = src_size.0 as f32;
        let src_h = src_size.1 as f32;
        let rcp_src_w = 1.0 / src_w;
        let rcp_src_h = 1.0 / src_h;

        Self {
            prev_resolution: [prev_w, prev_h, rcp_prev_w, rcp_prev_h],
            prev_rect: [
                source_rect.x as f32 * rcp_prev_w,
                source_rect.y as f32 * rcp_prev_h,
                source_rect.width as f32 * rcp_prev_w,
                source_rect.height as f32 * rcp_prev_h,
            ],
            src_resolution: [src_w, src_h, rcp_src_w, rcp_src_h],
            window_resolution: [
                window_size.0 as f32,
                window_size.1 as f32,
                1.0 / window_size.0 as f32,
                1.0 / window_size.1 as f32,
            ],
            src_rect: [
                source_rect.x as f32 * rcp_src_w,
                source_rect.y as f32 * rcp_src_h,
                source_rect.width as f32 * rcp_src_w,
                source_rect.height as f32 * rcp_src_h,
            ],
            time: time_ms,
            layer,
            z_depth_near: depth_near,
            z_depth_far: depth_far,
            output_scale: last_output_scale,
        }
    }
}
