//! WGSL source generation for shader passes.
//!
//! A pass's module is assembled from: the uniform struct (builtins plus
//! packed options, kept in lockstep with `UniformLayout`), the shared
//! fullscreen-triangle vertex stage, per-input texture/sampler bindings,
//! helper functions, compile-time option constants, the user's source, and
//! the fragment entry wrapper.

use std::fmt::Write;

use crate::config::InputDef;
use crate::error::CompileError;

use super::options::{RuntimeOption, UniformLayout};

/// Fullscreen triangle vertex stage shared by every pass. `uv0` covers the
/// previous output; `uv1` is remapped into source-buffer space.
const VERTEX_STAGE: &str = r"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv0: vec3f,
    @location(1) uv1: vec3f,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    let uv = vec2f(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    var out: VertexOutput;
    out.position = vec4f(uv * vec2f(2.0, -2.0) + vec2f(-1.0, 1.0), 0.0, 1.0);
    out.uv0 = vec3f(uv, 0.0);
    out.uv1 = vec3f(u.src_rect.xy + u.src_rect.zw * uv, 0.0);
    return out;
}
";

/// Self-contained shader for the final scaling blit into the destination.
pub const BLIT_SHADER: &str = r"
struct BlitOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> BlitOutput {
    let uv = vec2f(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    var out: BlitOutput;
    out.position = vec4f(uv * vec2f(2.0, -2.0) + vec2f(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var blit_tex: texture_2d_array<f32>;
@group(0) @binding(1) var blit_samp: sampler;

@fragment
fn fs_main(@builtin(position) position: vec4f, @location(0) uv: vec2f) -> @location(0) vec4f {
    return textureSampleLevel(blit_tex, blit_samp, uv, 0, 0.0);
}
";

/// The uniform struct declaration plus its binding. Field order and padding
/// mirror `pack_uniforms` exactly.
pub fn uniform_header(options: &[RuntimeOption], layout: &UniformLayout) -> String {
    let mut out = String::from(
        "struct ShaderUniforms {\n\
         \x20   prev_resolution: vec4f,\n\
         \x20   prev_rect: vec4f,\n\
         \x20   src_resolution: vec4f,\n\
         \x20   window_resolution: vec4f,\n\
         \x20   src_rect: vec4f,\n\
         \x20   u_time: i32,\n\
         \x20   u_layer: i32,\n\
         \x20   z_depth_near: f32,\n\
         \x20   z_depth_far: f32,\n\
         \x20   output_scale: f32,\n",
    );

    let mut pad_counter = 0;
    let mut pad = |out: &mut String, count: u32| {
        for _ in 0..count {
            let _ = writeln!(out, "    _pad{pad_counter}: f32,");
            pad_counter += 1;
        }
    };

    for (option, slot) in options
        .iter()
        .filter(|o| !o.compile_time)
        .zip(&layout.slots)
    {
        pad(&mut out, slot.pad_before);
        let _ = writeln!(out, "    {}: {},", option.name, option.wgsl_type());
        pad(&mut out, slot.pad_after);
    }
    pad(&mut out, layout.tail_words);

    out.push_str("}\n\n@group(0) @binding(0) var<uniform> u: ShaderUniforms;\n");
    out
}

/// Module-scope constants for compile-time options.
fn constants_block(options: &[RuntimeOption]) -> String {
    let mut out = String::new();
    for option in options.iter().filter(|o| o.compile_time) {
        let ty = option.wgsl_type();
        let _ = writeln!(out, "const {}: {} = {};", option.name, ty, option.wgsl_literal());
    }
    out
}

/// Texture/sampler bindings for a pass's inputs. Binding 0 is the uniform
/// buffer; input `i` occupies bindings `1 + 2i` and `2 + 2i`.
fn bindings_block(inputs: &[InputDef]) -> String {
    let mut out = String::new();
    for i in 0..inputs.len() {
        let _ = writeln!(
            out,
            "@group(0) @binding({}) var tex{i}: texture_2d_array<f32>;",
            1 + 2 * i
        );
        let _ = writeln!(out, "@group(0) @binding({}) var samp{i}: sampler;", 2 + 2 * i);
    }
    out
}

fn first_index(inputs: &[InputDef], pred: impl Fn(&InputDef) -> bool) -> Option<usize> {
    inputs.iter().position(pred)
}

/// Helper functions available to user source.
fn helpers_block(inputs: &[InputDef]) -> String {
    let mut out = String::from(
        r"
var<private> v_tex0: vec3f;
var<private> v_tex1: vec3f;
var<private> v_fragcoord: vec4f;
var<private> ocol0: vec4f;

fn SetOutput(color: vec4f) {
    ocol0 = color;
}

fn GetCoordinates() -> vec2f {
    return v_tex0.xy;
}

fn GetBufferCoordinates() -> vec2f {
    return v_tex1.xy;
}

fn GetFragmentCoord() -> vec2f {
    return v_fragcoord.xy;
}

fn GetResolution() -> vec2f {
    return u.prev_resolution.xy;
}

fn GetInvResolution() -> vec2f {
    return u.prev_resolution.zw;
}

fn GetWindowResolution() -> vec2f {
    return u.window_resolution.xy;
}

fn GetTime() -> i32 {
    return u.u_time;
}

fn GetLayer() -> i32 {
    return u.u_layer;
}

fn GetOutputScale() -> f32 {
    return u.output_scale;
}

fn ToLinearDepth(depth: f32) -> f32 {
    return u.z_depth_near * u.z_depth_far
        / (u.z_depth_far - depth * (u.z_depth_far - u.z_depth_near));
}
",
    );

    // Dynamic dispatch over concrete bindings; sampling stays at level 0 so
    // it is legal in non-uniform control flow. Only the caller's buffers are
    // layered; everything else in the chain is a single-layer array.
    out.push_str("\nfn SampleInputLocation(index: i32, uv: vec2f) -> vec4f {\n");
    out.push_str("    var result = vec4f(0.0);\n    switch index {\n");
    for (i, input) in inputs.iter().enumerate() {
        let layer = if input.is_color_buffer() || input.is_depth_buffer() {
            "u.u_layer"
        } else {
            "0"
        };
        let _ = writeln!(
            out,
            "        case {i}: {{ result = textureSampleLevel(tex{i}, samp{i}, uv, {layer}, 0.0); }}"
        );
    }
    out.push_str("        default: {}\n    }\n    return result;\n}\n");
    out.push_str(
        "\nfn SampleInput(index: i32) -> vec4f {\n    return SampleInputLocation(index, v_tex0.xy);\n}\n",
    );

    if let Some(i) = first_index(inputs, |input| {
        matches!(input, InputDef::PreviousPass { .. })
    }) {
        let _ = writeln!(out, "\nconst PREV_OUTPUT_INPUT_INDEX: i32 = {i};");
        out.push_str(
            "\nfn SamplePrevLocation(uv: vec2f) -> vec4f {\n    return SampleInputLocation(PREV_OUTPUT_INPUT_INDEX, uv);\n}\n\
             \nfn SamplePrev() -> vec4f {\n    return SamplePrevLocation(v_tex0.xy);\n}\n",
        );
    }
    if let Some(i) = first_index(inputs, InputDef::is_color_buffer) {
        let _ = writeln!(out, "\nconst COLOR_BUFFER_INPUT_INDEX: i32 = {i};");
    }
    if let Some(i) = first_index(inputs, InputDef::is_depth_buffer) {
        let _ = writeln!(out, "\nconst DEPTH_BUFFER_INPUT_INDEX: i32 = {i};");
        out.push_str(
            "\nfn SampleDepthLocation(uv: vec2f) -> f32 {\n    return SampleInputLocation(DEPTH_BUFFER_INPUT_INDEX, uv).x;\n}\n\
             \nfn SampleDepth() -> f32 {\n    return SampleDepthLocation(v_tex1.xy);\n}\n",
        );
    }

    out
}

/// Fragment entry wrapper. An empty entry point compiles to a copy of
/// input 0; anything else calls the named user function.
fn footer_block(entry_point: &str) -> String {
    let body = if entry_point.is_empty() {
        "    ocol0 = SampleInput(0);".to_string()
    } else {
        format!("    {entry_point}();")
    };
    format!(
        "\n@fragment\n\
         fn fs_main(@builtin(position) position: vec4f, @location(0) uv0: vec3f, @location(1) uv1: vec3f) -> @location(0) vec4f {{\n\
         \x20   v_tex0 = uv0;\n\
         \x20   v_tex1 = uv1;\n\
         \x20   v_fragcoord = position;\n\
         {body}\n\
         \x20   return ocol0;\n\
         }}\n"
    )
}

/// Assemble the complete WGSL module for one pass.
pub fn pass_source(
    user_source: &str,
    entry_point: &str,
    inputs: &[InputDef],
    options: &[RuntimeOption],
    layout: &UniformLayout,
) -> String {
    let mut out = uniform_header(options, layout);
    out.push_str(VERTEX_STAGE);
    out.push_str(&bindings_block(inputs));
    out.push_str(&helpers_block(inputs));
    out.push_str(&constants_block(options));
    out.push('\n');
    out.push_str(user_source);
    out.push_str(&footer_block(entry_point));
    out
}

/// Parse and validate WGSL before handing it to the device. wgpu reports
/// shader errors asynchronously; this catches them inline so a broken
/// effect can be cleared to a no-op immediately.
pub fn validate(source: &str, shader_name: &str) -> Result<(), CompileError> {
    let module =
        naga::front::wgsl::parse_str(source).map_err(|e| CompileError::ShaderParse {
            shader: shader_name.to_string(),
            message: e.emit_to_string(source),
        })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| CompileError::ShaderValidation {
        shader: shader_name.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}
