//! One compiled render pass of an effect shader.

use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BufferBindingType, ColorTargetState, Device, FragmentState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PrimitiveState, Queue, RenderPipeline, SamplerBindingType,
    ShaderStages, TextureFormat, TextureSampleType, TextureViewDimension, VertexState,
};

use crate::config::PassDef;
use crate::error::CompileError;

use super::input::{ImageDirs, RuntimeInput};
use super::{EFB_HEIGHT, EFB_WIDTH, codegen};

/// Pixel size of a pass's output target.
///
/// Positive scales multiply the incoming size. Negative scales are fractions
/// of native EFB space: the incoming size is first mapped back through the
/// scaled EFB target, so `-1.0` is native resolution no matter the internal
/// upscale factor.
pub fn output_size(
    output_scale: f32,
    width: u32,
    height: u32,
    efb_target_size: (u32, u32),
) -> (u32, u32) {
    if output_scale < 0.0 {
        let native_scale = -output_scale;
        let native_width = width * EFB_WIDTH / efb_target_size.0;
        let native_height = height * EFB_HEIGHT / efb_target_size.1;
        (
            ((native_width as f32 * native_scale).round() as u32).max(1),
            ((native_height as f32 * native_scale).round() as u32).max(1),
        )
    } else {
        (
            ((width as f32 * output_scale) as u32).max(1),
            ((height as f32 * output_scale) as u32).max(1),
        )
    }
}

/// Render target owned by a pass. Bound downstream as a one-layer array
/// texture; attached for rendering as a plain 2D view.
#[derive(Debug)]
pub struct OutputTexture {
    pub texture: wgpu::Texture,
    pub bind_view: wgpu::TextureView,
    pub target_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// A compiled pass: its resolved inputs, shader module, layout, and uniform
/// buffer. The pipeline and output target are (re)built against the current
/// chain format and size.
pub struct RuntimePass {
    pub inputs: Vec<RuntimeInput>,
    pub output_scale: f32,
    pub module: wgpu::ShaderModule,
    pub bind_group_layout: BindGroupLayout,
    pub pipeline: Option<RenderPipeline>,
    /// Builtins differ per pass, so each pass uploads into its own buffer.
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_size: u64,
    pub output: Option<OutputTexture>,
}

impl RuntimePass {
    /// Validate and compile one pass's generated WGSL, resolve its inputs,
    /// and build the static GPU objects. Pipelines and output targets come
    /// later, once the chain's format and size are known.
    pub fn compile(
        device: &Device,
        queue: &Queue,
        def: &PassDef,
        source: &str,
        shader_name: &str,
        uniform_size: u64,
        dirs: &ImageDirs,
    ) -> Result<Self, CompileError> {
        codegen::validate(source, shader_name)?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader_name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut inputs = Vec::with_capacity(def.inputs.len());
        for (unit, input_def) in def.inputs.iter().enumerate() {
            inputs.push(RuntimeInput::from_def(device, queue, input_def, unit, dirs)?);
        }

        let mut entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(uniform_size),
            },
            count: None,
        }];
        for (unit, input) in inputs.iter().enumerate() {
            entries.push(BindGroupLayoutEntry {
                binding: 1 + 2 * unit as u32,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float {
                        filterable: !input.is_depth,
                    },
                    view_dimension: TextureViewDimension::D2Array,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(BindGroupLayoutEntry {
                binding: 2 + 2 * unit as u32,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(if input.is_depth {
                    SamplerBindingType::NonFiltering
                } else {
                    SamplerBindingType::Filtering
                }),
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(shader_name),
            entries: &entries,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(shader_name),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            inputs,
            output_scale: def.output_scale,
            module,
            bind_group_layout,
            pipeline: None,
            uniform_buffer,
            uniform_size,
            output: None,
        })
    }

    /// (Re)create the render pipeline for the given target format.
    ///
    /// wgpu reports pipeline failures asynchronously, so this brackets the
    /// creation in an error scope and resolves it before returning.
    pub fn rebuild_pipeline(
        &mut self,
        device: &Device,
        format: TextureFormat,
        shader_name: &str,
    ) -> Result<(), CompileError> {
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(shader_name),
            bind_group_layouts: &[&self.bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(shader_name),
            layout: Some(&layout),
            vertex: VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            self.pipeline = None;
            return Err(CompileError::Pipeline {
                shader: shader_name.to_string(),
                message: error.to_string(),
            });
        }

        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// (Re)create this pass's output target for the given chain size.
    pub fn rebuild_output(
        &mut self,
        device: &Device,
        width: u32,
        height: u32,
        format: TextureFormat,
        efb_target_size: (u32, u32),
    ) {
        let (output_width, output_height) =
            output_size(self.output_scale, width, height, efb_target_size);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("afterimage pass output"),
            size: wgpu::Extent3d {
                width: output_width,
                height: output_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let bind_view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2Array),
            ..Default::default()
        });
        let target_view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2),
            ..Default::default()
        });
        self.output = Some(OutputTexture {
            texture,
            bind_view,
            target_view,
            width: output_width,
            height: output_height,
        });
    }
}
