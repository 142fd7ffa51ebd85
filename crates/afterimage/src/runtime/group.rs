//! A compiled shader group: the ordered chain of enabled effects applied at
//! one trigger point.

use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, ColorTargetState, CommandEncoder, Device,
    FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState, Queue,
    RenderPipeline, SamplerBindingType, ShaderStages, TextureFormat, TextureSampleType,
    TextureViewDimension, VertexState,
};

use crate::config::ShaderGroupConfig;
use crate::error::CompileError;

use super::codegen::BLIT_SHADER;
use super::input::ImageDirs;
use super::shader::{ChainOutput, FinalTarget, FrameContext, RuntimeShader};
use super::{ApplyParams, Rect};

/// Whether the last pass may write directly into the destination instead of
/// going through the scaling blit: it must be unscaled, must not read the
/// color buffer it would be overwriting, and the destination must be a
/// plain single-sampled texture distinct from the source.
pub fn can_skip_final_copy(
    last_pass_scale: f32,
    last_pass_uses_color_buffer: bool,
    dest_is_source: bool,
    dest_sample_count: u32,
) -> bool {
    last_pass_scale == 1.0
        && !last_pass_uses_color_buffer
        && !dest_is_source
        && dest_sample_count == 1
}

/// Final copy pipeline, rebuilt when the destination format changes.
struct BlitPipeline {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl BlitPipeline {
    fn new(device: &Device, format: TextureFormat) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("afterimage blit"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("afterimage blit"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("afterimage blit"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("afterimage blit"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &module,
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
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("afterimage blit"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            pipeline,
            layout,
            sampler,
        }
    }
}

/// Runtime counterpart of a `ShaderGroupConfig`.
///
/// Holds the compiled shaders in execution order plus the render targets
/// sized to the last destination it was applied to. A compile failure
/// clears the whole group; it stays inert until the next config change.
#[derive(Default)]
pub struct RuntimeShaderGroup {
    last_change_count: Option<u32>,
    shaders: Vec<RuntimeShader>,
    target_width: u32,
    target_height: u32,
    target_format: Option<TextureFormat>,
    blit: Option<BlitPipeline>,
}

impl RuntimeShaderGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Observe the group config's change counter and (re)compile as needed.
    pub fn update_config(
        &mut self,
        device: &Device,
        queue: &Queue,
        group: &ShaderGroupConfig,
        dirs: &ImageDirs,
        force_recompile: bool,
    ) {
        let needs_compile = self.last_change_count != Some(group.changes()) || force_recompile;
        self.last_change_count = Some(group.changes());

        if needs_compile {
            if !self.create_shaders(device, queue, group, dirs) {
                self.shaders.clear();
            }
            return;
        }

        let mut failure = false;
        let mut any_recompiled = false;
        let enabled = group.ordered_shaders().filter(|c| c.enabled);
        for (shader, config) in self.shaders.iter_mut().zip(enabled) {
            match shader.update_config(device, queue, config, dirs) {
                Ok(recompiled) => {
                    config.runtime_info().set_error(false);
                    any_recompiled |= recompiled;
                }
                Err(e) => {
                    log::error!("failed to update '{}': {e}", config.name);
                    config.runtime_info().set_error(true);
                    failure = true;
                    break;
                }
            }
        }

        if failure {
            self.shaders.clear();
        } else if any_recompiled {
            // Fresh passes have no targets or pipelines yet; force the
            // resize path on the next application.
            self.invalidate_targets();
        }
    }

    /// Run every shader against the frame described by `params`, leaving
    /// the result in `params.dest_rect` of the destination. Empty groups do
    /// nothing.
    pub fn apply(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        params: &ApplyParams<'_>,
        time_ms: i32,
        depth_near: f32,
        depth_far: f32,
    ) {
        if self.shaders.is_empty() {
            return;
        }

        if let Err(e) = self.ensure_targets(device, params) {
            log::error!("failed to build group render targets: {e}");
            self.shaders.clear();
            return;
        }

        let color_view = params
            .source_color
            .create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(TextureViewDimension::D2Array),
                ..Default::default()
            });
        let depth_view = params.source_depth.map(|texture| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(TextureViewDimension::D2Array),
                ..Default::default()
            })
        });
        let dest_view = params
            .dest_texture
            .create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(TextureViewDimension::D2),
                base_array_layer: 0,
                array_layer_count: Some(1),
                ..Default::default()
            });

        let source_size = (
            params.source_color.width(),
            params.source_color.height(),
        );
        let frame = FrameContext {
            color_view: &color_view,
            depth_view: depth_view.as_ref(),
            source_rect: params.source_rect,
            source_size,
            window_size: params.window_size,
            efb_target_size: params.efb_target_size,
            layer: params.source_layer,
            time_ms,
            depth_near,
            depth_far,
        };

        let mut chain = ChainOutput {
            view: &color_view,
            size: source_size,
            scale: 1.0,
        };

        let Some((last, rest)) = self.shaders.split_last() else {
            return;
        };
        for shader in rest {
            chain = match shader.apply(device, queue, encoder, &frame, chain, None) {
                Ok(output) => output,
                Err(e) => {
                    log::warn!("skipping group application: {e}");
                    return;
                }
            };
        }

        let skip_final_copy = can_skip_final_copy(
            last.passes.last().map_or(1.0, |p| p.output_scale),
            last.last_pass_uses_color_buffer(),
            params.dest_texture == params.source_color,
            params.dest_texture.sample_count(),
        );

        if skip_final_copy {
            let target = FinalTarget {
                view: &dest_view,
                viewport: params.dest_rect,
            };
            if let Err(e) = last.apply(device, queue, encoder, &frame, chain, Some(&target)) {
                log::warn!("skipping group application: {e}");
            }
            return;
        }

        let output = match last.apply(device, queue, encoder, &frame, chain, None) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("skipping group application: {e}");
                return;
            }
        };
        self.blit(device, encoder, output.view, &dest_view, params.dest_rect);
    }

    fn create_shaders(
        &mut self,
        device: &Device,
        queue: &Queue,
        group: &ShaderGroupConfig,
        dirs: &ImageDirs,
    ) -> bool {
        self.invalidate_targets();
        self.shaders.clear();

        for config in group.ordered_shaders().filter(|c| c.enabled) {
            match RuntimeShader::compile(device, queue, config, dirs) {
                Ok(shader) => {
                    config.runtime_info().set_error(false);
                    self.shaders.push(shader);
                }
                Err(e) => {
                    log::error!("failed to compile '{}': {e}", config.name);
                    config.runtime_info().set_error(true);
                    return false;
                }
            }
        }
        true
    }

    fn invalidate_targets(&mut self) {
        self.target_width = 0;
        self.target_height = 0;
        self.target_format = None;
    }

    /// Rebuild output textures and pipelines when the destination changed
    /// since the last application.
    fn ensure_targets(
        &mut self,
        device: &Device,
        params: &ApplyParams<'_>,
    ) -> Result<(), CompileError> {
        let width = params.dest_rect.width as u32;
        let height = params.dest_rect.height as u32;
        let format = params.dest_texture.format();

        if self.target_width == width
            && self.target_height == height
            && self.target_format == Some(format)
        {
            return Ok(());
        }
        let rebuild_pipelines = self.target_format != Some(format);
        self.target_width = width;
        self.target_height = height;
        self.target_format = Some(format);

        for shader in &mut self.shaders {
            shader.rebuild_outputs(device, width, height, format, params.efb_target_size);
            if rebuild_pipelines {
                shader.rebuild_pipelines(device, format)?;
            }
        }
        if rebuild_pipelines {
            self.blit = Some(BlitPipeline::new(device, format));
        }
        Ok(())
    }

    fn blit(
        &self,
        device: &Device,
        encoder: &mut CommandEncoder,
        source: &wgpu::TextureView,
        dest: &wgpu::TextureView,
        dest_rect: Rect,
    ) {
        let Some(blit) = &self.blit else {
            log::error!("blit pipeline missing; dropping final copy");
            return;
        };
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("afterimage blit"),
            layout: &blit.layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(source),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&blit.sampler),
                },
            ],
        });
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("afterimage blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dest,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&blit.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_viewport(
            dest_rect.x as f32,
            dest_rect.y as f32,
            dest_rect.width as f32,
            dest_rect.height as f32,
            0.0,
            1.0,
        );
        rpass.set_scissor_rect(
            dest_rect.x as u32,
            dest_rect.y as u32,
            dest_rect.width as u32,
            dest_rect.height as u32,
        );
        rpass.draw(0..3, 0..1);
    }
}
