//! A compiled effect shader: its pass chain, option values, and the dirty
//! tracking that keeps it in sync with its config.

use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, CommandEncoder, Device, Queue,
    TextureFormat, TextureView,
};

use crate::config::{PassDef, ShaderConfig};
use crate::error::CompileError;

use super::Rect;
use super::builtins::BuiltinUniforms;
use super::codegen;
use super::input::{ImageDirs, InputSource};
use super::options::{RuntimeOption, UniformLayout, pack_uniforms};
use super::pass::RuntimePass;

/// What a config's change counters demand of the compiled shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    /// Value-only edits: re-copy option values, uniforms re-upload next
    /// frame as a matter of course.
    UniformsOnly,
    /// Source-invalidating edits: regenerate and recompile every pass.
    Recompile,
}

pub fn dirty_state(
    last_changes: u32,
    last_compiletime_changes: u32,
    changes: u32,
    compiletime_changes: u32,
) -> DirtyState {
    if compiletime_changes != last_compiletime_changes {
        DirtyState::Recompile
    } else if changes != last_changes {
        DirtyState::UniformsOnly
    } else {
        DirtyState::Clean
    }
}

/// Indices of the passes that survive dependent-option gating. A pass
/// naming a disabled option is dropped from the compiled chain entirely;
/// toggling such an option is a compile-time change.
pub fn active_pass_indices(config: &ShaderConfig) -> Vec<usize> {
    config
        .passes
        .iter()
        .enumerate()
        .filter(|(_, pass)| {
            pass.dependent_option.is_empty()
                || config
                    .options
                    .iter()
                    .find(|o| o.name == pass.dependent_option)
                    .is_none_or(|o| o.is_enabled_value())
        })
        .map(|(i, _)| i)
        .collect()
}

/// Per-frame sampling context shared by every pass of every shader in a
/// group application.
pub struct FrameContext<'a> {
    pub color_view: &'a TextureView,
    pub depth_view: Option<&'a TextureView>,
    pub source_rect: Rect,
    /// Size of the source color texture.
    pub source_size: (u32, u32),
    pub window_size: (u32, u32),
    pub efb_target_size: (u32, u32),
    pub layer: i32,
    pub time_ms: i32,
    pub depth_near: f32,
    pub depth_far: f32,
}

/// Destination for a shader allowed to write its last pass straight into
/// the caller's framebuffer.
pub struct FinalTarget<'a> {
    pub view: &'a TextureView,
    pub viewport: Rect,
}

/// Where a shader chain left off: the texture the next shader (or the
/// final copy) reads, its size, and the scale of the pass that wrote it.
pub struct ChainOutput<'a> {
    pub view: &'a TextureView,
    pub size: (u32, u32),
    pub scale: f32,
}

pub struct RuntimeShader {
    pub name: String,
    last_changes: u32,
    last_compiletime_changes: u32,
    options: Vec<RuntimeOption>,
    layout: UniformLayout,
    pub passes: Vec<RuntimePass>,
}

impl RuntimeShader {
    /// Compile every active pass of a config. Fails if compilation fails or
    /// gating leaves no passes at all.
    pub fn compile(
        device: &Device,
        queue: &Queue,
        config: &ShaderConfig,
        dirs: &ImageDirs,
    ) -> Result<Self, CompileError> {
        let options: Vec<RuntimeOption> =
            config.options.iter().map(RuntimeOption::from_config).collect();
        let layout = UniformLayout::compute(&options);

        let active = active_pass_indices(config);
        if active.is_empty() {
            return Err(CompileError::NoPasses {
                shader: config.name.clone(),
            });
        }

        // Config pass index -> position in the compiled (gated) chain.
        let mut remap = vec![None; config.passes.len()];
        for (position, index) in active.iter().enumerate() {
            remap[*index] = Some(position);
        }

        let mut passes = Vec::with_capacity(active.len());
        for index in active {
            let def: &PassDef = &config.passes[index];
            let source = codegen::pass_source(
                &config.shader_source,
                &def.entry_point,
                &def.inputs,
                &options,
                &layout,
            );
            passes.push(RuntimePass::compile(
                device,
                queue,
                def,
                &source,
                &config.name,
                layout.size_bytes(),
                dirs,
            )?);
        }

        // Explicit pass references use config indices; point them at the
        // compiled chain instead. A reference to a gated-off pass is an
        // authoring error, and a pass may never sample its own output (the
        // texture would be bound while attached for rendering).
        for (position, pass) in passes.iter_mut().enumerate() {
            for input in &mut pass.inputs {
                if let InputSource::PassOutput(index) = &mut input.source {
                    match remap.get(*index).copied().flatten() {
                        Some(target) if target == position => {
                            return Err(CompileError::ShaderValidation {
                                shader: config.name.clone(),
                                message: format!("pass {position} references its own output"),
                            });
                        }
                        Some(target) => *index = target,
                        None => {
                            return Err(CompileError::ShaderValidation {
                                shader: config.name.clone(),
                                message: format!(
                                    "pass input references disabled pass {index}"
                                ),
                            });
                        }
                    }
                }
            }
        }

        Ok(Self {
            name: config.name.clone(),
            last_changes: config.changes(),
            last_compiletime_changes: config.compiletime_changes(),
            options,
            layout,
            passes,
        })
    }

    /// Fold config edits in. Returns true when the pass chain was rebuilt,
    /// in which case the owning group must recreate targets and pipelines.
    pub fn update_config(
        &mut self,
        device: &Device,
        queue: &Queue,
        config: &ShaderConfig,
        dirs: &ImageDirs,
    ) -> Result<bool, CompileError> {
        let state = dirty_state(
            self.last_changes,
            self.last_compiletime_changes,
            config.changes(),
            config.compiletime_changes(),
        );
        self.last_changes = config.changes();
        self.last_compiletime_changes = config.compiletime_changes();

        match state {
            DirtyState::Clean => Ok(false),
            DirtyState::UniformsOnly => {
                for (option, def) in self.options.iter_mut().zip(&config.options) {
                    option.update(def);
                }
                Ok(false)
            }
            DirtyState::Recompile => {
                let rebuilt = Self::compile(device, queue, config, dirs)?;
                *self = rebuilt;
                Ok(true)
            }
        }
    }

    /// (Re)create every pass's output target for the current chain size.
    pub fn rebuild_outputs(
        &mut self,
        device: &Device,
        width: u32,
        height: u32,
        format: TextureFormat,
        efb_target_size: (u32, u32),
    ) {
        for pass in &mut self.passes {
            pass.rebuild_output(device, width, height, format, efb_target_size);
        }
    }

    pub fn rebuild_pipelines(
        &mut self,
        device: &Device,
        format: TextureFormat,
    ) -> Result<(), CompileError> {
        let name = self.name.clone();
        for pass in &mut self.passes {
            pass.rebuild_pipeline(device, format, &name)?;
        }
        Ok(())
    }

    /// Run the pass chain. `prev` is the output of the previous enabled
    /// shader (the source color buffer for the first one). When
    /// `final_target` is set the last pass writes there instead of into its
    /// own output texture.
    pub fn apply<'a>(
        &'a self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        frame: &FrameContext<'a>,
        prev: ChainOutput<'a>,
        final_target: Option<&FinalTarget<'_>>,
    ) -> Result<ChainOutput<'a>, CompileError> {
        let mut last_view = prev.view;
        let mut last_size = prev.size;
        let mut last_scale = prev.scale;

        for (i, pass) in self.passes.iter().enumerate() {
            let is_last = i + 1 == self.passes.len();

            let builtins = BuiltinUniforms::compute(
                last_size,
                frame.source_size,
                frame.source_rect,
                frame.window_size,
                frame.time_ms,
                frame.layer,
                frame.depth_near,
                frame.depth_far,
                last_scale,
            );
            let bytes = pack_uniforms(&builtins, &self.options, &self.layout);
            queue.write_buffer(&pass.uniform_buffer, 0, &bytes);

            let bind_group = self.create_bind_group(device, pass, frame, prev.view, last_view)?;
            let pipeline = pass.pipeline.as_ref().ok_or_else(|| CompileError::Pipeline {
                shader: self.name.clone(),
                message: "pipeline not built for current target format".into(),
            })?;
            let output = pass.output.as_ref().ok_or_else(|| CompileError::Pipeline {
                shader: self.name.clone(),
                message: "output target not built for current chain size".into(),
            })?;

            let final_pass_target = if is_last { final_target } else { None };
            let target_view = final_pass_target.map_or(&output.target_view, |t| t.view);
            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&self.name),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            // Writing into the caller's framebuffer must not
                            // clobber pixels outside the viewport.
                            load: if final_pass_target.is_some() {
                                wgpu::LoadOp::Load
                            } else {
                                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                if let Some(target) = final_pass_target {
                    let r = target.viewport;
                    rpass.set_viewport(
                        r.x as f32,
                        r.y as f32,
                        r.width as f32,
                        r.height as f32,
                        0.0,
                        1.0,
                    );
                    rpass.set_scissor_rect(
                        r.x as u32,
                        r.y as u32,
                        r.width as u32,
                        r.height as u32,
                    );
                }
                rpass.draw(0..3, 0..1);
            }

            last_view = &output.bind_view;
            last_size = (output.width, output.height);
            last_scale = pass.output_scale;
        }

        Ok(ChainOutput {
            view: last_view,
            size: last_size,
            scale: last_scale,
        })
    }

    /// Whether the last pass reads the color buffer directly; such a chain
    /// cannot skip the final copy.
    pub fn last_pass_uses_color_buffer(&self) -> bool {
        self.passes.last().is_some_and(|pass| {
            pass.inputs
                .iter()
                .any(|input| matches!(input.source, InputSource::ColorBuffer))
        })
    }

    fn create_bind_group(
        &self,
        device: &Device,
        pass: &RuntimePass,
        frame: &FrameContext<'_>,
        prev_shader_view: &TextureView,
        prev_pass_view: &TextureView,
    ) -> Result<wgpu::BindGroup, CompileError> {
        let mut entries = vec![BindGroupEntry {
            binding: 0,
            resource: pass.uniform_buffer.as_entire_binding(),
        }];
        for (unit, input) in pass.inputs.iter().enumerate() {
            let view: &TextureView = match &input.source {
                InputSource::ColorBuffer => frame.color_view,
                InputSource::DepthBuffer => {
                    frame
                        .depth_view
                        .ok_or_else(|| CompileError::MissingDepthBuffer {
                            shader: self.name.clone(),
                        })?
                }
                InputSource::PreviousShaderOutput => prev_shader_view,
                InputSource::PreviousPassOutput => prev_pass_view,
                InputSource::PassOutput(index) => {
                    let output = self.passes[*index].output.as_ref().ok_or_else(|| {
                        CompileError::Pipeline {
                            shader: self.name.clone(),
                            message: format!("pass {index} output not built"),
                        }
                    })?;
                    &output.bind_view
                }
                InputSource::Image(image) => &image.view,
            };
            entries.push(BindGroupEntry {
                binding: 1 + 2 * unit as u32,
                resource: BindingResource::TextureView(view),
            });
            entries.push(BindGroupEntry {
                binding: 2 + 2 * unit as u32,
                resource: BindingResource::Sampler(&input.sampler),
            });
        }
        Ok(device.create_bind_group(&BindGroupDescriptor {
            label: Some(&self.name),
            layout: &pass.bind_group_layout,
            entries: &entries,
        }))
    }
}
