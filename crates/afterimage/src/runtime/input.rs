//! Pass input resolution: config input definitions become GPU samplers,
//! loaded image textures, and references into the pass chain.

use std::path::{Path, PathBuf};

use crate::config::{InputDef, SamplerDef, TextureFilter};
use crate::error::CompileError;

/// What a bound input samples from. Buffer and chain sources are resolved
/// against live textures every frame; images are owned here.
#[derive(Debug)]
pub enum InputSource {
    /// The color buffer supplied by the caller.
    ColorBuffer,
    /// The depth buffer supplied by the caller.
    DepthBuffer,
    /// Output of the pass immediately before this one.
    PreviousPassOutput,
    /// Output of the previous enabled shader in the group (texture unit 0
    /// of a first pass).
    PreviousShaderOutput,
    /// Output of an explicitly indexed earlier pass.
    PassOutput(usize),
    /// An image loaded from disk at compile time.
    Image(ImageTexture),
}

/// An RGBA8 image uploaded as a one-layer array texture.
#[derive(Debug)]
pub struct ImageTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl ImageTexture {
    fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
    ) -> Result<Self, CompileError> {
        let image = image::open(path)
            .map_err(|e| CompileError::Image {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("afterimage input image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        Ok(Self { texture, view })
    }
}

/// A fully resolved pass input. The texture unit is the input's index in
/// the pass's binding order.
#[derive(Debug)]
pub struct RuntimeInput {
    pub source: InputSource,
    pub sampler: wgpu::Sampler,
    /// Depth inputs bind as non-filterable float textures.
    pub is_depth: bool,
}

impl RuntimeInput {
    /// Resolve one config input. `texture_unit` is the input's position in
    /// the pass's binding order.
    pub fn from_def(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        def: &InputDef,
        texture_unit: usize,
        dirs: &ImageDirs,
    ) -> Result<Self, CompileError> {
        let sampler_def = def.sampler();
        let (source, is_depth) = match def {
            InputDef::ColorBuffer { .. } => (InputSource::ColorBuffer, false),
            InputDef::DepthBuffer { .. } => (InputSource::DepthBuffer, true),
            InputDef::PreviousPass { .. } => {
                // Texture unit 0 chains from the previous enabled shader;
                // other units read the output of the pass before this one.
                let source = if texture_unit == 0 {
                    InputSource::PreviousShaderOutput
                } else {
                    InputSource::PreviousPassOutput
                };
                (source, false)
            }
            InputDef::ExplicitPass { index, .. } => {
                (InputSource::PassOutput(*index as usize), false)
            }
            InputDef::UserImage { path, .. } => {
                let full = dirs.user.join(path);
                (InputSource::Image(ImageTexture::load(device, queue, &full)?), false)
            }
            InputDef::InternalImage { path, .. } => {
                let full = dirs.shader.join(path);
                (InputSource::Image(ImageTexture::load(device, queue, &full)?), false)
            }
        };

        let sampler = create_sampler(device, sampler_def, is_depth);
        Ok(Self {
            source,
            sampler,
            is_depth,
        })
    }
}

/// Where image inputs resolve relative paths.
#[derive(Debug, Clone)]
pub struct ImageDirs {
    /// Root for `user_image` paths.
    pub user: PathBuf,
    /// Directory of the shader source, for `internal_image` paths.
    pub shader: PathBuf,
}

fn create_sampler(
    device: &wgpu::Device,
    def: SamplerDef,
    is_depth: bool,
) -> wgpu::Sampler {
    // Depth textures are non-filterable floats; force nearest regardless of
    // what the document asked for.
    let filter = if is_depth {
        TextureFilter::Point.filter_mode()
    } else {
        def.texture_filter.filter_mode()
    };
    let address = def.texture_mode.address_mode();
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("afterimage pass sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
