use serde::{Deserialize, Serialize};

/// Texture addressing mode for a pass input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureMode {
    Clamp,
    Repeat,
    MirroredRepeat,
}

impl TextureMode {
    pub fn address_mode(self) -> wgpu::AddressMode {
        match self {
            TextureMode::Clamp => wgpu::AddressMode::ClampToEdge,
            TextureMode::Repeat => wgpu::AddressMode::Repeat,
            TextureMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    Linear,
    Point,
}

impl TextureFilter {
    pub fn filter_mode(self) -> wgpu::FilterMode {
        match self {
            TextureFilter::Linear => wgpu::FilterMode::Linear,
            TextureFilter::Point => wgpu::FilterMode::Nearest,
        }
    }
}

/// Sampler state shared by every input variant. Both fields are required in
/// the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerDef {
    pub texture_mode: TextureMode,
    pub texture_filter: TextureFilter,
}

impl SamplerDef {
    pub fn clamp_linear() -> Self {
        Self {
            texture_mode: TextureMode::Clamp,
            texture_filter: TextureFilter::Linear,
        }
    }
}

/// Where a pass input's texture comes from. The input's texture unit is its
/// position in the pass's `inputs` array, not a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputDef {
    /// An image supplied by the user, loaded from disk.
    UserImage {
        path: String,
        #[serde(flatten)]
        sampler: SamplerDef,
    },
    /// An image packaged alongside the shader source.
    InternalImage {
        path: String,
        #[serde(flatten)]
        sampler: SamplerDef,
    },
    /// The live color buffer the effect is being applied to.
    ColorBuffer {
        #[serde(flatten)]
        sampler: SamplerDef,
    },
    /// The live depth buffer, when the caller provides one.
    DepthBuffer {
        #[serde(flatten)]
        sampler: SamplerDef,
    },
    /// Output of the immediately preceding pass (or, for the first pass and
    /// texture unit 0, the previous shader's output).
    PreviousPass {
        #[serde(flatten)]
        sampler: SamplerDef,
    },
    /// Output of an explicitly indexed earlier pass. `index` is validated
    /// against the pass count at load time.
    ExplicitPass {
        index: u32,
        #[serde(flatten)]
        sampler: SamplerDef,
    },
}

impl InputDef {
    pub fn sampler(&self) -> SamplerDef {
        match self {
            InputDef::UserImage { sampler, .. }
            | InputDef::InternalImage { sampler, .. }
            | InputDef::ColorBuffer { sampler }
            | InputDef::DepthBuffer { sampler }
            | InputDef::PreviousPass { sampler }
            | InputDef::ExplicitPass { sampler, .. } => *sampler,
        }
    }

    pub fn is_depth_buffer(&self) -> bool {
        matches!(self, InputDef::DepthBuffer { .. })
    }

    pub fn is_color_buffer(&self) -> bool {
        matches!(self, InputDef::ColorBuffer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_pass_input_from_json() {
        let json = r#"{"type":"previous_pass","texture_mode":"clamp","texture_filter":"linear"}"#;
        let input: InputDef = serde_json::from_str(json).unwrap();
        assert_eq!(
            input,
            InputDef::PreviousPass {
                sampler: SamplerDef::clamp_linear()
            }
        );
    }

    #[test]
    fn explicit_pass_carries_index() {
        let json = r#"{"type":"explicit_pass","index":2,
            "texture_mode":"repeat","texture_filter":"point"}"#;
        let input: InputDef = serde_json::from_str(json).unwrap();
        match input {
            InputDef::ExplicitPass { index, sampler } => {
                assert_eq!(index, 2);
                assert_eq!(sampler.texture_mode, TextureMode::Repeat);
                assert_eq!(sampler.texture_filter, TextureFilter::Point);
            }
            other => panic!("expected ExplicitPass, got {other:?}"),
        }
    }

    #[test]
    fn user_image_requires_path() {
        let json = r#"{"type":"user_image","texture_mode":"clamp","texture_filter":"linear"}"#;
        assert!(serde_json::from_str::<InputDef>(json).is_err());
    }

    #[test]
    fn sampler_state_is_required() {
        let json = r#"{"type":"color_buffer"}"#;
        assert!(serde_json::from_str::<InputDef>(json).is_err());
    }

    #[test]
    fn point_filter_maps_to_nearest() {
        assert_eq!(TextureFilter::Point.filter_mode(), wgpu::FilterMode::Nearest);
        assert_eq!(TextureFilter::Linear.filter_mode(), wgpu::FilterMode::Linear);
    }

    #[test]
    fn mirrored_repeat_maps_to_mirror() {
        assert_eq!(
            TextureMode::MirroredRepeat.address_mode(),
            wgpu::AddressMode::MirrorRepeat
        );
    }
}
