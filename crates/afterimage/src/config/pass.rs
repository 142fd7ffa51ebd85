use serde::{Deserialize, Serialize};

use super::input::{InputDef, SamplerDef};

/// One draw invocation within an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDef {
    /// Function the generated fragment stage calls. An empty string compiles
    /// to a plain copy of the previous output.
    pub entry_point: String,
    pub inputs: Vec<InputDef>,
    /// Positive: fraction of the current render-target size. Negative: the
    /// magnitude is a fraction of native (EFB-space) size instead.
    #[serde(default = "default_scale")]
    pub output_scale: f32,
    /// Name of a bool/enum option gating whether this pass is compiled at
    /// all. Empty means always included.
    #[serde(default)]
    pub dependent_option: String,
}

fn default_scale() -> f32 {
    1.0
}

impl PassDef {
    /// The pass used when a shader has no sidecar config: sample the
    /// previous output at full scale through `main`.
    pub fn default_pass() -> Self {
        Self {
            entry_point: "main".into(),
            inputs: vec![InputDef::PreviousPass {
                sampler: SamplerDef::clamp_linear(),
            }],
            output_scale: 1.0,
            dependent_option: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn pass_defaults() {
        let json = r#"{"entry_point":"main","inputs":[
            {"type":"previous_pass","texture_mode":"clamp","texture_filter":"linear"}]}"#;
        let pass: PassDef = serde_json::from_str(json).unwrap();
        assert!(approx_eq(pass.output_scale, 1.0, 1e-6));
        assert!(pass.dependent_option.is_empty());
        assert_eq!(pass.inputs.len(), 1);
    }

    #[test]
    fn entry_point_is_required() {
        let json = r#"{"inputs":[]}"#;
        assert!(serde_json::from_str::<PassDef>(json).is_err());
    }

    #[test]
    fn inputs_are_required() {
        let json = r#"{"entry_point":"main"}"#;
        assert!(serde_json::from_str::<PassDef>(json).is_err());
    }

    #[test]
    fn default_pass_shape() {
        let pass = PassDef::default_pass();
        assert_eq!(pass.entry_point, "main");
        assert!(approx_eq(pass.output_scale, 1.0, 1e-6));
        assert!(matches!(pass.inputs[0], InputDef::PreviousPass { .. }));
    }

    #[test]
    fn negative_scale_parses() {
        let json = r#"{"entry_point":"downsample","inputs":[],"output_scale":-0.5}"#;
        let pass: PassDef = serde_json::from_str(json).unwrap();
        assert!(approx_eq(pass.output_scale, -0.5, 1e-6));
    }
}
