use crate::config::{OptionDef, OptionValue};

use super::builtins::{self, BuiltinUniforms};

/// A config option lifted into the runtime: just the bits uniform packing
/// and codegen need.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOption {
    pub name: String,
    pub compile_time: bool,
    pub value: OptionValue,
}

impl RuntimeOption {
    pub fn from_config(def: &OptionDef) -> Self {
        Self {
            name: def.name.clone(),
            compile_time: def.is_constant,
            value: def.value.clone(),
        }
    }

    /// Copy the live value in after a value-only config edit. Compile-time
    /// options are baked into shader source; their edits arrive through the
    /// recompile path instead.
    pub fn update(&mut self, def: &OptionDef) {
        if !self.compile_time {
            self.value = def.value.clone();
        }
    }

    pub fn components(&self) -> u32 {
        self.value.components()
    }

    /// WGSL type of the uniform field for this option.
    pub fn wgsl_type(&self) -> &'static str {
        match (&self.value, self.components()) {
            (OptionValue::Bool(_), _) => "u32",
            (OptionValue::Int(_), 1) => "i32",
            (OptionValue::Int(_), 2) => "vec2i",
            (OptionValue::Int(_), 3) => "vec3i",
            (OptionValue::Int(_), _) => "vec4i",
            (OptionValue::Float(_), 1) => "f32",
            (OptionValue::Float(_), 2) => "vec2f",
            (OptionValue::Float(_), 3) => "vec3f",
            (OptionValue::Float(_), _) => "vec4f",
        }
    }

    /// WGSL literal for compile-time-constant emission.
    pub fn wgsl_literal(&self) -> String {
        match &self.value {
            OptionValue::Bool(b) => format!("{}u", u32::from(*b)),
            OptionValue::Int(v) => match v.as_slice() {
                [x] => format!("{x}"),
                many => format!(
                    "{}({})",
                    self.wgsl_type(),
                    many.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            OptionValue::Float(v) => match v.as_slice() {
                [x] => format!("{x:?}"),
                many => format!(
                    "{}({})",
                    self.wgsl_type(),
                    many.iter()
                        .map(|x| format!("{x:?}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
        }
    }
}

/// One packed uniform slot: padding words inserted before the value, the
/// value's component count, and padding words after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub pad_before: u32,
    pub components: u32,
    pub pad_after: u32,
}

/// The uniform buffer layout for an ordered option list.
///
/// Builtins occupy the first 25 words; each non-constant option follows in
/// declaration order with 4-component alignment-group padding. This one
/// computation feeds both the staging-buffer writer and the generated
/// struct declarations, so the binary layout and the shader text cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    /// One slot per non-compile-time option, in declaration order.
    pub slots: Vec<Slot>,
    /// Trailing padding words closing the final alignment group.
    pub tail_words: u32,
    /// Total buffer size in 32-bit words, builtins and tail included.
    pub total_words: u32,
}

impl UniformLayout {
    pub fn compute(options: &[RuntimeOption]) -> Self {
        let mut max_components = builtins::MAX_COMPONENTS;
        let mut total = builtins::TOTAL_COMPONENTS;
        let mut slots = Vec::new();

        for option in options.iter().filter(|o| !o.compile_time) {
            let components = option.components();

            let remainder = total % components;
            let mut pad_before = 0;
            if remainder != 0 {
                pad_before = max_components - remainder;
            }
            // WGSL places vec3 uniform fields on 16-byte boundaries; pad up
            // when the running offset would not.
            if components == 3 && (total + pad_before) % 4 != 0 {
                pad_before += 4 - ((total + pad_before) % 4);
            }

            total += pad_before + components;

            let mut pad_after = 0;
            if components == 3 {
                pad_after = 1;
                total += 1;
            }

            slots.push(Slot {
                pad_before,
                components,
                pad_after,
            });
            max_components = max_components.max(components);
        }

        let remainder = total % max_components;
        let tail_words = if remainder != 0 {
            max_components - remainder
        } else {
            0
        };
        total += tail_words;

        Self {
            slots,
            tail_words,
            total_words: total,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        u64::from(self.total_words) * 4
    }
}

/// Serialize builtins plus option values into one staging buffer laid out
/// per `layout`.
pub fn pack_uniforms(
    builtins: &BuiltinUniforms,
    options: &[RuntimeOption],
    layout: &UniformLayout,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout.size_bytes() as usize);
    out.extend_from_slice(bytemuck::bytes_of(builtins));

    for (option, slot) in options
        .iter()
        .filter(|o| !o.compile_time)
        .zip(&layout.slots)
    {
        out.resize(out.len() + slot.pad_before as usize * 4, 0);
        option.value.write_words(&mut out);
        out.resize(out.len() + slot.pad_after as usize * 4, 0);
    }

    out.resize(layout.size_bytes() as usize, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(name: &str, value: f32) -> RuntimeOption {
        RuntimeOption {
            name: name.into(),
            compile_time: false,
            value: OptionValue::Float(vec![value]),
        }
    }

    fn floatn(name: &str, values: &[f32]) -> RuntimeOption {
        RuntimeOption {
            name: name.into(),
            compile_time: false,
            value: OptionValue::Float(values.to_vec()),
        }
    }

    #[test]
    fn empty_layout_is_builtins_only() {
        let layout = UniformLayout::compute(&[]);
        assert!(layout.slots.is_empty());
        // 25 builtin words pad out to the next group of 4.
        assert_eq!(layout.tail_words, 3);
        assert_eq!(layout.total_words, 28);
        assert_eq!(layout.size_bytes(), 112);
    }

    #[test]
    fn single_scalar() {
        let layout = UniformLayout::compute(&[float("a", 1.0)]);
        assert_eq!(layout.slots[0], Slot { pad_before: 0, components: 1, pad_after: 0 });
        assert_eq!(layout.total_words, 28);
    }

    #[test]
    fn vec4_pads_to_boundary() {
        let layout = UniformLayout::compute(&[floatn("a", &[0.0; 4])]);
        // 25 % 4 = 1, so three words of padding precede the vec4.
        assert_eq!(layout.slots[0], Slot { pad_before: 3, components: 4, pad_after: 0 });
        assert_eq!(layout.total_words, 32);
    }

    #[test]
    fn vec2_uses_group_padding() {
        let layout = UniformLayout::compute(&[floatn("a", &[0.0; 2])]);
        // 25 % 2 = 1: padding is max_components - remainder = 3.
        assert_eq!(layout.slots[0].pad_before, 3);
        assert_eq!(layout.total_words, 32);
    }

    #[test]
    fn vec3_consumes_trailing_pad() {
        let layout = UniformLayout::compute(&[floatn("a", &[0.0; 3])]);
        // 25 % 3 = 1: pad 3, landing on word 28 (16-byte aligned), then the
        // vec3 plus its forced trailing word.
        assert_eq!(layout.slots[0], Slot { pad_before: 3, components: 3, pad_after: 1 });
        assert_eq!(layout.total_words, 32);
    }

    #[test]
    fn vec3_at_unaligned_offset_gets_extra_padding() {
        // Two scalars put the vec3 at word 27: divisible by 3 but not 4.
        let opts = [float("a", 0.0), float("b", 0.0), floatn("c", &[0.0; 3])];
        let layout = UniformLayout::compute(&opts);
        assert_eq!(layout.slots[2].pad_before, 1);
        assert_eq!(layout.total_words, 32);
    }

    #[test]
    fn compile_time_options_are_excluded() {
        let opts = [
            float("a", 1.0),
            RuntimeOption {
                name: "k".into(),
                compile_time: true,
                value: OptionValue::Float(vec![0.0; 4]),
            },
        ];
        let layout = UniformLayout::compute(&opts);
        assert_eq!(layout.slots.len(), 1);
        assert_eq!(layout.total_words, 28);
    }

    #[test]
    fn size_is_deterministic_and_matches_independent_sum() {
        let opts = [
            float("a", 1.0),
            floatn("b", &[0.0; 2]),
            floatn("c", &[0.0; 3]),
            RuntimeOption {
                name: "d".into(),
                compile_time: false,
                value: OptionValue::Int(vec![1, 2, 3, 4]),
            },
        ];
        let layout = UniformLayout::compute(&opts);
        assert_eq!(layout, UniformLayout::compute(&opts));

        let component_words: u32 = layout.slots.iter().map(|s| s.components).sum();
        let padding_words: u32 = layout
            .slots
            .iter()
            .map(|s| s.pad_before + s.pad_after)
            .sum::<u32>()
            + layout.tail_words;
        assert_eq!(
            layout.total_words,
            super::builtins::TOTAL_COMPONENTS + component_words + padding_words
        );
    }

    #[test]
    fn packed_bytes_match_layout() {
        let opts = [float("a", 2.5), floatn("b", &[1.0, 2.0, 3.0, 4.0])];
        let layout = UniformLayout::compute(&opts);
        let builtins: BuiltinUniforms = bytemuck::Zeroable::zeroed();
        let bytes = pack_uniforms(&builtins, &opts, &layout);
        assert_eq!(bytes.len() as u64, layout.size_bytes());

        // "a" lands at word 25.
        let a = f32::from_le_bytes(bytes[100..104].try_into().unwrap());
        assert!((a - 2.5).abs() < 1e-6);
        // 26 % 4 = 2: vec4 "b" pads 2 words and lands at word 28.
        let b0 = f32::from_le_bytes(bytes[112..116].try_into().unwrap());
        assert!((b0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bool_packs_as_one_word() {
        let opts = [RuntimeOption {
            name: "flag".into(),
            compile_time: false,
            value: OptionValue::Bool(true),
        }];
        let layout = UniformLayout::compute(&opts);
        assert_eq!(layout.total_words, 28);
        let builtins: BuiltinUniforms = bytemuck::Zeroable::zeroed();
        let bytes = pack_uniforms(&builtins, &opts, &layout);
        assert_eq!(u32::from_le_bytes(bytes[100..104].try_into().unwrap()), 1);
    }

    #[test]
    fn wgsl_types_and_literals() {
        let opt = floatn("c", &[1.0, 0.5, 0.25]);
        assert_eq!(opt.wgsl_type(), "vec3f");
        assert_eq!(opt.wgsl_literal(), "vec3f(1.0, 0.5, 0.25)");

        let int = RuntimeOption {
            name: "n".into(),
            compile_time: true,
            value: OptionValue::Int(vec![-3]),
        };
        assert_eq!(int.wgsl_type(), "i32");
        assert_eq!(int.wgsl_literal(), "-3");

        let flag = RuntimeOption {
            name: "f".into(),
            compile_time: true,
            value: OptionValue::Bool(false),
        };
        assert_eq!(flag.wgsl_literal(), "0u");
    }
}
