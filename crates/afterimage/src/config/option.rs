use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of snapshot slots each option keeps. Snapshots are in-memory only.
pub const SNAPSHOT_SLOTS: usize = 4;

/// One user-tweakable shader option.
///
/// The variant payload (`kind`) carries the typed default/min/max/step data
/// from the config document; `value` is the live value the UI mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDef {
    pub name: String,
    /// Display name; falls back to `name` when the document omits it.
    #[serde(default)]
    pub ui_name: String,
    #[serde(default)]
    pub ui_description: String,
    #[serde(default)]
    pub group_name: String,
    /// Name of a bool/enum option that must be enabled for this option to
    /// have any effect. Purely informational at the option level; passes use
    /// the same mechanism to gate themselves.
    #[serde(default)]
    pub dependent_option: String,
    /// Baked into generated shader source as a literal instead of being
    /// uploaded as a uniform. Value edits then require recompilation.
    #[serde(default)]
    pub is_constant: bool,
    #[serde(flatten)]
    pub kind: OptionKind,
    #[serde(skip)]
    pub value: OptionValue,
    #[serde(skip)]
    pub snapshots: [Option<OptionValue>; SNAPSHOT_SLOTS],
}

impl OptionDef {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        let name = name.into();
        let value = kind.default_value();
        Self {
            ui_name: name.clone(),
            name,
            ui_description: String::new(),
            group_name: String::new(),
            dependent_option: String::new(),
            is_constant: false,
            kind,
            value,
            snapshots: Default::default(),
        }
    }

    /// Fill in derived fields after deserialization: display-name fallback
    /// and the live value, which starts at the default.
    pub fn normalize(&mut self) {
        if self.ui_name.is_empty() {
            self.ui_name = self.name.clone();
        }
        self.value = self.kind.default_value();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let OptionKind::Enum(data) = &self.kind {
            if data.ui_choices.is_empty() {
                return Err(ConfigError::InvalidOption {
                    name: self.name.clone(),
                    reason: "enum option has no choices".into(),
                });
            }
            if data.ui_choices.len() != data.values.len() {
                return Err(ConfigError::InvalidOption {
                    name: self.name.clone(),
                    reason: format!(
                        "enum option has {} labels but {} values",
                        data.ui_choices.len(),
                        data.values.len()
                    ),
                });
            }
            if data.default_index as usize >= data.values.len() {
                return Err(ConfigError::InvalidOption {
                    name: self.name.clone(),
                    reason: format!(
                        "default_index {} out of range ({} choices)",
                        data.default_index,
                        data.values.len()
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.value = self.kind.default_value();
    }

    pub fn save_snapshot(&mut self, slot: usize) {
        if slot < SNAPSHOT_SLOTS {
            self.snapshots[slot] = Some(self.value.clone());
        }
    }

    /// Restore a saved value. Loading a never-saved slot is a no-op.
    /// Returns whether the value changed.
    pub fn load_snapshot(&mut self, slot: usize) -> bool {
        if let Some(Some(saved)) = self.snapshots.get(slot) {
            if *saved != self.value {
                self.value = saved.clone();
                return true;
            }
        }
        false
    }

    pub fn has_snapshot(&self, slot: usize) -> bool {
        matches!(self.snapshots.get(slot), Some(Some(_)))
    }

    /// Whether the live value is "truthy" for dependency gating: enabled
    /// bools and non-zero first components count as enabled.
    pub fn is_enabled_value(&self) -> bool {
        match &self.value {
            OptionValue::Bool(b) => *b,
            OptionValue::Int(v) => v.first().copied().unwrap_or(0) != 0,
            OptionValue::Float(v) => v.first().copied().unwrap_or(0.0) != 0.0,
        }
    }
}

/// Typed payload of an option, tagged by the document's `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionKind {
    Bool {
        #[serde(default)]
        default: bool,
    },
    Enum(EnumData),
    Float(FloatData),
    Float2(Float2Data),
    Float3(Float3Data),
    Float4(Float4Data),
    Int(IntData),
    Int2(Int2Data),
    Int3(Int3Data),
    Int4(Int4Data),
    Rgb(RgbData),
    Rgba(RgbaData),
}

impl OptionKind {
    pub fn default_value(&self) -> OptionValue {
        match self {
            OptionKind::Bool { default } => OptionValue::Bool(*default),
            OptionKind::Enum(d) => {
                let value = d
                    .values
                    .get(d.default_index as usize)
                    .copied()
                    .unwrap_or(0);
                OptionValue::Int(vec![value])
            }
            OptionKind::Float(d) => OptionValue::Float(vec![d.default]),
            OptionKind::Float2(d) => OptionValue::Float(d.default.to_vec()),
            OptionKind::Float3(d) => OptionValue::Float(d.default.to_vec()),
            OptionKind::Float4(d) => OptionValue::Float(d.default.to_vec()),
            OptionKind::Int(d) => OptionValue::Int(vec![d.default]),
            OptionKind::Int2(d) => OptionValue::Int(d.default.to_vec()),
            OptionKind::Int3(d) => OptionValue::Int(d.default.to_vec()),
            OptionKind::Int4(d) => OptionValue::Int(d.default.to_vec()),
            OptionKind::Rgb(d) => OptionValue::Float(d.default.to_vec()),
            OptionKind::Rgba(d) => OptionValue::Float(d.default.to_vec()),
        }
    }

    /// Component count of the value in the uniform buffer (bool and enum
    /// pack as one 32-bit word).
    pub fn components(&self) -> u32 {
        match self {
            OptionKind::Bool { .. }
            | OptionKind::Enum(_)
            | OptionKind::Float(_)
            | OptionKind::Int(_) => 1,
            OptionKind::Float2(_) | OptionKind::Int2(_) => 2,
            OptionKind::Float3(_) | OptionKind::Int3(_) | OptionKind::Rgb(_) => 3,
            OptionKind::Float4(_) | OptionKind::Int4(_) | OptionKind::Rgba(_) => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumData {
    pub ui_choices: Vec<String>,
    pub values: Vec<i32>,
    #[serde(default)]
    pub default_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatData {
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Float2Data {
    pub default: [f32; 2],
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub step: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Float3Data {
    pub default: [f32; 3],
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub step: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<[u32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Float4Data {
    pub default: [f32; 4],
    pub min: [f32; 4],
    pub max: [f32; 4],
    pub step: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<[u32; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntData {
    pub default: i32,
    pub min: i32,
    pub max: i32,
    pub step: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Int2Data {
    pub default: [i32; 2],
    pub min: [i32; 2],
    pub max: [i32; 2],
    pub step: [i32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Int3Data {
    pub default: [i32; 3],
    pub min: [i32; 3],
    pub max: [i32; 3],
    pub step: [i32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Int4Data {
    pub default: [i32; 4],
    pub min: [i32; 4],
    pub max: [i32; 4],
    pub step: [i32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbData {
    pub default: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbaData {
    pub default: [f32; 4],
}

/// A live option value. The closed set mirrors what the uniform buffer can
/// hold: 32-bit bools, int vectors, float vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    Bool(bool),
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl Default for OptionValue {
    fn default() -> Self {
        OptionValue::Bool(false)
    }
}

impl OptionValue {
    pub fn components(&self) -> u32 {
        match self {
            OptionValue::Bool(_) => 1,
            OptionValue::Int(v) => v.len() as u32,
            OptionValue::Float(v) => v.len() as u32,
        }
    }

    /// Append the value as little-endian 32-bit words.
    pub fn write_words(&self, out: &mut Vec<u8>) {
        match self {
            OptionValue::Bool(b) => out.extend_from_slice(&u32::from(*b).to_le_bytes()),
            OptionValue::Int(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            OptionValue::Float(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
        }
    }
}
