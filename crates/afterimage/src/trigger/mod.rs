//! Trigger model: matchable conditions that route render-engine events to
//! shader groups.

pub mod manager;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use manager::TriggerManager;

/// Comparison applied to a numeric trigger field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum NumericOperation {
    Exact = 0,
    #[default]
    Any = 1,
    Greater = 2,
    GreaterEqual = 3,
    Less = 4,
    LessEqual = 5,
}

impl NumericOperation {
    pub fn matches(self, candidate: u32, reference: u32) -> bool {
        match self {
            NumericOperation::Exact => candidate == reference,
            NumericOperation::Any => true,
            NumericOperation::Greater => candidate > reference,
            NumericOperation::GreaterEqual => candidate >= reference,
            NumericOperation::Less => candidate < reference,
            NumericOperation::LessEqual => candidate <= reference,
        }
    }
}

impl TryFrom<u32> for NumericOperation {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NumericOperation::Exact),
            1 => Ok(NumericOperation::Any),
            2 => Ok(NumericOperation::Greater),
            3 => Ok(NumericOperation::GreaterEqual),
            4 => Ok(NumericOperation::Less),
            5 => Ok(NumericOperation::LessEqual),
            other => Err(format!("invalid numeric operation {other}")),
        }
    }
}

impl From<NumericOperation> for u32 {
    fn from(op: NumericOperation) -> u32 {
        op as u32
    }
}

/// Comparison applied to a generic (equality-only) trigger field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum GenericOperation {
    Exact = 0,
    #[default]
    Any = 1,
}

impl GenericOperation {
    pub fn matches<T: PartialEq + ?Sized>(self, candidate: &T, reference: &T) -> bool {
        match self {
            GenericOperation::Exact => candidate == reference,
            GenericOperation::Any => true,
        }
    }
}

impl TryFrom<u32> for GenericOperation {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GenericOperation::Exact),
            1 => Ok(GenericOperation::Any),
            other => Err(format!("invalid generic operation {other}")),
        }
    }
}

impl From<GenericOperation> for u32 {
    fn from(op: GenericOperation) -> u32 {
        op as u32
    }
}

/// Condition on an EFB copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfbTrigger {
    #[serde(rename = "WidthOperation", default)]
    pub width_operation: NumericOperation,
    #[serde(rename = "Width", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "HeightOperation", default)]
    pub height_operation: NumericOperation,
    #[serde(rename = "Height", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "FormatOperation", default)]
    pub format_operation: GenericOperation,
    #[serde(rename = "Format", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,
}

impl EfbTrigger {
    pub fn matches(&self, event: &EfbEvent) -> bool {
        self.width_operation
            .matches(event.width, self.width.unwrap_or(0))
            && self
                .height_operation
                .matches(event.height, self.height.unwrap_or(0))
            && self
                .format_operation
                .matches(&event.format, &self.format.unwrap_or(0))
    }
}

/// Condition on a 2D or 3D draw call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawCallTrigger {
    #[serde(rename = "WidthOperation", default)]
    pub width_operation: NumericOperation,
    #[serde(rename = "Width", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "HeightOperation", default)]
    pub height_operation: NumericOperation,
    #[serde(rename = "Height", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "FormatOperation", default)]
    pub format_operation: GenericOperation,
    #[serde(rename = "Format", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,
    #[serde(rename = "TlutOperation", default)]
    pub tlut_operation: GenericOperation,
    #[serde(rename = "Tlut", default, skip_serializing_if = "Option::is_none")]
    pub tlut: Option<String>,
    #[serde(rename = "HashOperation", default)]
    pub hash_operation: GenericOperation,
    #[serde(rename = "Hash", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl DrawCallTrigger {
    pub fn matches(&self, event: &DrawEvent<'_>) -> bool {
        self.width_operation
            .matches(event.width, self.width.unwrap_or(0))
            && self
                .height_operation
                .matches(event.height, self.height.unwrap_or(0))
            && self
                .format_operation
                .matches(&event.format, &self.format.unwrap_or(0))
            && self
                .tlut_operation
                .matches(event.tlut, self.tlut.as_deref().unwrap_or(""))
            && self
                .hash_operation
                .matches(event.hash, self.hash.as_deref().unwrap_or(""))
    }
}

/// Condition on a texture load: exact id match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureLoadTrigger {
    #[serde(rename = "TextureId")]
    pub texture_id: String,
}

impl TextureLoadTrigger {
    pub fn matches(&self, event: &TextureLoadEvent<'_>) -> bool {
        self.texture_id == event.texture_id
    }
}

/// A matchable trigger condition, tagged by the profile document's `Type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Trigger {
    #[serde(rename = "EFB")]
    Efb(EfbTrigger),
    TextureLoad(TextureLoadTrigger),
    DrawCall2D(DrawCallTrigger),
    DrawCall3D(DrawCallTrigger),
    /// End of frame. No comparable fields; always the fallback.
    Post,
}

impl Trigger {
    /// Non-`Any` operations must have a value to compare against.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let err = |field: &str| {
            Err(ConfigError::InvalidTrigger {
                name: name.to_string(),
                reason: format!("{field} operation is not Any but no {field} value is given"),
            })
        };
        let check_size = |t: &EfbTrigger| -> Result<(), ConfigError> {
            if t.width_operation != NumericOperation::Any && t.width.is_none() {
                return err("width");
            }
            if t.height_operation != NumericOperation::Any && t.height.is_none() {
                return err("height");
            }
            if t.format_operation != GenericOperation::Any && t.format.is_none() {
                return err("format");
            }
            Ok(())
        };
        match self {
            Trigger::Efb(t) => check_size(t),
            Trigger::DrawCall2D(t) | Trigger::DrawCall3D(t) => {
                check_size(&EfbTrigger {
                    width_operation: t.width_operation,
                    width: t.width,
                    height_operation: t.height_operation,
                    height: t.height,
                    format_operation: t.format_operation,
                    format: t.format,
                })?;
                if t.tlut_operation != GenericOperation::Any && t.tlut.is_none() {
                    return err("tlut");
                }
                if t.hash_operation != GenericOperation::Any && t.hash.is_none() {
                    return err("hash");
                }
                Ok(())
            }
            Trigger::TextureLoad(_) | Trigger::Post => Ok(()),
        }
    }
}

/// An EFB copy observed by the render engine.
#[derive(Debug, Clone, Copy)]
pub struct EfbEvent {
    pub width: u32,
    pub height: u32,
    pub format: u32,
}

/// A texture upload observed by the render engine.
#[derive(Debug, Clone, Copy)]
pub struct TextureLoadEvent<'a> {
    pub texture_id: &'a str,
}

/// A draw call observed by the render engine.
#[derive(Debug, Clone, Copy)]
pub struct DrawEvent<'a> {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub tlut: &'a str,
    pub hash: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_truth_table() {
        let trigger = EfbTrigger {
            width_operation: NumericOperation::Greater,
            width: Some(100),
            ..Default::default()
        };
        let event = |width| EfbEvent {
            width,
            height: 0,
            format: 0,
        };
        assert!(trigger.matches(&event(150)));
        assert!(!trigger.matches(&event(100)));
        assert!(!trigger.matches(&event(50)));
    }

    #[test]
    fn any_matches_everything() {
        let trigger = EfbTrigger::default();
        for width in [0, 1, 100, u32::MAX] {
            assert!(trigger.matches(&EfbEvent {
                width,
                height: width,
                format: width,
            }));
        }
    }

    #[test]
    fn numeric_operations() {
        assert!(NumericOperation::Exact.matches(5, 5));
        assert!(!NumericOperation::Exact.matches(5, 6));
        assert!(NumericOperation::GreaterEqual.matches(5, 5));
        assert!(NumericOperation::Less.matches(4, 5));
        assert!(!NumericOperation::Less.matches(5, 5));
        assert!(NumericOperation::LessEqual.matches(5, 5));
        assert!(!NumericOperation::LessEqual.matches(6, 5));
    }

    #[test]
    fn all_fields_must_hold() {
        let trigger = EfbTrigger {
            width_operation: NumericOperation::Exact,
            width: Some(640),
            height_operation: NumericOperation::Exact,
            height: Some(480),
            format_operation: GenericOperation::Exact,
            format: Some(6),
        };
        assert!(trigger.matches(&EfbEvent {
            width: 640,
            height: 480,
            format: 6,
        }));
        assert!(!trigger.matches(&EfbEvent {
            width: 640,
            height: 480,
            format: 7,
        }));
    }

    #[test]
    fn draw_trigger_matches_hash_and_tlut() {
        let trigger = DrawCallTrigger {
            hash_operation: GenericOperation::Exact,
            hash: Some("deadbeef".into()),
            ..Default::default()
        };
        let event = |hash| DrawEvent {
            width: 0,
            height: 0,
            format: 0,
            tlut: "",
            hash,
        };
        assert!(trigger.matches(&event("deadbeef")));
        assert!(!trigger.matches(&event("cafef00d")));
    }

    #[test]
    fn profile_document_round_trip() {
        let json = r#"{"Type":"EFB","WidthOperation":2,"Width":100,
            "HeightOperation":1,"FormatOperation":0,"Format":6}"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        trigger.validate("test").unwrap();
        match &trigger {
            Trigger::Efb(t) => {
                assert_eq!(t.width_operation, NumericOperation::Greater);
                assert_eq!(t.width, Some(100));
                assert_eq!(t.height_operation, NumericOperation::Any);
                assert_eq!(t.format, Some(6));
            }
            other => panic!("expected Efb, got {other:?}"),
        }
        let back: Trigger =
            serde_json::from_str(&serde_json::to_string(&trigger).unwrap()).unwrap();
        assert_eq!(back, trigger);
    }

    #[test]
    fn post_profile_is_bare() {
        let trigger: Trigger = serde_json::from_str(r#"{"Type":"Post"}"#).unwrap();
        assert_eq!(trigger, Trigger::Post);
    }

    #[test]
    fn invalid_operation_integer_fails() {
        let json = r#"{"Type":"EFB","WidthOperation":9}"#;
        assert!(serde_json::from_str::<Trigger>(json).is_err());
    }

    #[test]
    fn non_any_operation_without_value_is_invalid() {
        let json = r#"{"Type":"DrawCall2D","HashOperation":0}"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        assert!(trigger.validate("test").is_err());
    }

    #[test]
    fn texture_load_matches_id() {
        let trigger = TextureLoadTrigger {
            texture_id: "tex_12ab".into(),
        };
        assert!(trigger.matches(&TextureLoadEvent {
            texture_id: "tex_12ab"
        }));
        assert!(!trigger.matches(&TextureLoadEvent { texture_id: "other" }));
    }
}
