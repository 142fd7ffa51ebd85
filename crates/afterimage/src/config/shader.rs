use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::input::InputDef;
use super::option::{OptionDef, OptionValue, SNAPSHOT_SLOTS};
use super::pass::PassDef;
use crate::error::ConfigError;

/// Source of the built-in pass-through shader backing the default trigger
/// point when no user effect is configured.
pub const PASSTHROUGH_SOURCE: &str = "fn main() {\n    SetOutput(SamplePrev());\n}\n";

/// State shared between a config (which may live on an editor thread) and
/// the runtime shader compiled from it on the render thread. Only the error
/// flag crosses threads, so it is atomic; everything else in the config is
/// mutated between frames only.
#[derive(Debug, Default)]
pub struct RuntimeInfo {
    error: AtomicBool,
}

impl RuntimeInfo {
    pub fn set_error(&self, value: bool) {
        self.error.store(value, Ordering::Release);
    }

    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaDef {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
}

/// The serialized form of an effect's sidecar config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaderDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaDef>,
    #[serde(default)]
    pub options: Vec<OptionDef>,
    #[serde(default)]
    pub passes: Vec<PassDef>,
}

/// One effect definition: metadata, options, passes, shader source, and the
/// two change counters that drive runtime dirty detection.
#[derive(Debug, Clone)]
pub struct ShaderConfig {
    pub name: String,
    pub author: String,
    pub description: String,
    /// Path the source was loaded from; empty for built-in shaders.
    pub shader_path: PathBuf,
    pub shader_source: String,
    pub enabled: bool,
    pub options: Vec<OptionDef>,
    pub passes: Vec<PassDef>,
    runtime_info: Arc<RuntimeInfo>,
    /// Bumped on value-only edits (slider moves, toggles). The runtime
    /// responds by re-uploading uniforms.
    changes: u32,
    /// Bumped on edits that invalidate generated shader source: reload,
    /// constant-flag toggles, edits to constant or pass-gating options.
    compiletime_changes: u32,
}

impl ShaderConfig {
    /// Load an effect from its source file plus the optional sidecar
    /// `<stem>.json` next to it. A missing sidecar synthesizes a default
    /// single-pass config; a malformed one fails the whole load.
    pub fn load(source_path: &Path) -> Result<Self, ConfigError> {
        let shader_source =
            std::fs::read_to_string(source_path).map_err(|source| ConfigError::Io {
                path: source_path.to_path_buf(),
                source,
            })?;
        let name = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let sidecar = source_path.with_extension("json");
        let document = if sidecar.is_file() {
            let text = std::fs::read_to_string(&sidecar).map_err(|source| ConfigError::Io {
                path: sidecar.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: sidecar.clone(),
                source,
            })?
        } else {
            log::debug!("no sidecar config for {}, using defaults", source_path.display());
            ShaderDocument::default()
        };

        let mut config = Self::from_document(name, shader_source, document)?;
        config.shader_path = source_path.to_path_buf();
        Ok(config)
    }

    /// Build a config from an already-parsed document. Normalizes options,
    /// validates cross-references, and substitutes the default pass when the
    /// document declares none.
    pub fn from_document(
        name: String,
        shader_source: String,
        document: ShaderDocument,
    ) -> Result<Self, ConfigError> {
        let meta = document.meta.unwrap_or(MetaDef {
            author: "Unknown".into(),
            description: "No description provided".into(),
        });

        let mut options = document.options;
        for option in &mut options {
            option.normalize();
            option.validate()?;
        }

        let passes = if document.passes.is_empty() {
            vec![PassDef::default_pass()]
        } else {
            document.passes
        };
        for (pass_index, pass) in passes.iter().enumerate() {
            for input in &pass.inputs {
                if let InputDef::ExplicitPass { index, .. } = input {
                    if *index as usize >= passes.len() {
                        return Err(ConfigError::PassIndexOutOfRange {
                            pass: pass_index,
                            index: *index,
                            total: passes.len(),
                        });
                    }
                    // A pass sampling its own output would bind the texture
                    // it is rendering into; rejected up front.
                    if *index as usize == pass_index {
                        return Err(ConfigError::PassSelfReference { pass: pass_index });
                    }
                }
            }
        }

        Ok(Self {
            name,
            author: meta.author,
            description: meta.description,
            shader_path: PathBuf::new(),
            shader_source,
            enabled: true,
            options,
            passes,
            runtime_info: Arc::new(RuntimeInfo::default()),
            changes: 0,
            compiletime_changes: 0,
        })
    }

    /// The built-in pass-through effect.
    pub fn passthrough() -> Self {
        Self::from_document(
            "passthrough".into(),
            PASSTHROUGH_SOURCE.into(),
            ShaderDocument::default(),
        )
        .expect("built-in passthrough config is valid")
    }

    pub fn to_document(&self) -> ShaderDocument {
        ShaderDocument {
            meta: Some(MetaDef {
                author: self.author.clone(),
                description: self.description.clone(),
            }),
            options: self.options.clone(),
            passes: self.passes.clone(),
        }
    }

    pub fn runtime_info(&self) -> Arc<RuntimeInfo> {
        Arc::clone(&self.runtime_info)
    }

    pub fn changes(&self) -> u32 {
        self.changes
    }

    pub fn compiletime_changes(&self) -> u32 {
        self.compiletime_changes
    }

    pub fn requires_depth_buffer(&self) -> bool {
        self.passes
            .iter()
            .any(|p| p.inputs.iter().any(InputDef::is_depth_buffer))
    }

    fn option(&self, name: &str) -> Option<&OptionDef> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Whether editing the named option's value invalidates compiled shader
    /// source: constants are baked into it, and pass-gating options decide
    /// which passes exist.
    fn edit_needs_recompile(&self, name: &str) -> bool {
        self.option(name).is_some_and(|o| o.is_constant)
            || self.passes.iter().any(|p| p.dependent_option == name)
    }

    /// Set an option's live value. Returns false if the option is unknown.
    pub fn set_option_value(&mut self, name: &str, value: OptionValue) -> bool {
        let needs_recompile = self.edit_needs_recompile(name);
        let Some(option) = self.options.iter_mut().find(|o| o.name == name) else {
            return false;
        };
        if option.value == value {
            return true;
        }
        option.value = value;
        self.changes = self.changes.wrapping_add(1);
        if needs_recompile {
            self.compiletime_changes = self.compiletime_changes.wrapping_add(1);
        }
        true
    }

    /// Select an enum option by choice index.
    pub fn set_option_index(&mut self, name: &str, index: usize) -> bool {
        let Some(option) = self.option(name) else {
            return false;
        };
        let super::option::OptionKind::Enum(data) = &option.kind else {
            return false;
        };
        let Some(value) = data.values.get(index).copied() else {
            return false;
        };
        self.set_option_value(name, OptionValue::Int(vec![value]))
    }

    /// Toggle whether an option is evaluated at compile time.
    pub fn set_option_constant(&mut self, name: &str, constant: bool) -> bool {
        let Some(option) = self.options.iter_mut().find(|o| o.name == name) else {
            return false;
        };
        if option.is_constant == constant {
            return true;
        }
        option.is_constant = constant;
        self.changes = self.changes.wrapping_add(1);
        self.compiletime_changes = self.compiletime_changes.wrapping_add(1);
        true
    }

    /// Restore every option to its default.
    pub fn reset(&mut self) {
        for option in &mut self.options {
            option.reset();
        }
        self.changes = self.changes.wrapping_add(1);
        self.compiletime_changes = self.compiletime_changes.wrapping_add(1);
    }

    /// Re-read source and sidecar from disk, keeping the enabled flag and
    /// counters. Always a compile-time change.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let reloaded = Self::load(&self.shader_path)?;
        let enabled = self.enabled;
        self.name = reloaded.name;
        self.author = reloaded.author;
        self.description = reloaded.description;
        self.shader_source = reloaded.shader_source;
        self.options = reloaded.options;
        self.passes = reloaded.passes;
        self.enabled = enabled;
        self.changes = self.changes.wrapping_add(1);
        self.compiletime_changes = self.compiletime_changes.wrapping_add(1);
        Ok(())
    }

    pub fn save_snapshot(&mut self, slot: usize) {
        for option in &mut self.options {
            option.save_snapshot(slot);
        }
    }

    pub fn has_snapshot(&self, slot: usize) -> bool {
        slot < SNAPSHOT_SLOTS && self.options.iter().any(|o| o.has_snapshot(slot))
    }

    /// Restore every option from the given slot. No-op for options without
    /// a saved value there.
    pub fn load_snapshot(&mut self, slot: usize) {
        let mut changed = false;
        let mut needs_recompile = false;
        let gating: Vec<String> = self
            .passes
            .iter()
            .filter(|p| !p.dependent_option.is_empty())
            .map(|p| p.dependent_option.clone())
            .collect();
        for option in &mut self.options {
            if option.load_snapshot(slot) {
                changed = true;
                if option.is_constant || gating.contains(&option.name) {
                    needs_recompile = true;
                }
            }
        }
        if changed {
            self.changes = self.changes.wrapping_add(1);
        }
        if needs_recompile {
            self.compiletime_changes = self.compiletime_changes.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SOURCE: &str = "fn main() { SetOutput(SamplePrev()); }";

    fn parse_config(doc_json: &str) -> Result<ShaderConfig, ConfigError> {
        let document: ShaderDocument = serde_json::from_str(doc_json).unwrap();
        ShaderConfig::from_document("test".into(), SOURCE.into(), document)
    }

    const FULL_DOC: &str = r#"{
        "meta": {"author": "someone", "description": "a glow effect"},
        "options": [
            {"type":"bool","name":"enable_glow","default":true},
            {"type":"float","name":"strength","default":0.5,"min":0.0,"max":2.0,"step":0.05},
            {"type":"rgb","name":"tint","default":[1.0,1.0,1.0],"is_constant":true}
        ],
        "passes": [
            {"entry_point":"blur","inputs":[
                {"type":"color_buffer","texture_mode":"clamp","texture_filter":"linear"}],
             "output_scale":0.5},
            {"entry_point":"combine","inputs":[
                {"type":"previous_pass","texture_mode":"clamp","texture_filter":"linear"},
                {"type":"explicit_pass","index":0,"texture_mode":"clamp","texture_filter":"point"}]}
        ]
    }"#;

    #[test]
    fn full_document_parses() {
        let config = parse_config(FULL_DOC).unwrap();
        assert_eq!(config.author, "someone");
        assert_eq!(config.options.len(), 3);
        assert_eq!(config.passes.len(), 2);
        assert!(config.enabled);
        assert!(!config.requires_depth_buffer());
    }

    #[test]
    fn missing_meta_gets_placeholders() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.author, "Unknown");
        assert_eq!(config.description, "No description provided");
        // No passes declared: a default pass is synthesized.
        assert_eq!(config.passes.len(), 1);
        assert_eq!(config.passes[0].entry_point, "main");
    }

    #[test]
    fn explicit_pass_index_out_of_range_fails() {
        let doc = r#"{"passes":[{"entry_point":"main","inputs":[
            {"type":"explicit_pass","index":3,"texture_mode":"clamp","texture_filter":"linear"}]}]}"#;
        match parse_config(doc) {
            Err(ConfigError::PassIndexOutOfRange { index: 3, total: 1, .. }) => {}
            other => panic!("expected PassIndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn explicit_pass_self_reference_fails() {
        let doc = r#"{"passes":[
            {"entry_point":"a","inputs":[
                {"type":"previous_pass","texture_mode":"clamp","texture_filter":"linear"}]},
            {"entry_point":"b","inputs":[
                {"type":"explicit_pass","index":1,"texture_mode":"clamp","texture_filter":"linear"}]}
        ]}"#;
        match parse_config(doc) {
            Err(ConfigError::PassSelfReference { pass: 1 }) => {}
            other => panic!("expected PassSelfReference, got {other:?}"),
        }
    }

    #[test]
    fn depth_input_sets_requires_depth() {
        let doc = r#"{"passes":[{"entry_point":"main","inputs":[
            {"type":"depth_buffer","texture_mode":"clamp","texture_filter":"point"}]}]}"#;
        let config = parse_config(doc).unwrap();
        assert!(config.requires_depth_buffer());
    }

    #[test]
    fn document_round_trip_preserves_options_and_passes() {
        let config = parse_config(FULL_DOC).unwrap();
        let json = serde_json::to_string(&config.to_document()).unwrap();
        let back: ShaderDocument = serde_json::from_str(&json).unwrap();
        let reparsed = ShaderConfig::from_document("test".into(), SOURCE.into(), back).unwrap();
        assert_eq!(reparsed.options, config.options);
        assert_eq!(reparsed.passes, config.passes);
    }

    #[test]
    fn value_edit_bumps_only_change_counter() {
        let mut config = parse_config(FULL_DOC).unwrap();
        let before = (config.changes(), config.compiletime_changes());
        assert!(config.set_option_value("strength", OptionValue::Float(vec![1.5])));
        assert_eq!(config.changes(), before.0 + 1);
        assert_eq!(config.compiletime_changes(), before.1);
    }

    #[test]
    fn constant_edit_bumps_both_counters() {
        let mut config = parse_config(FULL_DOC).unwrap();
        let before = (config.changes(), config.compiletime_changes());
        assert!(config.set_option_value("tint", OptionValue::Float(vec![1.0, 0.0, 0.0])));
        assert_eq!(config.changes(), before.0 + 1);
        assert_eq!(config.compiletime_changes(), before.1 + 1);
    }

    #[test]
    fn pass_gating_edit_bumps_both_counters() {
        let doc = r#"{
            "options":[{"type":"bool","name":"use_blur","default":true}],
            "passes":[{"entry_point":"blur","dependent_option":"use_blur","inputs":[
                {"type":"previous_pass","texture_mode":"clamp","texture_filter":"linear"}]}]
        }"#;
        let mut config = parse_config(doc).unwrap();
        assert!(config.set_option_value("use_blur", OptionValue::Bool(false)));
        assert_eq!(config.changes(), 1);
        assert_eq!(config.compiletime_changes(), 1);
    }

    #[test]
    fn identical_value_edit_is_counter_neutral() {
        let mut config = parse_config(FULL_DOC).unwrap();
        assert!(config.set_option_value("strength", OptionValue::Float(vec![0.5])));
        assert_eq!(config.changes(), 0);
    }

    #[test]
    fn constant_flag_toggle_bumps_both() {
        let mut config = parse_config(FULL_DOC).unwrap();
        assert!(config.set_option_constant("strength", true));
        assert_eq!(config.changes(), 1);
        assert_eq!(config.compiletime_changes(), 1);
    }

    #[test]
    fn enum_index_selection() {
        let doc = r#"{"options":[{"type":"enum","name":"mode",
            "ui_choices":["Off","On"],"values":[0,7]}]}"#;
        let mut config = parse_config(doc).unwrap();
        assert!(config.set_option_index("mode", 1));
        assert_eq!(
            config.option("mode").unwrap().value,
            OptionValue::Int(vec![7])
        );
    }

    #[test]
    fn snapshot_cycle_bumps_changes() {
        let mut config = parse_config(FULL_DOC).unwrap();
        config.save_snapshot(0);
        assert!(config.has_snapshot(0));
        config.set_option_value("strength", OptionValue::Float(vec![2.0]));
        let before = config.changes();
        config.load_snapshot(0);
        assert_eq!(config.changes(), before + 1);
        assert_eq!(
            config.option("strength").unwrap().value,
            OptionValue::Float(vec![0.5])
        );
    }

    #[test]
    fn load_with_sidecar_and_without() {
        let dir = tempfile::tempdir().unwrap();
        let shader = dir.path().join("glow.wgsl");
        std::fs::write(&shader, SOURCE).unwrap();

        // No sidecar: synthesized config.
        let config = ShaderConfig::load(&shader).unwrap();
        assert_eq!(config.name, "glow");
        assert_eq!(config.author, "Unknown");
        assert_eq!(config.passes.len(), 1);

        // With sidecar.
        let mut sidecar = std::fs::File::create(dir.path().join("glow.json")).unwrap();
        sidecar.write_all(FULL_DOC.as_bytes()).unwrap();
        drop(sidecar);
        let config = ShaderConfig::load(&shader).unwrap();
        assert_eq!(config.author, "someone");
        assert_eq!(config.passes.len(), 2);
    }

    #[test]
    fn malformed_sidecar_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let shader = dir.path().join("bad.wgsl");
        std::fs::write(&shader, SOURCE).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert!(matches!(
            ShaderConfig::load(&shader),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn reload_bumps_compiletime() {
        let dir = tempfile::tempdir().unwrap();
        let shader = dir.path().join("fx.wgsl");
        std::fs::write(&shader, SOURCE).unwrap();
        let mut config = ShaderConfig::load(&shader).unwrap();
        config.enabled = false;
        config.reload().unwrap();
        assert!(!config.enabled);
        assert_eq!(config.compiletime_changes(), 1);
    }

    #[test]
    fn runtime_info_error_flag() {
        let config = ShaderConfig::passthrough();
        let info = config.runtime_info();
        assert!(!info.has_error());
        info.set_error(true);
        assert!(config.runtime_info().has_error());
        info.set_error(false);
        assert!(!info.has_error());
    }
}
