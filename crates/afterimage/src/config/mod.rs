//! Configuration layer: everything the editor mutates and the runtime
//! observes through change counters.

pub mod group;
pub mod input;
pub mod option;
pub mod pass;
pub mod shader;
pub mod trigger;

use std::path::{Path, PathBuf};

pub use group::ShaderGroupConfig;
pub use input::{InputDef, SamplerDef, TextureFilter, TextureMode};
pub use option::{OptionDef, OptionKind, OptionValue, SNAPSHOT_SLOTS};
pub use pass::PassDef;
pub use shader::{PASSTHROUGH_SOURCE, RuntimeInfo, ShaderConfig, ShaderDocument};
pub use trigger::{DEFAULT_TRIGGER_POINT, TriggerConfig};

/// User and system search roots. Each contains a shader directory and a
/// trigger-profile directory; user entries shadow system entries with the
/// same basename.
#[derive(Debug, Clone)]
pub struct SearchRoots {
    pub user: PathBuf,
    pub system: PathBuf,
}

impl SearchRoots {
    pub fn new(user: impl Into<PathBuf>, system: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            system: system.into(),
        }
    }

    pub fn user_shader_dir(&self) -> PathBuf {
        self.user.join("shaders")
    }

    pub fn system_shader_dir(&self) -> PathBuf {
        self.system.join("shaders")
    }

    pub fn user_trigger_dir(&self) -> PathBuf {
        self.user.join("profiles").join("triggers")
    }

    pub fn system_trigger_dir(&self) -> PathBuf {
        self.system.join("profiles").join("triggers")
    }
}

/// Load every `.wgsl` effect in a directory, sorted by filename. Unreadable
/// or malformed entries are logged and skipped; the scan keeps going.
pub fn scan_shader_directory(dir: &Path) -> Vec<ShaderConfig> {
    let mut configs = Vec::new();
    if !dir.is_dir() {
        log::warn!("shader directory not found: {}", dir.display());
        return configs;
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "wgsl"))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        match ShaderConfig::load(&entry.path()) {
            Ok(config) => {
                log::info!("found shader: {} ({})", config.name, entry.path().display());
                configs.push(config);
            }
            Err(e) => {
                log::warn!("failed to load {}: {e}", entry.path().display());
            }
        }
    }

    log::info!("found {} shaders in {}", configs.len(), dir.display());
    configs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_skips_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wgsl"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("b.wgsl"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("b.json"), "{broken").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let configs = scan_shader_directory(dir.path());
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "a");
    }

    #[test]
    fn scan_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let configs = scan_shader_directory(&dir.path().join("nope"));
        assert!(configs.is_empty());
    }

    #[test]
    fn search_roots_layout() {
        let roots = SearchRoots::new("/u", "/s");
        assert_eq!(roots.user_shader_dir(), PathBuf::from("/u/shaders"));
        assert_eq!(
            roots.system_trigger_dir(),
            PathBuf::from("/s/profiles/triggers")
        );
    }
}
