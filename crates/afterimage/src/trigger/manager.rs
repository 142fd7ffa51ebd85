use std::collections::HashMap;
use std::path::Path;

use super::Trigger;
use crate::config::SearchRoots;
use crate::error::ConfigError;

/// Resolves trigger-point names to trigger definitions.
///
/// Profiles are JSON documents named `<trigger name>.json` in the user and
/// system trigger-profile directories; user profiles shadow system ones.
#[derive(Debug, Default)]
pub struct TriggerManager {
    user: HashMap<String, Trigger>,
    system: HashMap<String, Trigger>,
}

impl TriggerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan both roots, replacing any previously loaded profiles.
    pub fn load(&mut self, roots: &SearchRoots) {
        self.system = load_profile_dir(&roots.system_trigger_dir());
        self.user = load_profile_dir(&roots.user_trigger_dir());
        log::info!(
            "loaded {} system and {} user trigger profiles",
            self.system.len(),
            self.user.len()
        );
    }

    /// Look up a trigger by name, user profiles first.
    pub fn get(&self, name: &str) -> Option<&Trigger> {
        self.user.get(name).or_else(|| self.system.get(name))
    }

    /// All known trigger names, user shadowing applied.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .system
            .keys()
            .chain(self.user.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Write a profile into the user trigger directory.
    pub fn save_profile(
        &mut self,
        roots: &SearchRoots,
        name: &str,
        trigger: Trigger,
    ) -> Result<(), ConfigError> {
        trigger.validate(name)?;
        let dir = roots.user_trigger_dir();
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(format!("{name}.json"));
        let text = serde_json::to_string_pretty(&trigger).map_err(|source| {
            ConfigError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, text).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        self.user.insert(name.to_string(), trigger);
        Ok(())
    }
}

fn load_profile_dir(dir: &Path) -> HashMap<String, Trigger> {
    let mut profiles = HashMap::new();
    if !dir.is_dir() {
        log::debug!("trigger profile directory not found: {}", dir.display());
        return profiles;
    }
    for entry in std::fs::read_dir(dir).into_iter().flatten().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("failed to read {}: {e}", path.display());
                continue;
            }
        };
        let trigger: Trigger = match serde_json::from_str(&text) {
            Ok(trigger) => trigger,
            Err(e) => {
                log::warn!("failed to parse {}: {e}", path.display());
                continue;
            }
        };
        if let Err(e) = trigger.validate(&name) {
            log::warn!("invalid trigger profile {}: {e}", path.display());
            continue;
        }
        profiles.insert(name, trigger);
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{EfbTrigger, NumericOperation};

    fn write_profile(dir: &Path, name: &str, json: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{name}.json")), json).unwrap();
    }

    fn roots() -> (tempfile::TempDir, SearchRoots) {
        let tmp = tempfile::tempdir().unwrap();
        let roots = SearchRoots::new(tmp.path().join("user"), tmp.path().join("sys"));
        (tmp, roots)
    }

    #[test]
    fn user_profile_shadows_system() {
        let (_tmp, roots) = roots();
        write_profile(
            &roots.system_trigger_dir(),
            "big_copy",
            r#"{"Type":"EFB","WidthOperation":2,"Width":100}"#,
        );
        write_profile(
            &roots.user_trigger_dir(),
            "big_copy",
            r#"{"Type":"EFB","WidthOperation":2,"Width":400}"#,
        );

        let mut manager = TriggerManager::new();
        manager.load(&roots);
        match manager.get("big_copy") {
            Some(Trigger::Efb(t)) => assert_eq!(t.width, Some(400)),
            other => panic!("expected user Efb trigger, got {other:?}"),
        }
    }

    #[test]
    fn malformed_and_invalid_profiles_are_skipped() {
        let (_tmp, roots) = roots();
        write_profile(&roots.system_trigger_dir(), "broken", "{nope");
        // Exact without a value fails validation.
        write_profile(
            &roots.system_trigger_dir(),
            "incomplete",
            r#"{"Type":"EFB","WidthOperation":0}"#,
        );
        write_profile(&roots.system_trigger_dir(), "post", r#"{"Type":"Post"}"#);

        let mut manager = TriggerManager::new();
        manager.load(&roots);
        assert!(manager.get("broken").is_none());
        assert!(manager.get("incomplete").is_none());
        assert_eq!(manager.get("post"), Some(&Trigger::Post));
        assert_eq!(manager.names(), vec!["post"]);
    }

    #[test]
    fn save_profile_round_trips() {
        let (_tmp, roots) = roots();
        let mut manager = TriggerManager::new();
        let trigger = Trigger::Efb(EfbTrigger {
            width_operation: NumericOperation::GreaterEqual,
            width: Some(256),
            ..Default::default()
        });
        manager.save_profile(&roots, "quarter", trigger.clone()).unwrap();
        assert_eq!(manager.get("quarter"), Some(&trigger));

        let mut fresh = TriggerManager::new();
        fresh.load(&roots);
        assert_eq!(fresh.get("quarter"), Some(&trigger));
    }

    #[test]
    fn saving_invalid_profile_fails() {
        let (_tmp, roots) = roots();
        let mut manager = TriggerManager::new();
        let trigger = Trigger::Efb(EfbTrigger {
            width_operation: NumericOperation::Exact,
            width: None,
            ..Default::default()
        });
        assert!(manager.save_profile(&roots, "bad", trigger).is_err());
        assert!(manager.get("bad").is_none());
    }
}
