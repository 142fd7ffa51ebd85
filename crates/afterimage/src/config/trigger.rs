use std::collections::BTreeMap;

use super::group::ShaderGroupConfig;

/// Name of the end-of-frame trigger point that always exists.
pub const DEFAULT_TRIGGER_POINT: &str = "post";

/// Top-level configuration: one shader group per named trigger point.
///
/// The counter covers structural changes only (trigger points added or
/// removed); intra-group edits are tracked by the groups themselves.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub groups: BTreeMap<String, ShaderGroupConfig>,
    /// Trigger point currently selected in the editor.
    pub chosen_trigger_point: String,
    changes: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(DEFAULT_TRIGGER_POINT.to_string(), ShaderGroupConfig::new());
        Self {
            groups,
            chosen_trigger_point: DEFAULT_TRIGGER_POINT.to_string(),
            changes: 0,
        }
    }
}

impl TriggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> u64 {
        self.changes
    }

    pub fn add_trigger_point(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.groups.contains_key(&name) {
            return;
        }
        self.groups.insert(name, ShaderGroupConfig::new());
        self.changes = self.changes.wrapping_add(1);
    }

    /// The default point cannot be removed.
    pub fn remove_trigger_point(&mut self, name: &str) {
        if name == DEFAULT_TRIGGER_POINT {
            return;
        }
        if self.groups.remove(name).is_some() {
            if self.chosen_trigger_point == name {
                self.chosen_trigger_point = DEFAULT_TRIGGER_POINT.to_string();
            }
            self.changes = self.changes.wrapping_add(1);
        }
    }

    pub fn chosen_group(&self) -> Option<&ShaderGroupConfig> {
        self.groups.get(&self.chosen_trigger_point)
    }

    pub fn chosen_group_mut(&mut self) -> Option<&mut ShaderGroupConfig> {
        self.groups.get_mut(&self.chosen_trigger_point)
    }
}
