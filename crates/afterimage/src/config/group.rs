use super::shader::ShaderConfig;

/// An ordered, user-editable playlist of effects.
///
/// `shaders` is storage order (stable across reorders); `shader_order` is
/// the execution/display permutation over it. Every mutation updates both
/// and bumps the change counter, which runtime groups watch.
#[derive(Debug, Clone, Default)]
pub struct ShaderGroupConfig {
    pub shaders: Vec<ShaderConfig>,
    pub shader_order: Vec<usize>,
    changes: u32,
}

impl ShaderGroupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default group: one built-in pass-through shader.
    pub fn passthrough() -> Self {
        let mut group = Self::new();
        group.add_shader(ShaderConfig::passthrough());
        group
    }

    pub fn changes(&self) -> u32 {
        self.changes
    }

    /// Align this group's counter with another group's. Used when a
    /// stand-in group (the built-in pass-through) is substituted for an
    /// empty one: the stand-in must appear changed exactly when the real
    /// group changes.
    pub(crate) fn sync_changes(&mut self, changes: u32) {
        self.changes = changes;
    }

    fn bump(&mut self) {
        self.changes = self.changes.wrapping_add(1);
    }

    /// Append a shader; it runs last.
    pub fn add_shader(&mut self, config: ShaderConfig) {
        self.shaders.push(config);
        self.shader_order.push(self.shaders.len() - 1);
        self.bump();
    }

    /// Remove the shader at storage index `index`, renumbering every order
    /// entry past it so the permutation stays valid.
    pub fn remove_shader(&mut self, index: usize) {
        if index >= self.shaders.len() {
            return;
        }
        self.shaders.remove(index);
        self.shader_order.retain(|&i| i != index);
        for entry in &mut self.shader_order {
            if *entry > index {
                *entry -= 1;
            }
        }
        self.bump();
    }

    /// Move the entry at order position `from` to order position `to`.
    pub fn move_shader(&mut self, from: usize, to: usize) {
        if from >= self.shader_order.len() || to >= self.shader_order.len() || from == to {
            return;
        }
        let entry = self.shader_order.remove(from);
        self.shader_order.insert(to, entry);
        self.bump();
    }

    /// Enable/disable a member. Structural for the runtime group: the set of
    /// compiled shaders changes, so this bumps the group counter.
    pub fn set_shader_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(shader) = self.shaders.get_mut(index) {
            if shader.enabled != enabled {
                shader.enabled = enabled;
                self.bump();
            }
        }
    }

    /// Shaders in execution order.
    pub fn ordered_shaders(&self) -> impl Iterator<Item = &ShaderConfig> {
        self.shader_order.iter().filter_map(|&i| self.shaders.get(i))
    }

    pub fn ordered_shaders_mut(&mut self) -> Vec<&mut ShaderConfig> {
        // Permutation guarantees unique indices; collect via split-off walk.
        let order = self.shader_order.clone();
        let mut refs: Vec<Option<&mut ShaderConfig>> =
            self.shaders.iter_mut().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| refs.get_mut(i).and_then(Option::take))
            .collect()
    }

    pub fn has_enabled_shaders(&self) -> bool {
        self.shaders.iter().any(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_of(n: usize) -> ShaderGroupConfig {
        let mut group = ShaderGroupConfig::new();
        for _ in 0..n {
            group.add_shader(ShaderConfig::passthrough());
        }
        group
    }

    #[test]
    fn add_appends_to_order() {
        let group = group_of(3);
        assert_eq!(group.shader_order, vec![0, 1, 2]);
        assert_eq!(group.changes(), 3);
    }

    #[test]
    fn remove_renumbers_order_entries() {
        let mut group = group_of(3);
        group.shader_order = vec![2, 0, 1];
        group.remove_shader(1);
        assert_eq!(group.shaders.len(), 2);
        // Former index 2 renumbers to 1; entry 1 is gone.
        assert_eq!(group.shader_order, vec![1, 0]);
    }

    #[test]
    fn remove_out_of_range_is_noop() {
        let mut group = group_of(2);
        let changes = group.changes();
        group.remove_shader(5);
        assert_eq!(group.shaders.len(), 2);
        assert_eq!(group.changes(), changes);
    }

    #[test]
    fn move_reorders_without_touching_storage() {
        let mut group = group_of(3);
        group.move_shader(0, 2);
        assert_eq!(group.shader_order, vec![1, 2, 0]);
        assert_eq!(group.shaders.len(), 3);
    }

    #[test]
    fn enable_toggle_bumps_counter() {
        let mut group = group_of(1);
        let changes = group.changes();
        group.set_shader_enabled(0, false);
        assert_eq!(group.changes(), changes + 1);
        assert!(!group.has_enabled_shaders());
        // Setting the same state again is counter-neutral.
        group.set_shader_enabled(0, false);
        assert_eq!(group.changes(), changes + 1);
    }

    #[test]
    fn ordered_iteration_follows_permutation() {
        let mut group = ShaderGroupConfig::new();
        for name in ["a", "b", "c"] {
            let mut config = ShaderConfig::passthrough();
            config.name = name.into();
            group.add_shader(config);
        }
        group.shader_order = vec![2, 0, 1];
        let names: Vec<_> = group.ordered_shaders().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn ordered_mut_yields_each_once() {
        let mut group = group_of(3);
        group.shader_order = vec![2, 0, 1];
        let refs = group.ordered_shaders_mut();
        assert_eq!(refs.len(), 3);
    }
}
