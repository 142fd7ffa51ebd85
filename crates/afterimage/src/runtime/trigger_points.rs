//! Routes render-event hooks to the shader groups configured for them.

use std::collections::HashMap;
use std::time::Instant;

use wgpu::{CommandEncoder, Device, Queue};

use crate::config::{DEFAULT_TRIGGER_POINT, ShaderGroupConfig, TriggerConfig};
use crate::trigger::{
    DrawCallTrigger, DrawEvent, EfbEvent, EfbTrigger, TextureLoadEvent, TextureLoadTrigger,
    Trigger, TriggerManager,
};

use super::ApplyParams;
use super::group::RuntimeShaderGroup;
use super::input::ImageDirs;

/// The time builtin is an `i32` of milliseconds; a clock left running past
/// its range pins at the maximum rather than wrapping negative.
fn saturate_ms(elapsed: u128) -> i32 {
    i32::try_from(elapsed).unwrap_or(i32::MAX)
}

/// First trigger in declaration order that accepts the event wins.
fn first_match<'a, T>(
    entries: &'a [(T, String)],
    mut accepts: impl FnMut(&T) -> bool,
) -> Option<&'a str> {
    entries
        .iter()
        .find(|(trigger, _)| accepts(trigger))
        .map(|(_, name)| name.as_str())
}

/// Owns one runtime group per configured trigger point and dispatches the
/// caller's render-event hooks to them.
///
/// The end-of-frame point always has a group: when its configured group is
/// empty or fully disabled, the built-in pass-through stands in, so a hook
/// at the default point always produces output in the destination.
pub struct TriggerPointManager {
    depth_near: f32,
    depth_far: f32,
    clock: Option<Instant>,
    last_change_count: Option<u64>,
    /// Stand-in for empty or fully disabled groups.
    passthrough_config: ShaderGroupConfig,
    groups: HashMap<String, RuntimeShaderGroup>,
    efb_triggers: Vec<(EfbTrigger, String)>,
    texture_triggers: Vec<(TextureLoadTrigger, String)>,
    draw_call_2d_triggers: Vec<(DrawCallTrigger, String)>,
    draw_call_3d_triggers: Vec<(DrawCallTrigger, String)>,
    post_group: String,
}

impl Default for TriggerPointManager {
    fn default() -> Self {
        Self {
            depth_near: 0.0,
            depth_far: 1.0,
            clock: None,
            last_change_count: None,
            passthrough_config: ShaderGroupConfig::passthrough(),
            groups: HashMap::new(),
            efb_triggers: Vec::new(),
            texture_triggers: Vec::new(),
            draw_call_2d_triggers: Vec::new(),
            draw_call_3d_triggers: Vec::new(),
            post_group: DEFAULT_TRIGGER_POINT.to_string(),
        }
    }
}

impl TriggerPointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the trigger config. Structural changes (points added or
    /// removed) rebuild the dispatch tables from the trigger profiles;
    /// intra-group edits flow through each group's own counter.
    pub fn update_config(
        &mut self,
        device: &Device,
        queue: &Queue,
        config: &TriggerConfig,
        triggers: &TriggerManager,
        dirs: &ImageDirs,
    ) {
        let reset = self.last_change_count != Some(config.changes());
        self.last_change_count = Some(config.changes());
        if reset {
            self.efb_triggers.clear();
            self.texture_triggers.clear();
            self.draw_call_2d_triggers.clear();
            self.draw_call_3d_triggers.clear();
            self.post_group = DEFAULT_TRIGGER_POINT.to_string();
            self.groups
                .retain(|name, _| config.groups.contains_key(name));
        }

        for (name, group_config) in &config.groups {
            let group = self.groups.entry(name.clone()).or_default();

            if group_config.shaders.is_empty() || !group_config.has_enabled_shaders() {
                // Keep the stand-in's counter in lockstep so edits to the
                // real group are noticed once it becomes non-empty again.
                self.passthrough_config.sync_changes(group_config.changes());
                group.update_config(device, queue, &self.passthrough_config, dirs, false);
            } else {
                group.update_config(device, queue, group_config, dirs, false);
            }

            if reset {
                match triggers.get(name) {
                    Some(Trigger::Efb(t)) => {
                        self.efb_triggers.push((t.clone(), name.clone()));
                    }
                    Some(Trigger::TextureLoad(t)) => {
                        self.texture_triggers.push((t.clone(), name.clone()));
                    }
                    Some(Trigger::DrawCall2D(t)) => {
                        self.draw_call_2d_triggers.push((t.clone(), name.clone()));
                    }
                    Some(Trigger::DrawCall3D(t)) => {
                        self.draw_call_3d_triggers.push((t.clone(), name.clone()));
                    }
                    Some(Trigger::Post) => {
                        self.post_group = name.clone();
                    }
                    None => {
                        if name != DEFAULT_TRIGGER_POINT {
                            log::warn!("no trigger profile named '{name}', point is inert");
                        }
                    }
                }
            }
        }

        // The default point exists even if the config somehow lost it.
        if !self.groups.contains_key(DEFAULT_TRIGGER_POINT) {
            let mut group = RuntimeShaderGroup::new();
            group.update_config(device, queue, &self.passthrough_config, dirs, true);
            self.groups.insert(DEFAULT_TRIGGER_POINT.to_string(), group);
        }
    }

    pub fn on_efb(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        event: &EfbEvent,
        params: &ApplyParams<'_>,
    ) {
        let name = first_match(&self.efb_triggers, |t| t.matches(event)).map(str::to_owned);
        self.apply_named(name.as_deref(), device, queue, encoder, params);
    }

    pub fn on_texture_load(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        event: &TextureLoadEvent<'_>,
        params: &ApplyParams<'_>,
    ) {
        let name = first_match(&self.texture_triggers, |t| t.matches(event)).map(str::to_owned);
        self.apply_named(name.as_deref(), device, queue, encoder, params);
    }

    pub fn on_draw_call_2d(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        event: &DrawEvent<'_>,
        params: &ApplyParams<'_>,
    ) {
        let name =
            first_match(&self.draw_call_2d_triggers, |t| t.matches(event)).map(str::to_owned);
        self.apply_named(name.as_deref(), device, queue, encoder, params);
    }

    pub fn on_draw_call_3d(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        event: &DrawEvent<'_>,
        params: &ApplyParams<'_>,
    ) {
        let name =
            first_match(&self.draw_call_3d_triggers, |t| t.matches(event)).map(str::to_owned);
        self.apply_named(name.as_deref(), device, queue, encoder, params);
    }

    /// End-of-frame hook; always backed by a group.
    pub fn on_post(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        params: &ApplyParams<'_>,
    ) {
        let name = self.post_group.clone();
        self.apply_named(Some(&name), device, queue, encoder, params);
    }

    pub fn set_depth_near_far(&mut self, depth_near: f32, depth_far: f32) {
        self.depth_near = depth_near;
        self.depth_far = depth_far;
    }

    /// Start the clock feeding the time builtin.
    pub fn start(&mut self) {
        self.clock = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.clock = None;
    }

    pub fn time_elapsed_ms(&self) -> i32 {
        self.clock
            .map_or(0, |started| saturate_ms(started.elapsed().as_millis()))
    }

    fn apply_named(
        &mut self,
        name: Option<&str>,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        params: &ApplyParams<'_>,
    ) {
        let Some(name) = name else {
            return;
        };
        let time_ms = self.time_elapsed_ms();
        if let Some(group) = self.groups.get_mut(name) {
            group.apply(
                device,
                queue,
                encoder,
                params,
                time_ms,
                self.depth_near,
                self.depth_far,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::NumericOperation;

    fn efb_entry(name: &str, width_op: NumericOperation, width: Option<u32>) -> (EfbTrigger, String) {
        (
            EfbTrigger {
                width_operation: width_op,
                width,
                ..Default::default()
            },
            name.to_string(),
        )
    }

    #[test]
    fn first_matching_trigger_wins() {
        let entries = vec![
            efb_entry("big", NumericOperation::Greater, Some(500)),
            efb_entry("any", NumericOperation::Any, None),
        ];
        let event = EfbEvent {
            width: 640,
            height: 480,
            format: 0,
        };
        assert_eq!(
            first_match(&entries, |t| t.matches(&event)),
            Some("big")
        );

        let small = EfbEvent {
            width: 320,
            height: 240,
            format: 0,
        };
        // "big" rejects, falls through to the catch-all.
        assert_eq!(
            first_match(&entries, |t| t.matches(&small)),
            Some("any")
        );
    }

    #[test]
    fn no_match_dispatches_nothing() {
        let entries = vec![efb_entry("big", NumericOperation::Greater, Some(500))];
        let event = EfbEvent {
            width: 100,
            height: 100,
            format: 0,
        };
        assert_eq!(first_match(&entries, |t| t.matches(&event)), None);
    }

    #[test]
    fn long_running_clock_pins_instead_of_wrapping() {
        assert_eq!(saturate_ms(0), 0);
        assert_eq!(saturate_ms(1500), 1500);
        assert_eq!(saturate_ms(i32::MAX as u128), i32::MAX);
        // Past ~24.8 days of milliseconds the counter pins.
        assert_eq!(saturate_ms(i32::MAX as u128 + 1), i32::MAX);
        assert_eq!(saturate_ms(u128::MAX), i32::MAX);
    }

    #[test]
    fn clock_reads_zero_when_stopped() {
        let mut manager = TriggerPointManager::new();
        assert_eq!(manager.time_elapsed_ms(), 0);
        manager.start();
        assert!(manager.time_elapsed_ms() >= 0);
        manager.stop();
        assert_eq!(manager.time_elapsed_ms(), 0);
    }
}
