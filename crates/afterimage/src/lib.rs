//! Data-driven post-processing shader chains for wgpu.
//!
//! Effects are WGSL fragment snippets with a JSON sidecar describing their
//! options and passes. Configs are plain mutable data with change counters;
//! the runtime layer watches the counters, recompiling or re-uploading only
//! what an edit actually invalidated. A [`runtime::TriggerPointManager`]
//! routes render-event hooks (EFB copies, texture loads, draw calls, end of
//! frame) to the shader groups configured for them.

pub mod config;
pub mod error;
pub mod runtime;
pub mod trigger;

pub use config::{SearchRoots, ShaderConfig, ShaderGroupConfig, TriggerConfig};
pub use error::{CompileError, ConfigError};
pub use runtime::{ApplyParams, Rect, RuntimeShaderGroup, TriggerPointManager};
pub use trigger::TriggerManager;
