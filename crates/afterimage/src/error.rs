use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading or validating configuration documents.
///
/// All of these abort the offending document; callers fall back to a
/// synthesized default config (or skip the profile) and keep going.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("pass {pass}: explicit pass index {index} out of range ({total} passes)")]
    PassIndexOutOfRange {
        pass: usize,
        index: u32,
        total: usize,
    },

    #[error("pass {pass}: input references the pass's own output")]
    PassSelfReference { pass: usize },

    #[error("trigger profile '{name}': {reason}")]
    InvalidTrigger { name: String, reason: String },
}

/// Errors produced while turning a config into GPU objects.
///
/// Recorded on the owning config's runtime-info flag; the offending shader
/// or group is cleared to a no-op until the next successful compile.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("WGSL parse error in '{shader}':\n{message}")]
    ShaderParse { shader: String, message: String },

    #[error("WGSL validation error in '{shader}': {message}")]
    ShaderValidation { shader: String, message: String },

    #[error("pipeline creation failed for '{shader}': {message}")]
    Pipeline { shader: String, message: String },

    #[error("failed to load image '{path}': {message}")]
    Image { path: String, message: String },

    #[error("'{shader}' has no enabled passes")]
    NoPasses { shader: String },

    #[error("'{shader}' reads the depth buffer but none was provided")]
    MissingDepthBuffer { shader: String },
}
