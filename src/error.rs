//! Error types for multi-theme builds.
//!
//! Construction-time errors (`EmptyRegistry`, `PrimaryHasSubdir`,
//! `SubdirCollision`) and lookup errors are returned synchronously to the
//! caller. Replication errors abort the whole orchestrated run; output
//! directories from such a run must be treated as indeterminate.

use std::path::PathBuf;
use thiserror::Error;

use crate::theme::Theme;

#[derive(Debug, Error)]
pub enum MultiThemeError {
    #[error("At least one theme is required")]
    EmptyRegistry,

    #[error("Primary theme cannot have a subdir: {theme:?}")]
    PrimaryHasSubdir { theme: Theme },

    #[error("Subdir collision: {first:?} and {second:?}")]
    SubdirCollision { first: Theme, second: Theme },

    #[error("Theme index {index} out of range (registry has {len} themes)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No theme named '{name}'")]
    KeyNotFound { name: String },

    #[error("Fork failed ({code}): {reason}")]
    ForkFailed { code: i32, reason: String },

    #[error("Child process {pid} failed with status {status}")]
    ChildBuildFailed { pid: u32, status: i32 },

    #[error("Waiting for child process {pid} failed: {reason}")]
    ReplicaWaitFailed { pid: u32, reason: String },

    #[error("Process replication is not supported on this platform")]
    UnsupportedPlatform,

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MultiThemeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_failed_names_code() {
        let err = MultiThemeError::ForkFailed {
            code: -1,
            reason: "Resource temporarily unavailable".to_string(),
        };
        assert!(err.to_string().starts_with("Fork failed (-1)"));
    }

    #[test]
    fn child_failure_names_pid_and_status() {
        let err = MultiThemeError::ChildBuildFailed { pid: 4242, status: 2 };
        assert_eq!(err.to_string(), "Child process 4242 failed with status 2");
    }

    #[test]
    fn lookup_errors_name_the_key() {
        assert_eq!(
            MultiThemeError::KeyNotFound { name: "x".into() }.to_string(),
            "No theme named 'x'"
        );
        assert_eq!(
            MultiThemeError::IndexOutOfRange { index: 3, len: 2 }.to_string(),
            "Theme index 3 out of range (registry has 2 themes)"
        );
    }
}
