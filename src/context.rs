//! Per-pass render context.

use std::path::Path;

use crate::config::BuildConfig;
use crate::paths::OutputPaths;
use crate::theme::{Theme, ThemeRegistry};

/// Immutable snapshot of one render pass: the compiler-facing configuration,
/// the theme registry with this pass's theme active, and the pass's output
/// and cache directories.
///
/// Built once per pass and never modified, so nothing a pass observes can be
/// changed by another pass.
#[derive(Debug, Clone)]
pub struct RenderContext {
    config: BuildConfig,
    themes: Option<ThemeRegistry>,
    paths: OutputPaths,
    theme_name: String,
    is_replica: bool,
}

impl RenderContext {
    /// Context for a build that does not use multiple themes.
    pub fn single(config: BuildConfig) -> Self {
        let theme_name = config.theme_name().unwrap_or_default().to_string();
        let paths = config.output_paths();
        Self {
            config,
            themes: None,
            paths,
            theme_name,
            is_replica: false,
        }
    }

    /// Context for one theme of a multi-theme build.
    ///
    /// `config` must already carry the resolved theme name.
    pub fn for_theme(
        config: BuildConfig,
        themes: ThemeRegistry,
        paths: OutputPaths,
        is_replica: bool,
    ) -> Self {
        let theme_name = themes.active().name.clone();
        Self {
            config,
            themes: Some(themes),
            paths,
            theme_name,
            is_replica,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The registry, absent when the multi-theme feature is unused.
    pub fn themes(&self) -> Option<&ThemeRegistry> {
        self.themes.as_ref()
    }

    pub fn active_theme(&self) -> Option<&Theme> {
        self.themes.as_ref().map(ThemeRegistry::active)
    }

    pub fn active_index(&self) -> usize {
        self.themes.as_ref().map_or(0, ThemeRegistry::active_index)
    }

    /// Bare theme name for the document compiler.
    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    pub fn output_dir(&self) -> &Path {
        &self.paths.output_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.paths.cache_dir
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Whether this pass runs in a replica rather than the original process.
    pub fn is_replica(&self) -> bool {
        self.is_replica
    }

    /// Subdirectory label for logs and events, empty for the primary theme.
    pub fn subdir(&self) -> &str {
        self.active_theme().map_or("", |theme| theme.subdir.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_context_uses_config_paths() {
        let ctx = RenderContext::single(BuildConfig::default());
        assert!(ctx.themes().is_none());
        assert_eq!(ctx.theme_name(), "default");
        assert_eq!(ctx.output_dir(), Path::new("_build/html"));
        assert_eq!(ctx.cache_dir(), Path::new("_build/html/.doctrees"));
        assert_eq!(ctx.subdir(), "");
        assert!(!ctx.is_replica());
    }

    #[test]
    fn test_theme_context_tracks_active() {
        let mut themes = ThemeRegistry::new(["a", "b"]).unwrap();
        themes.set_active(1).unwrap();
        let ctx = RenderContext::for_theme(
            BuildConfig::default(),
            themes,
            OutputPaths::new("out/theme_b", "out/theme_b/.doctrees"),
            true,
        );
        assert_eq!(ctx.theme_name(), "b");
        assert_eq!(ctx.active_index(), 1);
        assert_eq!(ctx.subdir(), "theme_b");
        assert!(ctx.is_replica());
    }
}
