//! Build lifecycle hooks.
//!
//! Connect the theme registry to the host build: decide on configuration
//! whether a multi-theme build happens at all, hand the document compiler a
//! bare theme name, and report the output tree once a build finished.

use log::{debug, info, warn};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{BuildConfig, ThemeValue, TreeStyle};
use crate::error::Result;
use crate::theme::ThemeRegistry;

#[derive(Debug, Clone)]
pub struct BuildLifecycleHooks {
    print_files: bool,
    tree_style: TreeStyle,
}

impl BuildLifecycleHooks {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            print_files: config.multi_theme_print_files,
            tree_style: config.print_files_style(),
        }
    }

    /// Build the registry from the configured theme value.
    ///
    /// A bare theme name means the feature is unused: a warning is logged and
    /// `None` returned so the build proceeds as a plain single-theme build.
    /// Invalid theme lists fail.
    pub fn config_resolved(&self, config: &BuildConfig) -> Result<Option<ThemeRegistry>> {
        match &config.html_theme {
            ThemeValue::Name(name) => {
                warn!(
                    "html_theme '{}' is not a theme list, multi-theme build disabled",
                    name
                );
                Ok(None)
            }
            ThemeValue::Multi(specs) => {
                let registry = ThemeRegistry::new(specs.iter().cloned())?;
                info!(
                    "Multi-theme build with {} themes, primary '{}'",
                    registry.len(),
                    registry.primary().name
                );
                Ok(Some(registry))
            }
        }
    }

    /// Configuration for a pass rendering the registry's active theme.
    ///
    /// `html_theme` becomes the active theme's name, and so does every
    /// `html_context` entry that holds the configured theme list.
    pub fn active_config(&self, config: &BuildConfig, registry: &ThemeRegistry) -> BuildConfig {
        let active = registry.active().name.clone();
        let mut resolved = config.clone();

        if let ThemeValue::Multi(_) = &config.html_theme {
            if let Ok(theme_value) = serde_json::to_value(&config.html_theme) {
                for (key, value) in resolved.html_context.iter_mut() {
                    if *value == theme_value {
                        debug!("html_context['{}'] -> '{}'", key, active);
                        *value = serde_json::Value::String(active.clone());
                    }
                }
            }
        }

        resolved.html_theme = ThemeValue::Name(active);
        resolved
    }

    /// Report the output tree if enabled and the build succeeded.
    ///
    /// Returns the reported lines. Listing failures are logged, never raised.
    pub fn build_finished(
        &self,
        output_dir: &Path,
        failure: Option<&anyhow::Error>,
    ) -> Option<Vec<String>> {
        if !self.print_files {
            return None;
        }
        if failure.is_some() {
            debug!("Build failed, not listing output files");
            return None;
        }

        match output_tree(output_dir, self.tree_style) {
            Ok(lines) => {
                for line in &lines {
                    info!("{}", line);
                }
                Some(lines)
            }
            Err(e) => {
                warn!("Failed to list output files in {}: {}", output_dir.display(), e);
                None
            }
        }
    }
}

struct Glyphs {
    branch: &'static str,
    last: &'static str,
    pipe: &'static str,
    blank: &'static str,
}

impl TreeStyle {
    fn glyphs(self) -> Glyphs {
        match self {
            TreeStyle::Ascii => Glyphs {
                branch: "|-- ",
                last: "`-- ",
                pipe: "|   ",
                blank: "    ",
            },
            TreeStyle::Unicode => Glyphs {
                branch: "├── ",
                last: "└── ",
                pipe: "│   ",
                blank: "    ",
            },
        }
    }
}

/// Draw the directory tree under `root`, entries sorted by name.
///
/// Directories carry a trailing path separator.
pub fn output_tree(root: &Path, style: TreeStyle) -> std::result::Result<Vec<String>, walkdir::Error> {
    let entries = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let glyphs = style.glyphs();

    let depths: Vec<usize> = entries.iter().map(|e| e.depth()).collect();
    // An entry is the last of its siblings if the next entry at its depth or
    // shallower is shallower.
    let is_last: Vec<bool> = (0..depths.len())
        .map(|i| {
            depths[i + 1..]
                .iter()
                .find(|&&d| d <= depths[i])
                .map_or(true, |&d| d < depths[i])
        })
        .collect();

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    let mut lines = vec![format!("{}{}", root_name, std::path::MAIN_SEPARATOR)];
    let mut open_levels: Vec<bool> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let depth = depths[i];
        open_levels.truncate(depth - 1);

        let mut line = String::new();
        for &ancestor_is_last in &open_levels {
            line.push_str(if ancestor_is_last { glyphs.blank } else { glyphs.pipe });
        }
        line.push_str(if is_last[i] { glyphs.last } else { glyphs.branch });
        line.push_str(&entry.file_name().to_string_lossy());
        if entry.file_type().is_dir() {
            line.push(std::path::MAIN_SEPARATOR);
        }
        lines.push(line);
        open_levels.push(is_last[i]);
    }

    Ok(lines)
}
