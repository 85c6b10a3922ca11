//! Build configuration.
//!
//! Loaded from `multitheme.toml` (or `.yaml`/`.yml`) and overridden from the
//! command line. `html_theme` is either a bare theme name or an ordered list
//! of themes; only the list form turns on multi-theme builds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MultiThemeError, Result};
use crate::paths::OutputPaths;
use crate::theme::ThemeSpec;

/// File names probed when no config file is given explicitly.
pub const CONFIG_FILE_NAMES: &[&str] = &["multitheme.toml", "multitheme.yaml", "multitheme.yml"];

/// Default cache directory name inside the output directory.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".doctrees";

/// The configured theme value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeValue {
    Name(String),
    Multi(Vec<ThemeSpec>),
}

impl Default for ThemeValue {
    fn default() -> Self {
        ThemeValue::Name("default".to_string())
    }
}

/// Drawing style for the output tree report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TreeStyle {
    Ascii,
    Unicode,
}

impl Default for TreeStyle {
    fn default() -> Self {
        if std::path::MAIN_SEPARATOR == '/' {
            TreeStyle::Unicode
        } else {
            TreeStyle::Ascii
        }
    }
}

/// How secondary theme passes get their own process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationStrategy {
    /// fork on unix, spawn elsewhere
    #[default]
    Auto,
    /// fork; secondary themes are dropped where unavailable
    Fork,
    /// Re-execute the current binary for each secondary theme
    Spawn,
    /// Build the primary theme only
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub project: String,
    pub language: Option<String>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Defaults to `<output_dir>/.doctrees`
    pub cache_dir: Option<PathBuf>,
    pub html_theme: ThemeValue,
    pub html_context: BTreeMap<String, serde_json::Value>,
    pub exclude_patterns: Vec<String>,
    pub theme_paths: Vec<PathBuf>,
    pub parallel_jobs: Option<usize>,
    pub multi_theme_print_files: bool,
    pub multi_theme_print_files_style: Option<TreeStyle>,
    pub replication: ReplicationStrategy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project: "Project".to_string(),
            language: None,
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("_build/html"),
            cache_dir: None,
            html_theme: ThemeValue::default(),
            html_context: BTreeMap::new(),
            exclude_patterns: Vec::new(),
            theme_paths: Vec::new(),
            parallel_jobs: None,
            multi_theme_print_files: false,
            multi_theme_print_files_style: None,
            replication: ReplicationStrategy::default(),
        }
    }
}

impl BuildConfig {
    /// Load a config file; relative paths in it resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str::<Self>(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str::<Self>(&content).map_err(|e| e.to_string())
        };
        let mut config = parsed.map_err(|message| MultiThemeError::Config {
            path: path.to_path_buf(),
            message,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.source_dir);
        resolve(&mut self.output_dir);
        if let Some(cache_dir) = self.cache_dir.as_mut() {
            resolve(cache_dir);
        }
        self.theme_paths.iter_mut().for_each(resolve);
    }

    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(DEFAULT_CACHE_DIR_NAME))
    }

    /// Unmodified paths, as used by the primary theme.
    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::new(&self.output_dir, self.resolved_cache_dir())
    }

    pub fn print_files_style(&self) -> TreeStyle {
        self.multi_theme_print_files_style.unwrap_or_default()
    }

    /// The bare theme name, if the compiler-facing value has been resolved.
    pub fn theme_name(&self) -> Option<&str> {
        match &self.html_theme {
            ThemeValue::Name(name) => Some(name),
            ThemeValue::Multi(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.theme_name(), Some("default"));
        assert!(!config.multi_theme_print_files);
        assert_eq!(
            config.resolved_cache_dir(),
            PathBuf::from("_build/html").join(".doctrees")
        );
    }

    #[test]
    fn test_load_toml_with_theme_list() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("multitheme.toml");
        std::fs::write(
            &path,
            r#"
project = "Demo"
source_dir = "docs"
output_dir = "docs/_build/html"
html_theme = ["classic", { name = "alabaster", display_name = "Alabaster", subdir = "alt" }]
multi_theme_print_files = true
multi_theme_print_files_style = "ascii"

[html_context]
other = "value"
"#,
        )
        .unwrap();

        let config = BuildConfig::from_file(&path).unwrap();
        assert_eq!(config.project, "Demo");
        assert_eq!(config.source_dir, temp_dir.path().join("docs"));
        assert_eq!(config.output_dir, temp_dir.path().join("docs/_build/html"));
        assert_eq!(config.print_files_style(), TreeStyle::Ascii);
        match &config.html_theme {
            ThemeValue::Multi(specs) => {
                assert_eq!(specs.len(), 2);
                assert_eq!(specs[1].name(), "alabaster");
            }
            other => panic!("expected theme list, got {:?}", other),
        }
        assert_eq!(config.html_context["other"], "value");
    }

    #[test]
    fn test_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("multitheme.yaml");
        std::fs::write(&path, "html_theme: classic\nreplication: disabled\n").unwrap();

        let config = BuildConfig::from_file(&path).unwrap();
        assert_eq!(config.theme_name(), Some("classic"));
        assert_eq!(config.replication, ReplicationStrategy::Disabled);
        assert_eq!(BuildConfig::discover(temp_dir.path()), Some(path));
    }

    #[test]
    fn test_invalid_config_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("multitheme.toml");
        std::fs::write(&path, "html_theme = 42\n").unwrap();

        match BuildConfig::from_file(&path) {
            Err(MultiThemeError::Config { path: err_path, .. }) => assert_eq!(err_path, path),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
