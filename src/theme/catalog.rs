//! On-disk theme definitions used by the built-in site builder.
//!
//! A theme directory contains a `theme.toml`, an optional `static/` directory
//! copied to `_static/`, and an optional `templates/` directory whose
//! `layout.html` replaces the built-in page layout. Themes can inherit from
//! other themes. Names without a definition fall back to a generated theme
//! consisting of a single `<name>.css` stylesheet.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
struct ThemeToml {
    theme: ThemeTomlMeta,
}

#[derive(Debug, Clone, Deserialize)]
struct ThemeTomlMeta {
    name: String,
    #[serde(default)]
    inherit: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    stylesheets: Vec<String>,
}

/// A theme's assets and templates.
#[derive(Debug, Clone)]
pub struct ThemeDefinition {
    pub name: String,
    pub inherit: Option<String>,
    pub version: String,
    /// Stylesheets relative to `_static/`
    pub stylesheets: Vec<String>,
    pub templates_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    /// True for themes synthesized because no definition was found
    pub generated: bool,
}

impl ThemeDefinition {
    /// Load a theme from a directory containing theme.toml
    pub fn from_path(path: &Path) -> Result<Self> {
        let theme_toml_path = path.join("theme.toml");
        if !theme_toml_path.exists() {
            return Err(anyhow!(
                "Theme directory {} does not contain theme.toml",
                path.display()
            ));
        }

        let content = std::fs::read_to_string(&theme_toml_path)
            .with_context(|| format!("Failed to read {}", theme_toml_path.display()))?;
        let toml: ThemeToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", theme_toml_path.display()))?;
        let meta = toml.theme;

        let templates_dir = Some(path.join("templates")).filter(|dir| dir.is_dir());
        let static_dir = Some(path.join("static")).filter(|dir| dir.is_dir());

        Ok(Self {
            name: meta.name,
            inherit: meta.inherit,
            version: meta.version.unwrap_or_else(|| "0.0.0".to_string()),
            stylesheets: meta.stylesheets,
            templates_dir,
            static_dir,
            generated: false,
        })
    }

    /// Synthesize a theme with a single generated stylesheet.
    pub fn generated(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inherit: None,
            version: "0.0.0".to_string(),
            stylesheets: vec![format!("{}.css", name)],
            templates_dir: None,
            static_dir: None,
            generated: true,
        }
    }

    /// Stylesheet body written for generated themes.
    pub fn generated_stylesheet(&self) -> String {
        // Stable per-name accent so variants are visually distinct.
        let hash = blake3::hash(self.name.as_bytes());
        let bytes = hash.as_bytes();
        format!(
            "/* generated stylesheet for theme '{}' */\n\
             body {{ font-family: sans-serif; margin: 0 auto; max-width: 56em; }}\n\
             header.theme-banner {{ background: #{:02x}{:02x}{:02x}; color: #fff; padding: 0.5em 1em; }}\n\
             ul.multi-theme-list a.current {{ font-weight: bold; }}\n",
            self.name, bytes[0], bytes[1], bytes[2]
        )
    }
}

/// Discovers theme definitions in search paths.
#[derive(Debug, Default)]
pub struct ThemeCatalog {
    themes: HashMap<String, ThemeDefinition>,
    search_paths: Vec<PathBuf>,
}

impl ThemeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Load every subdirectory with a theme.toml from the search paths.
    pub fn discover(&mut self) {
        for search_path in &self.search_paths {
            let Ok(entries) = std::fs::read_dir(search_path) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.join("theme.toml").is_file() {
                    continue;
                }
                match ThemeDefinition::from_path(&path) {
                    Ok(theme) => {
                        log::debug!("Discovered theme: {} at {}", theme.name, path.display());
                        self.themes.insert(theme.name.clone(), theme);
                    }
                    Err(e) => {
                        log::warn!("Failed to load theme from {}: {:#}", path.display(), e);
                    }
                }
            }
        }
    }

    pub fn register(&mut self, theme: ThemeDefinition) {
        self.themes.insert(theme.name.clone(), theme);
    }

    pub fn get(&self, name: &str) -> Option<&ThemeDefinition> {
        self.themes.get(name)
    }

    /// Resolve the inheritance chain for a theme, root ancestor first.
    ///
    /// A name with no definition resolves to a generated theme.
    pub fn resolve_chain(&self, name: &str) -> Result<Vec<ThemeDefinition>> {
        let Some(leaf) = self.get(name) else {
            log::debug!("No definition for theme '{}', using generated theme", name);
            return Ok(vec![ThemeDefinition::generated(name)]);
        };

        let mut chain = vec![leaf.clone()];
        let mut seen = HashSet::from([name.to_string()]);
        let mut parent = leaf.inherit.clone();

        while let Some(parent_name) = parent {
            if !seen.insert(parent_name.clone()) {
                return Err(anyhow!(
                    "Circular theme inheritance detected: {}",
                    parent_name
                ));
            }
            let theme = self
                .get(&parent_name)
                .ok_or_else(|| anyhow!("Theme '{}' not found (inherited by '{}')", parent_name, name))?;
            chain.push(theme.clone());
            parent = theme.inherit.clone();
        }

        chain.reverse();
        Ok(chain)
    }
}
