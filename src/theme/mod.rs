//! Theme descriptors for multi-theme builds.
//!
//! A [`Theme`] names one visual variant of the documentation. The first theme
//! of a [`ThemeRegistry`] is the primary theme and renders into the output root;
//! every other theme renders into its own subdirectory.

pub mod catalog;
pub mod registry;

pub use catalog::{ThemeCatalog, ThemeDefinition};
pub use registry::ThemeRegistry;

use serde::{Deserialize, Serialize};

/// Prefix used when deriving a default subdirectory from a theme name.
pub const DEFAULT_SUBDIR_PREFIX: &str = "theme_";

/// One theme variant.
///
/// Equality compares every field, including the active flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Theme {
    /// Theme identifier handed to the document compiler, e.g. "classic"
    pub name: String,
    /// Human readable label used in cross-theme links; empty means `name`
    #[serde(default)]
    pub display_name: String,
    /// Output subdirectory basename, empty for the primary theme
    #[serde(default)]
    pub subdir: String,
    #[serde(skip)]
    pub(crate) is_active: bool,
}

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            subdir: String::new(),
            is_active: false,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    /// A theme without a subdirectory renders into the output root.
    pub fn is_primary(&self) -> bool {
        self.subdir.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Label for links, falling back to the theme name.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    pub(crate) fn default_subdir(&self) -> String {
        format!("{}{}", DEFAULT_SUBDIR_PREFIX, self.name)
    }
}

/// A theme as written in configuration: a bare name or a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeSpec {
    Name(String),
    Descriptor {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subdir: Option<String>,
    },
}

impl ThemeSpec {
    pub fn name(&self) -> &str {
        match self {
            ThemeSpec::Name(name) => name,
            ThemeSpec::Descriptor { name, .. } => name,
        }
    }

    /// Normalize into an inactive [`Theme`], missing fields left empty.
    pub fn into_theme(self) -> Theme {
        match self {
            ThemeSpec::Name(name) => Theme::new(name),
            ThemeSpec::Descriptor {
                name,
                display_name,
                subdir,
            } => Theme::new(name)
                .with_display_name(display_name.unwrap_or_default())
                .with_subdir(subdir.unwrap_or_default()),
        }
    }
}

impl From<&str> for ThemeSpec {
    fn from(name: &str) -> Self {
        ThemeSpec::Name(name.to_string())
    }
}

impl From<String> for ThemeSpec {
    fn from(name: String) -> Self {
        ThemeSpec::Name(name)
    }
}

impl From<Theme> for ThemeSpec {
    fn from(theme: Theme) -> Self {
        ThemeSpec::Descriptor {
            name: theme.name,
            display_name: Some(theme.display_name).filter(|s| !s.is_empty()),
            subdir: Some(theme.subdir).filter(|s| !s.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::new("name");
        assert_eq!(theme.name, "name");
        assert_eq!(theme.display_name, "");
        assert_eq!(theme.subdir, "");
        assert!(!theme.is_active());
        assert!(theme.is_primary());
        assert_eq!(theme.label(), "name");
    }

    #[test]
    fn test_theme_with_subdir_is_secondary() {
        let theme = Theme::new("name")
            .with_display_name("Name")
            .with_subdir("subdir");
        assert_eq!(theme.display_name, "Name");
        assert_eq!(theme.label(), "Name");
        assert!(!theme.is_primary());
    }

    #[test]
    fn test_equality_covers_active_flag() {
        let a = Theme::new("a");
        let mut b = Theme::new("a");
        assert_eq!(a, b);
        b.is_active = true;
        assert_ne!(a, b);
    }

    #[test]
    fn test_spec_deserializes_both_forms() {
        let specs: Vec<ThemeSpec> = serde_json::from_str(
            r#"["classic", {"name": "alabaster", "display_name": "Alabaster", "subdir": "alt"}]"#,
        )
        .unwrap();
        assert_eq!(specs[0], ThemeSpec::from("classic"));
        let theme = specs[1].clone().into_theme();
        assert_eq!(theme.name, "alabaster");
        assert_eq!(theme.display_name, "Alabaster");
        assert_eq!(theme.subdir, "alt");
    }

    #[test]
    fn test_descriptor_without_optional_fields_normalizes_to_empty() {
        let spec: ThemeSpec = serde_json::from_str(r#"{"name": "traditional"}"#).unwrap();
        assert_eq!(spec.name(), "traditional");
        assert_eq!(spec.into_theme(), Theme::new("traditional"));
    }
}
