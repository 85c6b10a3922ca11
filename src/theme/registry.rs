//! Ordered theme registry with subdirectory assignment.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;

use super::{Theme, ThemeSpec};
use crate::error::{MultiThemeError, Result};

/// Ordered, non-empty set of themes. Index 0 is the primary theme.
///
/// Exactly one theme is active at any time. The primary theme never has a
/// subdirectory; every secondary theme has a unique, non-empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeRegistry {
    themes: Vec<Theme>,
}

// A registry always holds the primary theme.
#[allow(clippy::len_without_is_empty)]
impl ThemeRegistry {
    /// Build a registry from theme specifications, assigning subdirectories.
    ///
    /// The primary theme starts out active.
    pub fn new<I, S>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ThemeSpec>,
    {
        let themes: Vec<Theme> = specs
            .into_iter()
            .map(|spec| spec.into().into_theme())
            .collect();
        if themes.is_empty() {
            return Err(MultiThemeError::EmptyRegistry);
        }

        let mut registry = Self { themes };
        registry.assign_subdirs()?;
        registry.themes[0].is_active = true;
        Ok(registry)
    }

    /// Explicit subdirectories are kept and must be unique. Derived ones are
    /// `theme_<name>` with the smallest free numeric suffix starting at 2.
    fn assign_subdirs(&mut self) -> Result<()> {
        if !self.themes[0].subdir.is_empty() {
            return Err(MultiThemeError::PrimaryHasSubdir {
                theme: self.themes[0].clone(),
            });
        }

        // subdir -> index of the theme that claimed it
        let mut claimed: HashMap<String, usize> = HashMap::new();

        for index in 1..self.themes.len() {
            let theme = &self.themes[index];
            if !theme.subdir.is_empty() {
                if let Some(&owner) = claimed.get(&theme.subdir) {
                    return Err(MultiThemeError::SubdirCollision {
                        first: self.themes[owner].clone(),
                        second: theme.clone(),
                    });
                }
                claimed.insert(theme.subdir.clone(), index);
                continue;
            }

            let base = theme.default_subdir();
            let mut candidate = base.clone();
            let mut suffix = 2;
            while claimed.contains_key(&candidate) {
                candidate = format!("{}{}", base, suffix);
                suffix += 1;
            }
            debug!("Theme '{}' assigned subdir '{}'", theme.name, candidate);
            claimed.insert(candidate.clone(), index);
            self.themes[index].subdir = candidate;
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Theme> {
        self.themes.iter()
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    /// Secondary themes in registry order, with their indices.
    pub fn secondaries(&self) -> impl Iterator<Item = (usize, &Theme)> {
        self.themes.iter().enumerate().skip(1)
    }

    /// Look up a theme by position.
    pub fn get(&self, index: usize) -> Result<&Theme> {
        self.themes
            .get(index)
            .ok_or(MultiThemeError::IndexOutOfRange {
                index,
                len: self.themes.len(),
            })
    }

    /// Look up the first theme with the given name.
    pub fn by_name(&self, name: &str) -> Result<&Theme> {
        self.themes
            .iter()
            .find(|theme| theme.name == name)
            .ok_or_else(|| MultiThemeError::KeyNotFound {
                name: name.to_string(),
            })
    }

    pub fn primary(&self) -> &Theme {
        &self.themes[0]
    }

    pub fn active_index(&self) -> usize {
        self.themes
            .iter()
            .position(|theme| theme.is_active)
            .unwrap_or(0)
    }

    pub fn active(&self) -> &Theme {
        &self.themes[self.active_index()]
    }

    /// Mark the theme at `index` active and all others inactive.
    pub fn set_active(&mut self, index: usize) -> Result<()> {
        if index >= self.themes.len() {
            return Err(MultiThemeError::IndexOutOfRange {
                index,
                len: self.themes.len(),
            });
        }
        for (i, theme) in self.themes.iter_mut().enumerate() {
            theme.is_active = i == index;
        }
        Ok(())
    }

    /// Drop every secondary theme, returning them in their original order.
    ///
    /// Returns an empty list once only the primary theme is left.
    pub fn truncate(&mut self) -> Vec<Theme> {
        let removed = self.themes.split_off(1);
        if removed.iter().any(Theme::is_active) {
            self.themes[0].is_active = true;
        }
        removed
    }
}

impl<'a> IntoIterator for &'a ThemeRegistry {
    type Item = &'a Theme;
    type IntoIter = std::slice::Iter<'a, Theme>;

    fn into_iter(self) -> Self::IntoIter {
        self.themes.iter()
    }
}
