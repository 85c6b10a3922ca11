//! Property tests for subdirectory assignment and the active theme.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use sphinx_multi_theme::ThemeRegistry;

fn theme_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-c]{1,2}", 2..10)
}

proptest! {
    #[test]
    fn derived_subdirs_are_unique_and_numbered(names in theme_names()) {
        let registry = ThemeRegistry::new(names.iter().map(String::as_str)).unwrap();

        prop_assert_eq!(registry.primary().subdir.as_str(), "");

        let mut seen = HashSet::new();
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for (_, theme) in registry.secondaries() {
            prop_assert!(seen.insert(theme.subdir.clone()), "duplicate {}", theme.subdir);

            let count = occurrences.entry(theme.name.as_str()).or_insert(0);
            *count += 1;
            let expected = if *count == 1 {
                format!("theme_{}", theme.name)
            } else {
                format!("theme_{}{}", theme.name, count)
            };
            prop_assert_eq!(&theme.subdir, &expected);
        }
    }

    #[test]
    fn exactly_one_theme_is_active(names in theme_names(), index in 0usize..12) {
        let mut registry = ThemeRegistry::new(names.iter().map(String::as_str)).unwrap();
        prop_assert_eq!(registry.iter().filter(|t| t.is_active()).count(), 1);

        let result = registry.set_active(index);
        prop_assert_eq!(result.is_ok(), index < names.len());
        prop_assert_eq!(registry.iter().filter(|t| t.is_active()).count(), 1);
        if index < names.len() {
            prop_assert_eq!(registry.active_index(), index);
        } else {
            prop_assert_eq!(registry.active_index(), 0);
        }
    }

    #[test]
    fn truncate_keeps_primary_active(names in theme_names(), index in 0usize..2) {
        let mut registry = ThemeRegistry::new(names.iter().map(String::as_str)).unwrap();
        registry.set_active(index).unwrap();

        let dropped = registry.truncate();
        prop_assert_eq!(dropped.len(), names.len() - 1);
        prop_assert_eq!(registry.len(), 1);
        prop_assert!(registry.primary().is_active());
        prop_assert!(registry.truncate().is_empty());
    }
}
