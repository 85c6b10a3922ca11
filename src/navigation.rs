//! Cross-theme navigation links.
//!
//! The primary theme's output tree sits at the output root and every secondary
//! tree sits exactly one level below it, so links between variants of the same
//! page only depend on which of the two trees is the root.

use serde::{Deserialize, Serialize};

use crate::theme::Theme;

/// A link from the current page to its counterpart in one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeLink {
    pub display_text: String,
    pub target_uri: String,
    /// The link points at the page being rendered
    pub is_same_page: bool,
}

impl ThemeLink {
    pub fn new(
        display_text: impl Into<String>,
        target_uri: impl Into<String>,
        is_same_page: bool,
    ) -> Self {
        Self {
            display_text: display_text.into(),
            target_uri: target_uri.into(),
            is_same_page,
        }
    }
}

/// Links to `document_id` under every theme, in registry order.
///
/// Empty when fewer than two themes are registered.
pub fn generate_links(
    themes: &[Theme],
    document_id: &str,
    active_is_primary: bool,
) -> Vec<ThemeLink> {
    if themes.len() < 2 {
        return Vec::new();
    }

    themes
        .iter()
        .map(|theme| {
            let (target_uri, is_same_page) = if theme.is_active() {
                (document_id.to_string(), true)
            } else if active_is_primary {
                (format!("{}/{}", theme.subdir, document_id), false)
            } else if theme.is_primary() {
                (format!("../{}", document_id), false)
            } else {
                (format!("../{}/{}", theme.subdir, document_id), false)
            };
            ThemeLink::new(theme.label(), target_uri, is_same_page)
        })
        .collect()
}

/// Render links as a bullet list.
///
/// `depth` is how many directories the page sits below its tree's root; that
/// many `../` are prepended to links leaving the page's own tree.
pub fn render_links(links: &[ThemeLink], depth: usize) -> String {
    if links.is_empty() {
        return String::new();
    }

    let prefix = "../".repeat(depth);
    let mut html = String::from("<ul class=\"multi-theme-list\">\n");
    for link in links {
        let (class, href) = if link.is_same_page {
            // Relative to the page's own directory
            let file_name = link.target_uri.rsplit('/').next().unwrap_or_default();
            ("reference internal current", file_name.to_string())
        } else {
            ("reference external", format!("{}{}", prefix, link.target_uri))
        };
        html.push_str(&format!(
            "<li><p><a class=\"{}\" href=\"{}\">{}</a></p></li>\n",
            class,
            html_escape::encode_double_quoted_attribute(&href),
            html_escape::encode_text(&link.display_text)
        ));
    }
    html.push_str("</ul>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{ThemeRegistry, ThemeSpec};

    fn primary_secondary() -> ThemeRegistry {
        ThemeRegistry::new([
            ThemeSpec::from(Theme::new("rtd").with_display_name("Primary")),
            ThemeSpec::from(
                Theme::new("rtd")
                    .with_display_name("Secondary")
                    .with_subdir("theme_secondary"),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_links_from_primary() {
        let registry = primary_secondary();
        let links = generate_links(registry.themes(), "index.html", true);
        assert_eq!(
            links,
            vec![
                ThemeLink::new("Primary", "index.html", true),
                ThemeLink::new("Secondary", "theme_secondary/index.html", false),
            ]
        );
    }

    #[test]
    fn test_links_from_secondary() {
        let mut registry = primary_secondary();
        registry.set_active(1).unwrap();
        let links = generate_links(registry.themes(), "index.html", false);
        assert_eq!(
            links,
            vec![
                ThemeLink::new("Primary", "../index.html", false),
                ThemeLink::new("Secondary", "index.html", true),
            ]
        );
    }

    #[test]
    fn test_links_between_secondaries() {
        let mut registry = ThemeRegistry::new(["a", "b", "c"]).unwrap();
        registry.set_active(1).unwrap();
        let targets: Vec<_> = generate_links(registry.themes(), "other.html", false)
            .into_iter()
            .map(|l| l.target_uri)
            .collect();
        assert_eq!(
            targets,
            vec!["../other.html", "other.html", "../theme_c/other.html"]
        );
    }

    #[test]
    fn test_single_theme_has_no_links() {
        let registry = ThemeRegistry::new(["a"]).unwrap();
        assert!(generate_links(registry.themes(), "index.html", true).is_empty());
        assert_eq!(render_links(&[], 0), "");
    }

    #[test]
    fn test_render_nested_page() {
        let registry = primary_secondary();
        let links = generate_links(registry.themes(), "guide/intro.html", true);
        let html = render_links(&links, 1);
        assert!(html.contains("href=\"intro.html\""));
        assert!(html.contains("href=\"../theme_secondary/guide/intro.html\""));
        assert!(html.contains(">Secondary</a>"));
    }
}
