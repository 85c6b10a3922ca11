//! Built-in document compiler.
//!
//! Renders a tree of Markdown pages into HTML for exactly one theme per
//! invocation. Everything a pass needs is read from its [`RenderContext`], so
//! consecutive passes in one process never observe each other.

use anyhow::{Context, Result};
use log::{debug, info};
use minijinja::{context, Environment, Value};
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::context::RenderContext;
use crate::directives::DirectiveRegistry;
use crate::matching::{self, SourceMatcher};
use crate::theme::{ThemeCatalog, ThemeDefinition};

/// Directory under the output root holding theme assets.
pub const STATIC_DIR: &str = "_static";

/// Theme directory looked up inside the source tree.
pub const SOURCE_THEMES_DIR: &str = "_themes";

const LAYOUT_TEMPLATE: &str = "layout.html";

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html{% if language %} lang="{{ language }}"{% endif %}>
<head>
<meta charset="utf-8" />
<title>{{ title }} | {{ project }}</title>
{% for sheet in stylesheets %}<link rel="stylesheet" href="{{ static_prefix }}{{ sheet }}" />
{% endfor %}</head>
<body class="theme-{{ theme }}">
<header class="theme-banner">{{ project }}</header>
<main>
{{ body|safe }}
</main>
</body>
</html>
"#;

/// Turns a source tree into an output tree for the context's active theme.
pub trait DocumentCompiler {
    fn compile(&mut self, ctx: &RenderContext) -> Result<()>;
}

/// Intermediate result for one page, stored in the pass's cache directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPage {
    fingerprint: String,
    title: Option<String>,
    body_html: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub pages_written: usize,
    pub cache_hits: usize,
    pub build_time: Duration,
}

struct PageOutcome {
    cache_hit: bool,
}

pub struct SiteBuilder {
    directives: DirectiveRegistry,
    last_stats: Option<BuildStats>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            directives: DirectiveRegistry::with_builtin_directives(),
            last_stats: None,
        }
    }

    /// Statistics of the most recent successful pass.
    pub fn last_stats(&self) -> Option<&BuildStats> {
        self.last_stats.as_ref()
    }

    fn theme_chain(ctx: &RenderContext) -> Result<Vec<ThemeDefinition>> {
        let config = ctx.config();
        let mut catalog = ThemeCatalog::new();
        let source_themes = config.source_dir.join(SOURCE_THEMES_DIR);
        if source_themes.is_dir() {
            catalog.add_search_path(source_themes);
        }
        for path in &config.theme_paths {
            catalog.add_search_path(path.clone());
        }
        catalog.discover();
        catalog.resolve_chain(ctx.theme_name())
    }

    fn layout_source(chain: &[ThemeDefinition]) -> Result<String> {
        // The most derived theme providing a layout wins.
        for theme in chain.iter().rev() {
            if let Some(dir) = &theme.templates_dir {
                let path = dir.join(LAYOUT_TEMPLATE);
                if path.is_file() {
                    debug!("Using layout {}", path.display());
                    return std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read layout: {}", path.display()));
                }
            }
        }
        Ok(DEFAULT_LAYOUT.to_string())
    }

    fn discover_sources(ctx: &RenderContext) -> Result<Vec<PathBuf>> {
        let config = ctx.config();
        let matcher = SourceMatcher::documents(&config.exclude_patterns)
            .context("Invalid exclude pattern")?;
        let skip = [
            config.output_dir.clone(),
            ctx.output_dir().to_path_buf(),
            ctx.cache_dir().to_path_buf(),
        ];
        matcher
            .matching_files(&config.source_dir, &skip)
            .with_context(|| {
                format!(
                    "Failed to scan source directory: {}",
                    config.source_dir.display()
                )
            })
    }

    /// Everything besides the page source that changes a page's body.
    fn pass_fingerprint(ctx: &RenderContext) -> Result<String> {
        let themes = serde_json::to_string(&ctx.themes())?;
        Ok(format!(
            "{}|{}|{}|{}",
            env!("CARGO_PKG_VERSION"),
            ctx.theme_name(),
            ctx.active_index(),
            themes
        ))
    }

    fn render_body(&self, source: &str, document_id: &str, ctx: &RenderContext) -> (Option<String>, String) {
        let expanded = self.directives.expand(source, document_id, ctx);
        let parser = Parser::new_ext(&expanded, Options::all());

        let mut title: Option<String> = None;
        let mut in_title = false;
        let events: Vec<Event<'_>> = parser
            .inspect(|event| match event {
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) if title.is_none() => in_title = true,
                Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_title => {
                    in_title = false;
                    title.get_or_insert_with(String::new);
                }
                Event::Text(text) | Event::Code(text) if in_title => {
                    title.get_or_insert_with(String::new).push_str(text);
                }
                _ => {}
            })
            .collect();

        let mut body = String::with_capacity(expanded.len() * 2);
        html::push_html(&mut body, events.into_iter());
        (title, body)
    }

    fn process_page(
        &self,
        ctx: &RenderContext,
        env: &Environment<'_>,
        stylesheets: &[String],
        pass_fingerprint: &str,
        relative: &Path,
    ) -> Result<PageOutcome> {
        let config = ctx.config();
        let source_path = config.source_dir.join(relative);
        let source = std::fs::read_to_string(&source_path)
            .with_context(|| format!("Failed to read source file: {}", source_path.display()))?;

        let document_id = matching::normalize_path(&relative.with_extension("html"));
        let mut hasher = blake3::Hasher::new();
        hasher.update(pass_fingerprint.as_bytes());
        hasher.update(source.as_bytes());
        let fingerprint = hasher.finalize().to_hex().to_string();

        let cache_path = ctx
            .cache_dir()
            .join("pages")
            .join(relative.with_extension("json"));
        let cached = std::fs::read_to_string(&cache_path)
            .ok()
            .and_then(|content| serde_json::from_str::<CachedPage>(&content).ok())
            .filter(|page| page.fingerprint == fingerprint);

        let (page, cache_hit) = match cached {
            Some(page) => {
                debug!("Using cached version of {}", relative.display());
                (page, true)
            }
            None => {
                let (title, body_html) = self.render_body(&source, &document_id, ctx);
                let page = CachedPage {
                    fingerprint,
                    title,
                    body_html,
                };
                write_file(&cache_path, &serde_json::to_string(&page)?)?;
                (page, false)
            }
        };

        let depth = document_id.matches('/').count();
        let fallback_title = relative
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rendered = env
            .get_template(LAYOUT_TEMPLATE)?
            .render(context! {
                title => page.title.as_deref().unwrap_or(&fallback_title),
                body => &page.body_html,
                project => &config.project,
                language => &config.language,
                theme => ctx.theme_name(),
                html_context => &config.html_context,
                static_prefix => Value::from_safe_string(format!("{}{}/", "../".repeat(depth), STATIC_DIR)),
                stylesheets => stylesheets
                    .iter()
                    .cloned()
                    .map(Value::from_safe_string)
                    .collect::<Vec<_>>(),
                pagename => &document_id,
            })
            .with_context(|| format!("Failed to render page: {}", document_id))?;

        write_file(&ctx.output_dir().join(&document_id), &rendered)?;
        Ok(PageOutcome { cache_hit })
    }

    fn copy_static_assets(ctx: &RenderContext, chain: &[ThemeDefinition]) -> Result<()> {
        let static_output_dir = ctx.output_dir().join(STATIC_DIR);
        std::fs::create_dir_all(&static_output_dir).with_context(|| {
            format!(
                "Failed to create static output directory: {}",
                static_output_dir.display()
            )
        })?;

        // Base themes first so derived themes override their files.
        for theme in chain {
            if theme.generated {
                let path = static_output_dir.join(format!("{}.css", theme.name));
                write_file(&path, &theme.generated_stylesheet())?;
            } else if let Some(dir) = &theme.static_dir {
                debug!("Copying theme static assets from {}", dir.display());
                copy_dir_recursive(dir, &static_output_dir)?;
            }
        }
        Ok(())
    }
}

impl DocumentCompiler for SiteBuilder {
    fn compile(&mut self, ctx: &RenderContext) -> Result<()> {
        let start_time = Instant::now();
        let config = ctx.config();
        info!(
            "Building theme '{}' into {}",
            ctx.theme_name(),
            ctx.output_dir().display()
        );

        std::fs::create_dir_all(ctx.output_dir()).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                ctx.output_dir().display()
            )
        })?;

        let chain = Self::theme_chain(ctx)?;
        let stylesheets: Vec<String> = chain
            .iter()
            .flat_map(|theme| theme.stylesheets.iter().cloned())
            .collect();
        let layout = Self::layout_source(&chain)?;
        let mut env = Environment::new();
        env.add_template(LAYOUT_TEMPLATE, &layout)
            .context("Invalid page layout")?;

        let sources = Self::discover_sources(ctx)?;
        info!("Discovered {} source files", sources.len());
        let pass_fingerprint = Self::pass_fingerprint(ctx)?;

        let parallel_jobs = config.parallel_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });
        // Created per pass: worker threads must not exist when a replica is forked.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel_jobs)
            .build()?;
        let outcomes: Vec<PageOutcome> = pool.install(|| {
            sources
                .par_iter()
                .map(|relative| {
                    self.process_page(ctx, &env, &stylesheets, &pass_fingerprint, relative)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        drop(pool);

        Self::copy_static_assets(ctx, &chain)?;

        let stats = BuildStats {
            pages_written: outcomes.len(),
            cache_hits: outcomes.iter().filter(|o| o.cache_hit).count(),
            build_time: start_time.elapsed(),
        };
        info!(
            "Theme '{}': {} pages ({} cached) in {:?}",
            ctx.theme_name(),
            stats.pages_written,
            stats.cache_hits,
            stats.build_time
        );
        self.last_stats = Some(stats);
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, ThemeValue};
    use crate::paths::OutputPaths;
    use crate::theme::ThemeRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn project(temp_dir: &TempDir) -> BuildConfig {
        let source = temp_dir.path().join("docs");
        fs::create_dir_all(source.join("guide")).unwrap();
        fs::write(
            source.join("index.md"),
            "# Welcome\n\n.. multi-theme-list::\n\nSee the *guide*.\n",
        )
        .unwrap();
        fs::write(source.join("guide/install.md"), "# Install `tool`\n\nSteps.\n").unwrap();
        BuildConfig {
            project: "Demo".to_string(),
            source_dir: source,
            output_dir: temp_dir.path().join("out"),
            html_theme: ThemeValue::Name("classic".to_string()),
            parallel_jobs: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_theme_build() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);
        let ctx = RenderContext::single(config.clone());

        let mut builder = SiteBuilder::new();
        builder.compile(&ctx).unwrap();

        let index = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert!(index.contains("<title>Welcome | Demo</title>"));
        assert!(index.contains("href=\"_static/classic.css\""));
        assert!(index.contains("<em>guide</em>"));
        // no theme list configured: the directive renders nothing
        assert!(!index.contains("multi-theme-list"));

        let install = fs::read_to_string(config.output_dir.join("guide/install.html")).unwrap();
        assert!(install.contains("<title>Install tool | Demo</title>"));
        assert!(install.contains("href=\"../_static/classic.css\""));

        assert!(config.output_dir.join("_static/classic.css").is_file());
        assert_eq!(builder.last_stats().unwrap().pages_written, 2);
    }

    #[test]
    fn test_rebuild_uses_cache() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);
        let ctx = RenderContext::single(config.clone());

        let mut builder = SiteBuilder::new();
        builder.compile(&ctx).unwrap();
        assert_eq!(builder.last_stats().unwrap().cache_hits, 0);
        builder.compile(&ctx).unwrap();
        assert_eq!(builder.last_stats().unwrap().cache_hits, 2);

        fs::write(config.source_dir.join("index.md"), "# Changed\n").unwrap();
        builder.compile(&ctx).unwrap();
        assert_eq!(builder.last_stats().unwrap().cache_hits, 1);
    }

    #[test]
    fn test_secondary_pass_links_and_assets() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);
        let mut themes = ThemeRegistry::new(["classic", "alabaster"]).unwrap();
        themes.set_active(1).unwrap();
        let out = config.output_dir.join("theme_alabaster");
        let ctx = RenderContext::for_theme(
            BuildConfig {
                html_theme: ThemeValue::Name("alabaster".to_string()),
                ..config.clone()
            },
            themes,
            OutputPaths::new(&out, out.join(".doctrees")),
            true,
        );

        SiteBuilder::new().compile(&ctx).unwrap();

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("href=\"../index.html\""));
        assert!(index.contains("href=\"_static/alabaster.css\""));
        assert!(out.join("_static/alabaster.css").is_file());
        assert!(out.join(".doctrees/pages/index.json").is_file());
        assert!(!config.output_dir.join("index.html").exists());
    }

    #[test]
    fn test_theme_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = project(&temp_dir);
        let theme_dir = config.source_dir.join("_themes/fancy");
        fs::create_dir_all(theme_dir.join("static/css")).unwrap();
        fs::create_dir_all(theme_dir.join("templates")).unwrap();
        fs::write(
            theme_dir.join("theme.toml"),
            "[theme]\nname = \"fancy\"\nstylesheets = [\"css/fancy.css\"]\n",
        )
        .unwrap();
        fs::write(theme_dir.join("static/css/fancy.css"), "body {}").unwrap();
        fs::write(
            theme_dir.join("templates/layout.html"),
            "<html><link href=\"{{ static_prefix }}{{ stylesheets[0] }}\">{{ body|safe }}</html>",
        )
        .unwrap();
        config.html_theme = ThemeValue::Name("fancy".to_string());

        SiteBuilder::new()
            .compile(&RenderContext::single(config.clone()))
            .unwrap();

        let index = fs::read_to_string(config.output_dir.join("index.html")).unwrap();
        assert!(index.starts_with("<html><link href=\"_static/css/fancy.css\">"));
        assert!(config.output_dir.join("_static/css/fancy.css").is_file());
        // theme sources are not documents
        assert!(!config.output_dir.join("_themes").exists());
    }
}
