//! Block directives embedded in source pages.
//!
//! A directive is a line of the form `.. name::` outside fenced code blocks.
//! Expansion replaces the line with the directive's HTML, kept apart from the
//! surrounding Markdown by blank lines so it passes through as a raw block.

use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;

use crate::context::RenderContext;
use crate::navigation;

lazy_static::lazy_static! {
    static ref DIRECTIVE_LINE: Regex =
        Regex::new(r"^\s*\.\.\s+([\w-]+)::\s*(.*?)\s*$").expect("directive pattern is valid");
}

/// One directive occurrence in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveCall<'a> {
    pub name: &'a str,
    pub argument: &'a str,
    /// Output-relative URI of the page, e.g. `guide/install.html`
    pub document_id: &'a str,
    /// 1-based
    pub line: usize,
}

impl DirectiveCall<'_> {
    /// Directories between the page and its tree's root.
    pub fn depth(&self) -> usize {
        self.document_id.matches('/').count()
    }
}

pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    /// HTML for one occurrence; `None` renders nothing.
    fn run(&self, call: &DirectiveCall<'_>, ctx: &RenderContext) -> Option<String>;
}

/// Navigation links to the current page under every theme.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiThemeListDirective;

impl MultiThemeListDirective {
    pub const NAME: &'static str = "multi-theme-list";
}

impl Directive for MultiThemeListDirective {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, call: &DirectiveCall<'_>, ctx: &RenderContext) -> Option<String> {
        if !call.argument.is_empty() {
            warn!(
                "{}:{}: {} takes no arguments, ignoring '{}'",
                call.document_id,
                call.line,
                Self::NAME,
                call.argument
            );
        }

        let Some(themes) = ctx.themes() else {
            warn!(
                "{}:{}: {} used without a theme list in html_theme",
                call.document_id,
                call.line,
                Self::NAME
            );
            return None;
        };

        let links = navigation::generate_links(
            themes.themes(),
            call.document_id,
            themes.active().is_primary(),
        );
        if links.is_empty() {
            return None;
        }
        Some(navigation::render_links(&links, call.depth()))
    }
}

/// Directives known to the compiler, by name.
#[derive(Default)]
pub struct DirectiveRegistry {
    directives: HashMap<String, Box<dyn Directive>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_directives() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MultiThemeListDirective));
        registry
    }

    pub fn register(&mut self, directive: Box<dyn Directive>) {
        self.directives
            .insert(directive.name().to_string(), directive);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Directive> {
        self.directives.get(name).map(|d| d.as_ref())
    }

    /// Replace directive lines in `source` by their output.
    ///
    /// Unknown directives are logged and dropped.
    pub fn expand(&self, source: &str, document_id: &str, ctx: &RenderContext) -> String {
        let mut out = String::with_capacity(source.len());
        let mut fence: Option<&str> = None;

        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();
            if let Some(marker) = fence {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            } else if trimmed.starts_with("```") {
                fence = Some("```");
            } else if trimmed.starts_with("~~~") {
                fence = Some("~~~");
            } else if let Some(caps) = DIRECTIVE_LINE.captures(line) {
                let call = DirectiveCall {
                    name: caps.get(1).map_or("", |m| m.as_str()),
                    argument: caps.get(2).map_or("", |m| m.as_str()),
                    document_id,
                    line: index + 1,
                };
                match self.get(call.name) {
                    Some(directive) => {
                        if let Some(html) = directive.run(&call, ctx) {
                            out.push('\n');
                            out.push_str(&html);
                            out.push('\n');
                        }
                    }
                    None => debug!(
                        "{}:{}: unknown directive '{}'",
                        document_id, call.line, call.name
                    ),
                }
                continue;
            }

            out.push_str(line);
            out.push('\n');
        }

        out
    }
}
