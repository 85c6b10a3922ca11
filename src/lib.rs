//! Sphinx Multi-Theme
//!
//! Renders one documentation source tree into several output trees, one per
//! theme. The primary theme owns the output root; every secondary theme is
//! rendered in an isolated process replica into its own subdirectory.

pub mod app;
pub mod builder;
pub mod config;
pub mod context;
pub mod directives;
pub mod error;
pub mod events;
pub mod hooks;
pub mod matching;
pub mod navigation;
pub mod paths;
pub mod replicator;
pub mod theme;

pub use app::MultiThemeBuild;
pub use builder::{DocumentCompiler, SiteBuilder};
pub use config::{BuildConfig, ReplicationStrategy, ThemeValue, TreeStyle};
pub use context::RenderContext;
pub use directives::{Directive, DirectiveRegistry, MultiThemeListDirective};
pub use error::MultiThemeError;
pub use events::{LifecycleObserver, LogObserver};
pub use hooks::BuildLifecycleHooks;
pub use navigation::{generate_links, render_links, ThemeLink};
pub use paths::{determine_new_cache_dir, OutputPaths};
pub use replicator::{ProcessReplicator, RenderPass, ReplicaExit, ReplicationPrimitive};
pub use theme::{Theme, ThemeRegistry, ThemeSpec};
