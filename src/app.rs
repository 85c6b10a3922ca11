//! Multi-theme build driver.
//!
//! Runs the lifecycle end to end: resolve the configured themes, render every
//! secondary theme in a replica, render the primary theme last in this process
//! with unmodified paths, then report the output tree.

use anyhow::{Context, Result};
use log::{error, info};

use crate::builder::DocumentCompiler;
use crate::config::{BuildConfig, ReplicationStrategy};
use crate::context::RenderContext;
use crate::events::{LifecycleObserver, LogObserver};
use crate::hooks::BuildLifecycleHooks;
use crate::paths::OutputPaths;
use crate::replicator::{
    self, native_replication, ProcessReplicator, RenderPass, ReplicationPrimitive,
    SpawnReplication, UnsupportedReplication, EXIT_FAILURE,
};
use crate::theme::ThemeRegistry;

/// Primitive selected by a replication strategy.
pub fn replication_primitive(
    strategy: ReplicationStrategy,
) -> Result<Box<dyn ReplicationPrimitive>> {
    let spawn = || -> Result<Box<dyn ReplicationPrimitive>> {
        Ok(Box::new(
            SpawnReplication::current_process()
                .context("Failed to locate the current executable")?,
        ))
    };
    match strategy {
        ReplicationStrategy::Auto if cfg!(unix) => Ok(native_replication()),
        ReplicationStrategy::Auto => spawn(),
        ReplicationStrategy::Fork => Ok(native_replication()),
        ReplicationStrategy::Spawn => spawn(),
        ReplicationStrategy::Disabled => Ok(Box::new(UnsupportedReplication)),
    }
}

/// Adapts a [`DocumentCompiler`] to the orchestrator's view of a pass.
struct ThemePass<'a, C> {
    config: &'a BuildConfig,
    hooks: &'a BuildLifecycleHooks,
    compiler: &'a mut C,
    is_replica: bool,
}

impl<C: DocumentCompiler> RenderPass for ThemePass<'_, C> {
    fn context(&self, themes: ThemeRegistry, paths: OutputPaths) -> RenderContext {
        let config = self.hooks.active_config(self.config, &themes);
        RenderContext::for_theme(config, themes, paths, self.is_replica)
    }

    fn render(&mut self, ctx: &RenderContext) -> Result<()> {
        self.compiler.compile(ctx)
    }
}

pub struct MultiThemeBuild<C> {
    config: BuildConfig,
    hooks: BuildLifecycleHooks,
    compiler: C,
    observer: Box<dyn LifecycleObserver>,
    primitive: Option<Box<dyn ReplicationPrimitive>>,
}

impl<C: DocumentCompiler> MultiThemeBuild<C> {
    pub fn new(config: BuildConfig, compiler: C) -> Self {
        let hooks = BuildLifecycleHooks::new(&config);
        Self {
            config,
            hooks,
            compiler,
            observer: Box::new(LogObserver),
            primitive: None,
        }
    }

    /// Replace the primitive chosen from `config.replication`.
    pub fn with_primitive(mut self, primitive: Box<dyn ReplicationPrimitive>) -> Self {
        self.primitive = Some(primitive);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn LifecycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Run the whole build. The output-tree report never changes the result.
    pub fn run(&mut self) -> Result<()> {
        let result = self.execute();
        self.hooks
            .build_finished(&self.config.output_dir, result.as_ref().err());
        result
    }

    fn execute(&mut self) -> Result<()> {
        let Some(mut registry) = self.hooks.config_resolved(&self.config)? else {
            let ctx = RenderContext::single(self.config.clone());
            return self
                .compiler
                .compile(&ctx)
                .with_context(|| format!("Build for theme '{}' failed", ctx.theme_name()));
        };

        let base = self.config.output_paths();
        let primitive = match self.primitive.take() {
            Some(primitive) => primitive,
            None => replication_primitive(self.config.replication)?,
        };
        let mut replicator = ProcessReplicator::new(primitive);
        {
            let mut pass = ThemePass {
                config: &self.config,
                hooks: &self.hooks,
                compiler: &mut self.compiler,
                is_replica: true,
            };
            replicator.orchestrate(&mut registry, &base, &mut pass, self.observer.as_mut())?;
        }

        registry.set_active(0)?;
        let mut pass = ThemePass {
            config: &self.config,
            hooks: &self.hooks,
            compiler: &mut self.compiler,
            is_replica: false,
        };
        let ctx = pass.context(registry, base);
        info!("Building primary theme '{}'", ctx.theme_name());
        pass.render(&ctx)
            .with_context(|| format!("Build for theme '{}' failed", ctx.theme_name()))
    }

    /// Render only theme `index`, as a spawned replica does.
    ///
    /// Returns the replica's exit status.
    pub fn run_replica(&mut self, index: usize) -> i32 {
        let registry = match self.hooks.config_resolved(&self.config) {
            Ok(Some(registry)) => registry,
            Ok(None) => {
                error!("Replica {} started without a theme list", index);
                return EXIT_FAILURE;
            }
            Err(e) => {
                error!("Replica {} cannot build its theme list: {}", index, e);
                return EXIT_FAILURE;
            }
        };

        let base = self.config.output_paths();
        let mut pass = ThemePass {
            config: &self.config,
            hooks: &self.hooks,
            compiler: &mut self.compiler,
            is_replica: true,
        };
        replicator::run_replica(&registry, index, &base, &mut pass, self.observer.as_mut())
    }
}
