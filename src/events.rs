//! Lifecycle events emitted by multi-theme builds.
//!
//! `replica_started` and `replica_about_to_exit` fire inside the replica; with
//! fork or spawn replication an observer in the original process only sees the
//! remaining events.

use log::{info, warn};

use crate::context::RenderContext;
use crate::error::MultiThemeError;
use crate::replicator::ReplicaExit;
use crate::theme::Theme;

pub trait LifecycleObserver {
    /// Before the first secondary theme.
    fn entering_multi_theme(&mut self, _secondaries: usize) {}

    /// Inside the replica, after its paths were remapped.
    fn replica_started(&mut self, _ctx: &RenderContext) {}

    /// Inside the replica, right before it terminates.
    fn replica_about_to_exit(&mut self, _ctx: &RenderContext, _status: i32) {}

    /// In the original process, after the replica terminated.
    fn replica_exited(&mut self, _subdir: &str, _exit: &ReplicaExit) {}

    /// After the last secondary theme, before the primary theme renders.
    fn exiting_multi_theme(&mut self) {}

    /// Replication is unavailable; only `primary` will be built.
    fn secondaries_dropped(&mut self, _primary: &Theme, _dropped: &[Theme]) {}
}

/// Observer that logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LifecycleObserver for LogObserver {
    fn entering_multi_theme(&mut self, secondaries: usize) {
        info!(">>> Entering multi-theme build ({} secondary themes)", secondaries);
    }

    fn replica_started(&mut self, ctx: &RenderContext) {
        info!(
            ">>> Replica started for theme '{}' in {}",
            ctx.theme_name(),
            ctx.subdir()
        );
    }

    fn replica_about_to_exit(&mut self, ctx: &RenderContext, status: i32) {
        info!(
            ">>> Replica for theme '{}' exiting with status {}",
            ctx.theme_name(),
            status
        );
    }

    fn replica_exited(&mut self, subdir: &str, exit: &ReplicaExit) {
        info!(
            ">>> Replica {} for {} finished with status {}",
            exit.pid, subdir, exit.status
        );
    }

    fn exiting_multi_theme(&mut self) {
        info!(">>> Exiting multi-theme build");
    }

    fn secondaries_dropped(&mut self, primary: &Theme, dropped: &[Theme]) {
        let names: Vec<&str> = dropped.iter().map(|t| t.name.as_str()).collect();
        warn!(
            "{}; building only the primary theme '{}' and dropping: {}",
            MultiThemeError::UnsupportedPlatform,
            primary.name,
            names.join(", ")
        );
    }
}
