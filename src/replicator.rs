//! Process replication for secondary theme passes.
//!
//! Every secondary theme renders in its own process replica so that no global
//! state (parsed configuration, loaded theme assets, in-memory caches) leaks
//! between theme variants. Replicas run strictly one after another: the
//! original process blocks on each replica before starting the next, and any
//! failure aborts the whole run. The primary theme is rendered afterwards by
//! the caller, in the original process, with unmodified paths.
//!
//! There is no timeout: a replica that never terminates blocks the run.

use log::error;
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use crate::context::RenderContext;
use crate::error::{MultiThemeError, Result};
use crate::events::LifecycleObserver;
use crate::paths::{self, OutputPaths};
use crate::theme::ThemeRegistry;

/// Environment variable carrying the theme index into spawned replicas.
pub const REPLICA_ENV_VAR: &str = "SPHINX_MULTI_THEME_REPLICA";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_PANIC: i32 = 101;

/// How a replica terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaExit {
    pub pid: u32,
    pub status: i32,
}

/// Creates an isolated copy of the current execution state and waits for it.
pub trait ReplicationPrimitive {
    /// Checked once before any replica is attempted.
    fn is_supported(&self) -> bool {
        true
    }

    /// Run `pass` in a replica for theme `index`, block until the replica
    /// terminates and report its status.
    fn replicate(&mut self, index: usize, pass: &mut dyn FnMut() -> i32) -> Result<ReplicaExit>;
}

/// One render pass, as seen by the orchestrator.
pub trait RenderPass {
    /// Build the immutable context for a pass over `themes` (active theme set)
    /// writing to `paths`.
    fn context(&self, themes: ThemeRegistry, paths: OutputPaths) -> RenderContext;

    /// Render the pass to completion.
    fn render(&mut self, ctx: &RenderContext) -> anyhow::Result<()>;
}

/// `fork()` based replication with copy-on-write process images.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct ForkReplication {
    fork: fn() -> libc::pid_t,
}

#[cfg(unix)]
impl Default for ForkReplication {
    fn default() -> Self {
        Self { fork: sys_fork }
    }
}

#[cfg(unix)]
fn sys_fork() -> libc::pid_t {
    // SAFETY: the orchestrator forks before the compiler starts any worker
    // threads; the child only runs the pass and then calls _exit.
    unsafe { libc::fork() }
}

#[cfg(unix)]
impl ForkReplication {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different fork implementation, e.g. one that always fails.
    pub fn with_fork_fn(fork: fn() -> libc::pid_t) -> Self {
        Self { fork }
    }
}

#[cfg(unix)]
impl ReplicationPrimitive for ForkReplication {
    fn replicate(&mut self, _index: usize, pass: &mut dyn FnMut() -> i32) -> Result<ReplicaExit> {
        let pid = (self.fork)();
        if pid < 0 {
            return Err(MultiThemeError::ForkFailed {
                code: pid,
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        if pid == 0 {
            let status = run_guarded(pass);
            terminate_replica(status);
        }
        wait_for(pid)
    }
}

/// Flush logs and leave the replica without unwinding into the caller.
#[cfg(unix)]
fn terminate_replica(status: i32) -> ! {
    use std::io::Write;

    log::logger().flush();
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    // SAFETY: _exit skips destructors and atexit handlers owned by the
    // original process and never returns.
    unsafe { libc::_exit(status) }
}

#[cfg(unix)]
fn wait_for(pid: libc::pid_t) -> Result<ReplicaExit> {
    let mut raw: libc::c_int = 0;
    loop {
        // SAFETY: `raw` is a valid out-pointer for the duration of the call.
        let rc = unsafe { libc::waitpid(pid, &mut raw, 0) };
        if rc == pid {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            continue;
        }
        return Err(MultiThemeError::ReplicaWaitFailed {
            pid: pid as u32,
            reason: err.to_string(),
        });
    }

    let status = if libc::WIFEXITED(raw) {
        libc::WEXITSTATUS(raw)
    } else if libc::WIFSIGNALED(raw) {
        128 + libc::WTERMSIG(raw)
    } else {
        EXIT_FAILURE
    };
    Ok(ReplicaExit {
        pid: pid as u32,
        status,
    })
}

/// Re-executes a program with [`REPLICA_ENV_VAR`] set to the theme index.
///
/// The child rebuilds its configuration from the same arguments, so no
/// copy-on-write support is needed.
#[derive(Debug, Clone)]
pub struct SpawnReplication {
    program: PathBuf,
    args: Vec<OsString>,
}

impl SpawnReplication {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-run the current executable with the current arguments.
    pub fn current_process() -> std::io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            std::env::args_os().skip(1).collect(),
        ))
    }
}

impl ReplicationPrimitive for SpawnReplication {
    fn replicate(&mut self, index: usize, _pass: &mut dyn FnMut() -> i32) -> Result<ReplicaExit> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(REPLICA_ENV_VAR, index.to_string())
            .spawn()
            .map_err(|e| MultiThemeError::ForkFailed {
                code: e.raw_os_error().unwrap_or(-1),
                reason: e.to_string(),
            })?;
        let pid = child.id();
        let status = child
            .wait()
            .map_err(|e| MultiThemeError::ReplicaWaitFailed {
                pid,
                reason: e.to_string(),
            })?;
        Ok(ReplicaExit {
            pid,
            status: exit_code(status),
        })
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    EXIT_FAILURE
}

/// Runs each pass inside the current process.
///
/// Only isolating when passes share no global state, which holds for passes
/// that work purely from their [`RenderContext`]. Replica ids are synthetic.
#[derive(Debug, Default)]
pub struct InlineReplication {
    next_pid: u32,
}

impl InlineReplication {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicationPrimitive for InlineReplication {
    fn replicate(&mut self, _index: usize, pass: &mut dyn FnMut() -> i32) -> Result<ReplicaExit> {
        self.next_pid += 1;
        Ok(ReplicaExit {
            pid: self.next_pid,
            status: run_guarded(pass),
        })
    }
}

/// Platforms (or configurations) without process replication.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedReplication;

impl ReplicationPrimitive for UnsupportedReplication {
    fn is_supported(&self) -> bool {
        false
    }

    fn replicate(&mut self, _index: usize, _pass: &mut dyn FnMut() -> i32) -> Result<ReplicaExit> {
        Err(MultiThemeError::UnsupportedPlatform)
    }
}

/// The primitive `fork` resolves to on this platform.
pub fn native_replication() -> Box<dyn ReplicationPrimitive> {
    #[cfg(unix)]
    {
        Box::new(ForkReplication::new())
    }
    #[cfg(not(unix))]
    {
        Box::new(UnsupportedReplication)
    }
}

fn run_guarded(pass: &mut dyn FnMut() -> i32) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(status) => status,
        Err(_) => {
            error!("Render pass panicked");
            EXIT_PANIC
        }
    }
}

/// Drives secondary theme passes through a [`ReplicationPrimitive`].
pub struct ProcessReplicator {
    primitive: Box<dyn ReplicationPrimitive>,
}

impl ProcessReplicator {
    pub fn new(primitive: Box<dyn ReplicationPrimitive>) -> Self {
        Self { primitive }
    }

    /// Render every secondary theme in its own replica, in registry order.
    ///
    /// Without replication support all secondary themes are dropped from
    /// `registry` with a warning. Returns once the caller may render the
    /// primary theme.
    pub fn orchestrate(
        &mut self,
        registry: &mut ThemeRegistry,
        base: &OutputPaths,
        pass: &mut dyn RenderPass,
        observer: &mut dyn LifecycleObserver,
    ) -> Result<()> {
        if registry.len() < 2 {
            return Ok(());
        }

        if !self.primitive.is_supported() {
            let dropped = registry.truncate();
            observer.secondaries_dropped(registry.primary(), &dropped);
            return Ok(());
        }

        let secondaries: Vec<(usize, String)> = registry
            .secondaries()
            .map(|(index, theme)| (index, theme.subdir.clone()))
            .collect();
        observer.entering_multi_theme(secondaries.len());

        for (index, subdir) in secondaries {
            let exit = {
                let snapshot: &ThemeRegistry = registry;
                let mut replica =
                    || run_replica(snapshot, index, base, &mut *pass, &mut *observer);
                self.primitive.replicate(index, &mut replica)?
            };
            observer.replica_exited(&subdir, &exit);
            if exit.status != EXIT_SUCCESS {
                return Err(MultiThemeError::ChildBuildFailed {
                    pid: exit.pid,
                    status: exit.status,
                });
            }
        }

        observer.exiting_multi_theme();
        Ok(())
    }
}

/// The work done inside a replica: activate theme `index`, remap paths,
/// render, and report the exit status.
pub fn run_replica(
    registry: &ThemeRegistry,
    index: usize,
    base: &OutputPaths,
    pass: &mut dyn RenderPass,
    observer: &mut dyn LifecycleObserver,
) -> i32 {
    let mut themes = registry.clone();
    if let Err(e) = themes.set_active(index) {
        error!("Cannot start replica: {}", e);
        return EXIT_FAILURE;
    }

    let subdir = themes.active().subdir.clone();
    let paths = match paths::remap(base, &subdir) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Failed to prepare output directory for {}: {}", subdir, e);
            return EXIT_FAILURE;
        }
    };

    let ctx = pass.context(themes, paths);
    observer.replica_started(&ctx);
    let status = match pass.render(&ctx) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("Build for theme '{}' failed: {:#}", ctx.theme_name(), e);
            EXIT_FAILURE
        }
    };
    observer.replica_about_to_exit(&ctx, status);
    status
}

/// Theme index requested of this process through [`REPLICA_ENV_VAR`].
pub fn replica_index_from_env() -> Option<usize> {
    std::env::var(REPLICA_ENV_VAR).ok()?.parse().ok()
}
