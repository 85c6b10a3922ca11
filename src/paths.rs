//! Output and cache directory remapping for secondary theme passes.
//!
//! Each secondary theme renders into `<output>/<subdir>` and must get a cache
//! directory no other pass reads or writes.

use log::info;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Output and cache directories of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }
}

/// Compute the cache directory for a remapped output directory.
///
/// A cache nested anywhere under `old_output_dir` keeps its relative position
/// under `new_output_dir`. A cache outside of it gets the path of
/// `new_output_dir` below `old_output_dir` appended, so nested subdirs with
/// the same last component still get separate caches. Returns the new directory and whether the
/// cache lives outside the output tree.
pub fn determine_new_cache_dir(
    old_cache_dir: &Path,
    old_output_dir: &Path,
    new_output_dir: &Path,
) -> (PathBuf, bool) {
    if let Ok(relative) = old_cache_dir.strip_prefix(old_output_dir) {
        return (new_output_dir.join(relative), false);
    }

    let subdir = match new_output_dir.strip_prefix(old_output_dir) {
        Ok(subdir) => Some(subdir),
        Err(_) => new_output_dir.file_name().map(Path::new),
    };
    let new_cache_dir = match subdir {
        Some(subdir) => old_cache_dir.join(subdir),
        None => old_cache_dir.to_path_buf(),
    };
    (new_cache_dir, true)
}

/// Point a pass at `<output>/<subdir>` and its own cache directory.
///
/// Creates the new output directory if needed.
pub fn remap(paths: &OutputPaths, subdir: &str) -> io::Result<OutputPaths> {
    let output_dir = paths.output_dir.join(subdir);
    std::fs::create_dir_all(&output_dir)?;
    let (cache_dir, is_external) =
        determine_new_cache_dir(&paths.cache_dir, &paths.output_dir, &output_dir);

    let (old_out, new_out) = relative_pair(&paths.output_dir, &output_dir);
    info!(">>> Changing output dir from {} to {}", old_out, new_out);
    let (old_cache, new_cache) = relative_pair(&paths.cache_dir, &cache_dir);
    info!(
        ">>> Changing cache dir from {} to {}{}",
        old_cache,
        new_cache,
        if is_external { " (outside output dir)" } else { "" }
    );

    Ok(OutputPaths {
        output_dir,
        cache_dir,
    })
}

/// Deepest directory containing both paths.
pub fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

/// Render two paths relative to their common ancestor's parent, so the shared
/// directory name stays visible in logs.
fn relative_pair(old: &Path, new: &Path) -> (String, String) {
    let ancestor = common_ancestor(old, new);
    let base = match ancestor.components().next_back() {
        Some(Component::Normal(_)) => ancestor.parent().map(Path::to_path_buf),
        _ => None,
    };
    let show = |path: &Path| match &base {
        Some(base) => pathdiff::diff_paths(path, base)
            .unwrap_or_else(|| path.to_path_buf())
            .display()
            .to_string(),
        None => path.display().to_string(),
    };
    (show(old), show(new))
}
