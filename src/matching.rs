//! Glob pattern matching for source discovery.
//!
//! Patterns use `/` as separator on every platform:
//! - `**` matches any files and zero or more directories
//! - `*` matches everything except a directory separator
//! - `?` matches any single character except a directory separator
//! - `[seq]` / `[!seq]` match a character in / not in seq

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Source files picked up by default.
pub const DEFAULT_INCLUDE: &[&str] = &["**.md"];

/// Never treated as sources.
pub const DEFAULT_EXCLUDE: &[&str] = &["_build/**", "_themes/**", ".*/**", "**/.*/**"];

/// Translate a glob pattern into an anchored regex.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::from("^");
    let mut i = 0;

    while i < n {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut k = i + 1;
                    if matches!(chars[k], '!' | '^') {
                        out.push('^');
                        k += 1;
                    }
                    for &ch in &chars[k..end] {
                        if ch == '\\' || ch == '[' {
                            out.push('\\');
                        }
                        out.push(ch);
                    }
                    out.push(']');
                    i = end + 1;
                }
                None => {
                    out.push_str("\\[");
                    i += 1;
                }
            },
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

/// Compile a pattern, reusing earlier compilations.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&translate_pattern(pattern))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

pub fn pattern_match(name: &str, pattern: &str) -> Result<bool, regex::Error> {
    Ok(compile_pattern(pattern)?.is_match(name))
}

/// Path with `/` separators, for matching.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compiled include and exclude patterns.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl SourceMatcher {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[S]| {
            patterns
                .iter()
                .map(|p| compile_pattern(p.as_ref()))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Default source patterns plus `extra_exclude`.
    pub fn documents(extra_exclude: &[String]) -> Result<Self, regex::Error> {
        let exclude: Vec<String> = DEFAULT_EXCLUDE
            .iter()
            .map(|p| p.to_string())
            .chain(extra_exclude.iter().cloned())
            .collect();
        let include: Vec<String> = DEFAULT_INCLUDE.iter().map(|p| p.to_string()).collect();
        Self::new(&include, &exclude)
    }

    /// Whether a path relative to the source root is selected.
    /// Exclusions take priority over inclusions.
    pub fn is_match(&self, relative: &Path) -> bool {
        let name = normalize_path(relative);
        self.include.iter().any(|r| r.is_match(&name))
            && !self.exclude.iter().any(|r| r.is_match(&name))
    }

    /// Matching files under `root`, relative to it and sorted.
    ///
    /// Directories in `skip` (typically the output directory when it lives
    /// inside the source tree) are not descended into.
    pub fn matching_files(&self, root: &Path, skip: &[PathBuf]) -> walkdir::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !skip.iter().any(|dir| entry.path() == dir.as_path()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                if self.is_match(relative) {
                    files.push(relative.to_path_buf());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("*.md"), "^[^/]*\\.md$");
        assert_eq!(translate_pattern("**"), "^.*$");
        assert_eq!(translate_pattern("**/index.md"), "^(?:[^/]+/)*index\\.md$");
        assert_eq!(translate_pattern("[!abc].md"), "^[^abc]\\.md$");
        assert_eq!(translate_pattern("a[b"), "^a\\[b$");
    }

    #[test]
    fn test_pattern_match() {
        assert!(pattern_match("index.md", "*.md").unwrap());
        assert!(pattern_match("guide/install.md", "**.md").unwrap());
        assert!(pattern_match("guide/install.md", "**/*.md").unwrap());
        assert!(!pattern_match("guide/install.md", "*.md").unwrap());
        assert!(pattern_match("_build/html/index.md", "_build/**").unwrap());
        assert!(pattern_match("a.md", "[abc].md").unwrap());
        assert!(!pattern_match("d.md", "[abc].md").unwrap());
    }

    #[test]
    fn test_default_excludes_hidden_and_build_dirs() {
        let matcher = SourceMatcher::documents(&["drafts/**".to_string()]).unwrap();
        assert!(matcher.is_match(Path::new("index.md")));
        assert!(matcher.is_match(Path::new("guide/install.md")));
        assert!(!matcher.is_match(Path::new("_build/index.md")));
        assert!(!matcher.is_match(Path::new(".git/notes.md")));
        assert!(!matcher.is_match(Path::new("guide/.cache/page.md")));
        assert!(!matcher.is_match(Path::new("drafts/wip.md")));
        assert!(!matcher.is_match(Path::new("conf.toml")));
    }

    #[test]
    fn test_matching_files_skips_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("guide")).unwrap();
        fs::create_dir_all(root.join("out")).unwrap();
        fs::write(root.join("index.md"), "# Index").unwrap();
        fs::write(root.join("guide/install.md"), "# Install").unwrap();
        fs::write(root.join("out/stale.md"), "# Stale").unwrap();
        fs::write(root.join("notes.txt"), "not a source").unwrap();

        let matcher = SourceMatcher::documents(&[]).unwrap();
        let files = matcher.matching_files(root, &[root.join("out")]).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("guide/install.md"), PathBuf::from("index.md")]
        );
    }
}
