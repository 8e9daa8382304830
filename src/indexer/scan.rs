use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::reader::relative_key;

/// Directories skipped unless the configuration says otherwise.
pub fn default_excludes() -> Vec<String> {
    [
        ".git",
        "target",
        "node_modules",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "venv",
        "vendor",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Lists the files of a repository, `.gitignore` aware.
///
/// Bare names in the exclusion list (`node_modules`) match that path
/// component anywhere; anything containing `/` or a wildcard is used as a
/// glob against the repository-relative path.
#[derive(Debug, Clone)]
pub struct FileScanner {
    excludes: GlobSet,
    skipped: Vec<PathBuf>,
}

impl FileScanner {
    pub fn new(exclude: &[String]) -> Result<Self, globset::Error> {
        Ok(Self {
            excludes: build_globset(exclude)?,
            skipped: Vec::new(),
        })
    }

    /// Also leave out these exact files; they need not exist yet.
    #[must_use]
    pub fn with_skipped_files(mut self, files: &[PathBuf]) -> Self {
        self.skipped.extend(files.iter().map(|p| resolve(p)));
        self
    }

    /// Files under `root`, sorted by path.
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        let scanner = self.clone();
        let skipped = self.skipped_keys(root);
        let base = root.to_path_buf();

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let key = relative_key(&base, entry.path());
            !scanner.is_excluded(&key) && !skipped.contains(&key)
        });

        let mut files = Vec::new();
        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|t| t.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Failed to read entry: {e}"),
            }
        }
        files.sort();

        debug!("Found {} files under {}", files.len(), root.display());
        files
    }

    /// Whether a repository-relative path falls under an exclusion.
    pub fn is_excluded(&self, relative: &str) -> bool {
        self.excludes.is_match(relative)
    }

    /// Repository-relative keys of the skipped files that live under `root`.
    fn skipped_keys(&self, root: &Path) -> HashSet<String> {
        if self.skipped.is_empty() {
            return HashSet::new();
        }
        let Ok(root) = root.canonicalize() else {
            return HashSet::new();
        };
        self.skipped
            .iter()
            .filter(|p| p.starts_with(&root))
            .map(|p| relative_key(&root, p))
            .collect()
    }
}

/// Absolute path with the parent directory's symlinks resolved.
fn resolve(path: &Path) -> PathBuf {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (abs.parent(), abs.file_name()) {
        (Some(dir), Some(name)) => dir.canonicalize().map_or(abs.clone(), |d| d.join(name)),
        _ => abs,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern.is_empty() {
            continue;
        }
        if pattern.contains(['/', '*', '?', '[']) {
            builder.add(Glob::new(pattern)?);
            builder.add(Glob::new(&format!("{pattern}/**"))?);
        } else {
            builder.add(Glob::new(&format!("**/{pattern}"))?);
            builder.add(Glob::new(&format!("**/{pattern}/**"))?);
        }
    }
    builder.build()
}
