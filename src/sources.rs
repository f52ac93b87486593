//! Input expansion - Turns file and directory arguments into source files
//!
//! Directories are walked recursively; a file is kept when some registered
//! event source handles its extension and no ignore rule matches it.
//! Explicitly named files are always kept. The result is sorted.

use crate::error::ToolError;
use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        let defaults = ["target/", ".git/", "node_modules/", ".vscode/", ".idea/"];
        for pattern in defaults {
            builder.add_line(None, pattern).ok();
        }

        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                warn!("Ignoring invalid exclude pattern {}: {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched_path_or_any_parents(path, is_dir).is_ignore()
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn walk_directory(root: &Path, exclude: &[String], extensions: &[&str]) -> Vec<PathBuf> {
    let filter = IgnoreFilter::new(root, exclude);
    let mut files = Vec::new();

    for entry in WalkBuilder::new(root).standard_filters(false).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        if !is_file || !has_extension(entry.path(), extensions) {
            continue;
        }
        if filter.is_ignored(entry.path(), false) {
            debug!("Excluded {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }
    files
}

/// Expand inputs into a sorted, de-duplicated file list
pub fn expand_inputs(inputs: &[PathBuf], exclude: &[String], extensions: &[&str]) -> Result<Vec<PathBuf>, ToolError> {
    let mut files = Vec::new();
    for input in inputs {
        let metadata = std::fs::metadata(input).map_err(|e| ToolError::io(input, e))?;
        if metadata.is_dir() {
            files.extend(walk_directory(input, exclude, extensions));
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    debug!("Expanded {} inputs into {} files", inputs.len(), files.len());
    Ok(files)
}
