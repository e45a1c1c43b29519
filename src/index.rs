//! Recursive password store scanning and lookup.

use crate::error::{Result, StoreError};
use crate::utils;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Filename suffix marking an encrypted entry.
pub const ENTRY_EXTENSION: &str = ".gpg";

/// Snapshot of a password store directory tree.
///
/// Built wholesale by [`build_index`]; a refresh is a rebuild, never an
/// in-place mutation. Directory keys are relative paths joined with `/`
/// regardless of host OS.
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    /// Absolute path the index was built from.
    pub root_path: PathBuf,
    /// Entry names found directly under the root, extension stripped.
    pub root_entries: Vec<String>,
    /// Top-level directories that contain at least one entry, directly or
    /// transitively. Empty subtrees are pruned.
    pub directories: Vec<String>,
    /// Entry names directly inside each indexed directory.
    pub contents_by_path: HashMap<String, Vec<String>>,
    /// Immediate qualifying subdirectories of each indexed directory.
    pub subdirs_by_path: HashMap<String, Vec<String>>,
    /// Entry display name to absolute file path (extension included).
    /// Last-scanned wins on duplicate names; see `duplicate_names`.
    pub path_by_entry_name: HashMap<String, PathBuf>,
    /// Display names that mapped to more than one file during the scan.
    pub duplicate_names: Vec<String>,
}

impl StoreIndex {
    /// Resolve an entry display name to its absolute path.
    pub fn entry_path(&self, name: &str) -> Option<&PathBuf> {
        self.path_by_entry_name.get(name)
    }

    /// All entries as extension-stripped paths relative to the root,
    /// sorted for stable output.
    pub fn relative_entry_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.root_entries.clone();
        for (dir, entries) in &self.contents_by_path {
            for entry in entries {
                paths.push(format!("{dir}/{entry}"));
            }
        }
        paths.sort();
        paths
    }

    /// Case-insensitive substring search over relative entry paths.
    pub fn search(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.relative_entry_paths()
            .into_iter()
            .filter(|rel| rel.to_lowercase().contains(&q))
            .collect()
    }

    fn record_entry(&mut self, name: &str, path: PathBuf) {
        if let Some(previous) = self.path_by_entry_name.get(name) {
            if previous != &path && !self.duplicate_names.iter().any(|n| n == name) {
                self.duplicate_names.push(name.to_string());
            }
        }
        self.path_by_entry_name.insert(name.to_string(), path);
    }
}

/// Build an index of the password store rooted at `root_path`.
///
/// Fails only if the root itself cannot be listed. Unreadable subtrees are
/// skipped with a warning and the scan continues.
pub fn build_index(root_path: &Path) -> Result<StoreIndex> {
    let mut index = StoreIndex {
        root_path: root_path.to_path_buf(),
        ..Default::default()
    };

    let (files, dirs) = list_directory(root_path).map_err(|e| StoreError::RootUnreadable {
        path: root_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    for file in files {
        let path = root_path.join(format!("{file}{ENTRY_EXTENSION}"));
        index.root_entries.push(file.clone());
        index.record_entry(&file, path);
    }

    for dir in dirs {
        let dir_path = root_path.join(&dir);
        match scan_directory(&mut index, &dir_path, &dir) {
            Ok(true) => index.directories.push(dir),
            Ok(false) => {}
            Err(e) => {
                utils::warning(&format!("Skipping directory {}: {e}", dir_path.display()));
            }
        }
    }

    if !index.duplicate_names.is_empty() {
        utils::warning(&format!(
            "Duplicate entry names across directories: {} (last scanned wins)",
            index.duplicate_names.join(", ")
        ));
    }

    Ok(index)
}

/// Recursively scan one directory. Returns whether the directory qualifies
/// for the index, i.e. holds at least one entry directly or transitively.
/// Children are scanned before the parent decides inclusion.
fn scan_directory(index: &mut StoreIndex, dir_path: &Path, relative_path: &str) -> Result<bool> {
    let (files, dirs) = list_directory(dir_path)?;

    let mut subdirs = Vec::new();
    for dir in dirs {
        let subdir_path = dir_path.join(&dir);
        let subdir_relative = format!("{relative_path}/{dir}");
        match scan_directory(index, &subdir_path, &subdir_relative) {
            Ok(true) => subdirs.push(dir),
            Ok(false) => {}
            Err(e) => {
                utils::warning(&format!(
                    "Skipping subdirectory {}: {e}",
                    subdir_path.display()
                ));
            }
        }
    }

    if files.is_empty() && subdirs.is_empty() {
        return Ok(false);
    }

    for file in &files {
        let path = dir_path.join(format!("{file}{ENTRY_EXTENSION}"));
        index.record_entry(file, path);
    }

    index
        .contents_by_path
        .insert(relative_path.to_string(), files);
    index
        .subdirs_by_path
        .insert(relative_path.to_string(), subdirs);

    Ok(true)
}

/// List one directory, partitioned into entry names (extension stripped)
/// and subdirectory names, each sorted by file name so a given filesystem
/// state always enumerates the same way.
fn list_directory(path: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(name);
        } else if let Some(stripped) = name.strip_suffix(ENTRY_EXTENSION) {
            files.push(stripped.to_string());
        }
    }

    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

/// Search the tree for an entry by display name, without a prebuilt index.
/// Returns the first match in depth-first order, or `None`.
pub fn find_entry_path(root_path: &Path, entry_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(root_path).ok()?;

    let mut names: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));

    // Files at this level first, then recurse; mirrors the scan ordering.
    for (name, path) in &names {
        if path.is_file() {
            if let Some(stripped) = name.strip_suffix(ENTRY_EXTENSION) {
                if stripped == entry_name {
                    return Some(path.clone());
                }
            }
        }
    }
    for (_, path) in &names {
        if path.is_dir() {
            if let Some(found) = find_entry_path(path, entry_name) {
                return Some(found);
            }
        }
    }

    None
}
