//! Discovery of the course documents that make up the collection.
//!
//! Acquiring documents (downloading them from the LMS) is done by a
//! separate process that drops files into `[documents].dir`. This module
//! only walks that directory and decides which files are uploaded on a
//! collection refresh.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rag_chat_core::DocumentFile;
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;

/// Every file under the documents directory matching the include globs and
/// none of the exclude globs, sorted by relative path.
///
/// Each file is named by its path relative to the directory, so a document
/// in a subdirectory is uploaded as `week2/notes.pdf` and resolves back to
/// the same file when its chunks are located.
pub fn scan_documents(config: &DocumentsConfig) -> Result<Vec<DocumentFile>> {
    let root = &config.dir;
    if !root.is_dir() {
        bail!("documents directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut excludes = vec!["**/.*".to_string(), "**/.*/**".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude_set.is_match(relative) || !include_set.is_match(relative) {
            continue;
        }

        found.push(relative.to_path_buf());
    }

    found.sort();
    Ok(found
        .into_iter()
        .map(|rel| DocumentFile {
            path: root.join(&rel),
            name: upload_name(&rel),
        })
        .collect())
}

/// `/`-separated form of a relative path, independent of the platform.
fn upload_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
