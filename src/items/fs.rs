//! Filesystem items: directories are containers, files are leaves.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ItemError;
use crate::items::{Item, ItemSource, extension_of, matches_keyword, sanitize_file_name};

/// A file or directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsItem {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

impl FsItem {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name, is_dir }
    }
}

#[async_trait]
impl Item for FsItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> String {
        if self.is_dir {
            String::new()
        } else {
            extension_of(&self.name)
        }
    }

    fn is_container(&self) -> bool {
        self.is_dir
    }

    async fn children(&self) -> Vec<Box<dyn Item>> {
        if !self.is_dir {
            return Vec::new();
        }
        match list_entries(&self.path).await {
            Ok(entries) => entries
                .into_iter()
                .map(|item| Box::new(item) as Box<dyn Item>)
                .collect(),
            Err(e) => {
                warn!(item = %self.name, error = %e, "Failed to list directory");
                Vec::new()
            }
        }
    }

    async fn persist(&self, directory: &Path) -> Result<PathBuf, ItemError> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| ItemError::io(directory, e))?;
        let target = directory.join(sanitize_file_name(&self.name));

        if self.is_dir {
            let source = self.path.clone();
            let dest = target.clone();
            tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
                .await
                .map_err(|e| ItemError::io(&target, std::io::Error::other(e)))??;
        } else {
            tokio::fs::copy(&self.path, &target)
                .await
                .map_err(|e| ItemError::io(&self.path, e))?;
        }

        debug!(item = %self.name, path = %target.display(), "Copied item");
        Ok(target)
    }
}

/// Entries of `dir` sorted by file name.
async fn list_entries(dir: &Path) -> std::io::Result<Vec<FsItem>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut items = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        items.push(FsItem::new(entry.path(), is_dir));
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Copy the tree at `source` into `dest`.
///
/// `dest` may live inside `source`; the copy never descends into itself.
fn copy_tree(source: &Path, dest: &Path) -> Result<(), ItemError> {
    std::fs::create_dir_all(dest).map_err(|e| ItemError::io(dest, e))?;
    let root = std::fs::canonicalize(dest).map_err(|e| ItemError::io(dest, e))?;
    copy_tree_into(source, dest, &root)
}

fn copy_tree_into(source: &Path, dest: &Path, root: &Path) -> Result<(), ItemError> {
    std::fs::create_dir_all(dest).map_err(|e| ItemError::io(dest, e))?;
    let entries = std::fs::read_dir(source).map_err(|e| ItemError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ItemError::io(source, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ItemError::io(&from, e))?;
        if file_type.is_dir() {
            if std::fs::canonicalize(&from).is_ok_and(|path| path == root) {
                debug!(path = %from.display(), "Skipping copy destination inside its source");
                continue;
            }
            copy_tree_into(&from, &to, root)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| ItemError::io(&from, e))?;
        }
    }
    Ok(())
}

/// Source over the top level of a directory tree.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ItemSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn search(&self, keyword: &str) -> Vec<Box<dyn Item>> {
        match list_entries(&self.root).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|item| matches_keyword(&item.name, keyword))
                .map(|item| Box::new(item) as Box<dyn Item>)
                .collect(),
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Directory search failed");
                Vec::new()
            }
        }
    }
}
