//! Item abstraction over whatever the engine walks.
//!
//! The engine only ever sees the capability set on [`Item`]; concrete kinds
//! (mail messages, attachments, files, directories) live in the submodules.

pub mod fs;
pub mod mail;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ItemError;

pub use fs::DirectorySource;
pub use mail::MailboxSource;

/// Characters that cannot appear in a file name on the platforms we write to.
const ILLEGAL_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// A node in a source hierarchy.
#[async_trait]
pub trait Item: Send + Sync + fmt::Debug {
    /// Display name: a subject line or a file name.
    fn name(&self) -> &str;

    /// Lowercase extension including the leading dot, or `""`.
    fn extension(&self) -> String;

    /// Whether this item may own children.
    fn is_container(&self) -> bool;

    /// Direct children in source order.
    ///
    /// Enumeration failures are logged by the implementation and yield an
    /// empty list; they never propagate.
    async fn children(&self) -> Vec<Box<dyn Item>>;

    /// Write the item into `directory` (created if missing) and return the
    /// final path.
    async fn persist(&self, directory: &Path) -> Result<PathBuf, ItemError>;
}

/// Produces root items for a keyword.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Items matching `keyword`. Failures are logged and yield no items.
    async fn search(&self, keyword: &str) -> Vec<Box<dyn Item>>;
}

/// Replace characters that are illegal in file names.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if ILLEGAL_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Lowercase extension of `name` including the dot, `""` when there is none.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Case-insensitive keyword containment; an empty keyword matches everything.
pub(crate) fn matches_keyword(haystack: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    keyword.is_empty() || haystack.to_lowercase().contains(&keyword.to_lowercase())
}

/// Write `bytes` to `directory/file_name`, creating the directory first.
pub(crate) async fn write_into(
    directory: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, ItemError> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| ItemError::io(directory, e))?;
    let path = directory.join(sanitize_file_name(file_name));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ItemError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_file_name("Re: invoice <2024>?"), "Re_ invoice _2024__");
        assert_eq!(sanitize_file_name("a/b\\c|d*e\"f"), "a_b_c_d_e_f");
    }

    #[test]
    fn sanitize_replaces_control_characters() {
        assert_eq!(sanitize_file_name("line\tbreak\n"), "line_break");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_file_name(""), "untitled");
        assert_eq!(sanitize_file_name("   "), "untitled");
        assert_eq!(sanitize_file_name(".."), "untitled");
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_file_name("請求書.pdf"), "請求書.pdf");
    }

    #[test]
    fn extension_is_lowercase_with_dot() {
        assert_eq!(extension_of("Invoice.PDF"), ".pdf");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(""), "");
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert!(matches_keyword("Your INVOICE for May", "invoice"));
        assert!(!matches_keyword("Receipt", "invoice"));
        assert!(matches_keyword("anything", ""));
    }

    #[tokio::test]
    async fn write_into_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("deeper");
        let path = write_into(&target, "a:b.txt", b"hello").await.unwrap();
        assert_eq!(path, target.join("a_b.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }
}
