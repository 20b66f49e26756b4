//! Mail items backed by RFC 5322 messages on disk.
//!
//! A directory of `.eml` files stands in for the mailbox. Messages are
//! containers whose children are their attachments; attached
//! `message/rfc822` parts become nested mail containers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::ItemError;
use crate::items::{Item, ItemSource, extension_of, matches_keyword, write_into};

/// Synthetic extension every mail container reports.
pub const MAIL_EXTENSION: &str = ".msg";

/// File extension of the raw message files this source reads and writes.
const RAW_MAIL_EXTENSION: &str = "eml";

// ── Mail message ────────────────────────────────────────────────────

/// A mail message. Parsed lazily from its raw bytes on child enumeration.
#[derive(Clone)]
pub struct MailItem {
    subject: String,
    raw: Arc<Vec<u8>>,
}

impl MailItem {
    /// Wrap raw message bytes. The subject falls back to `fallback_name`,
    /// then to `"Unknown"`.
    pub fn from_raw(raw: Vec<u8>, fallback_name: Option<&str>) -> Self {
        let subject = MessageParser::default()
            .parse(raw.as_slice())
            .and_then(|parsed| parsed.subject().map(str::to_string))
            .filter(|s| !s.trim().is_empty())
            .or_else(|| fallback_name.map(str::to_string))
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            subject,
            raw: Arc::new(raw),
        }
    }
}

impl fmt::Debug for MailItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailItem")
            .field("subject", &self.subject)
            .field("size", &self.raw.len())
            .finish()
    }
}

#[async_trait]
impl Item for MailItem {
    fn name(&self) -> &str {
        &self.subject
    }

    fn extension(&self) -> String {
        MAIL_EXTENSION.to_string()
    }

    fn is_container(&self) -> bool {
        true
    }

    async fn children(&self) -> Vec<Box<dyn Item>> {
        let Some(parsed) = MessageParser::default().parse(self.raw.as_slice()) else {
            warn!(item = %self.subject, "Failed to parse message, treating as empty");
            return Vec::new();
        };

        parsed
            .attachments()
            .enumerate()
            .map(|(index, part)| child_from_part(part, index))
            .collect()
    }

    async fn persist(&self, directory: &Path) -> Result<PathBuf, ItemError> {
        let file_name = format!("{}.{RAW_MAIL_EXTENSION}", self.subject);
        let path = write_into(directory, &file_name, &self.raw).await?;
        debug!(item = %self.subject, path = %path.display(), "Saved message");
        Ok(path)
    }
}

fn child_from_part(part: &MessagePart<'_>, index: usize) -> Box<dyn Item> {
    let name = MimeHeaders::attachment_name(part)
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment-{}", index + 1));

    if matches!(part.body, PartType::Message(_)) {
        Box::new(MailItem::from_raw(part.contents().to_vec(), Some(name.as_str())))
    } else {
        Box::new(AttachmentItem::new(name, part.contents().to_vec()))
    }
}

// ── Attachment ──────────────────────────────────────────────────────

/// A decoded attachment. Always a leaf.
#[derive(Clone)]
pub struct AttachmentItem {
    name: String,
    bytes: Arc<Vec<u8>>,
}

impl AttachmentItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes),
        }
    }
}

impl fmt::Debug for AttachmentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentItem")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
impl Item for AttachmentItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> String {
        extension_of(&self.name)
    }

    fn is_container(&self) -> bool {
        false
    }

    async fn children(&self) -> Vec<Box<dyn Item>> {
        Vec::new()
    }

    async fn persist(&self, directory: &Path) -> Result<PathBuf, ItemError> {
        let path = write_into(directory, &self.name, &self.bytes).await?;
        debug!(item = %self.name, path = %path.display(), "Saved attachment");
        Ok(path)
    }
}

// ── Source ──────────────────────────────────────────────────────────

/// Mailbox backed by a directory of `.eml` files.
#[derive(Debug, Clone)]
pub struct MailboxSource {
    root: PathBuf,
}

impl MailboxSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn message_paths(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_mail = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(RAW_MAIL_EXTENSION));
            if is_mail && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl ItemSource for MailboxSource {
    fn name(&self) -> &str {
        "mailbox"
    }

    async fn search(&self, keyword: &str) -> Vec<Box<dyn Item>> {
        let paths = match self.message_paths().await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Mailbox search failed");
                return Vec::new();
            }
        };

        let mut results: Vec<Box<dyn Item>> = Vec::new();
        for path in paths {
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable message");
                    continue;
                }
            };
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let item = MailItem::from_raw(raw, file_name.as_deref());
            if matches_keyword(item.name(), keyword) {
                results.push(Box::new(item));
            }
        }
        results
    }
}
