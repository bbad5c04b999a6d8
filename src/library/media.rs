//! Media library backed by a directory tree
//!
//! Files are classified by extension. Every lookup rescans the tree so files
//! dropped in during a show are found without a restart.

use super::{ItemSource, SourceError};
use crate::identity::{IdentityNotes, ItemIdentity};
use crate::protocol::ItemTypeCode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// Media item for a file on disk
pub fn media_identity(path: &Path) -> ItemIdentity {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    ItemIdentity::Media {
        name,
        path: path.to_string_lossy().into_owned(),
    }
}

pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All media files under the root, sorted for a stable search order.
    /// Paths are absolute and resolved, matching what a recording exports.
    pub async fn scan(&self) -> Result<Vec<PathBuf>, SourceError> {
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| SourceError::io(&self.root, e))?;
        let mut files = Vec::new();
        let mut dirs = vec![root];
        while let Some(dir) = dirs.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| SourceError::io(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| SourceError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| SourceError::io(&path, e))?;
                if file_type.is_dir() {
                    dirs.push(path);
                } else if MediaKind::from_path(&path).is_some() {
                    files.push(path);
                }
            }
        }
        files.sort();
        debug!(root = %self.root.display(), count = files.len(), "Scanned media library");
        Ok(files)
    }
}

#[async_trait]
impl ItemSource for MediaLibrary {
    fn name(&self) -> &str {
        "media"
    }

    fn serves(&self, type_code: ItemTypeCode) -> bool {
        type_code == ItemTypeCode::Media
    }

    async fn find(&self, notes: &IdentityNotes) -> Result<Option<ItemIdentity>, SourceError> {
        Ok(self
            .scan()
            .await?
            .iter()
            .map(|path| media_identity(path))
            .find(|item| item.identity_notes() == *notes))
    }
}
