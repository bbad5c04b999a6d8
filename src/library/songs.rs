//! Song and bible library
//!
//! The complete text library, loaded once from a YAML (or JSON) list of
//! items. Only song and bible entries are kept.

use super::{ItemSource, SourceError};
use crate::identity::{IdentityNotes, ItemIdentity};
use crate::protocol::ItemTypeCode;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

pub struct SongLibrary {
    items: Vec<ItemIdentity>,
}

impl SongLibrary {
    pub fn from_items(items: Vec<ItemIdentity>) -> Self {
        let (items, skipped): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| item.type_code().is_text_library());
        if !skipped.is_empty() {
            warn!("Song library ignores {} non-song item(s)", skipped.len());
        }
        Self { items }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Load the library file; YAML is a superset of JSON so both parse
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::io(path, e))?;
        let items: Vec<ItemIdentity> =
            serde_yaml::from_str(&contents).map_err(|e| SourceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let library = Self::from_items(items);
        info!("📚 Loaded {} song/bible item(s) from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl ItemSource for SongLibrary {
    fn name(&self) -> &str {
        "songs"
    }

    fn serves(&self, type_code: ItemTypeCode) -> bool {
        type_code.is_text_library()
    }

    async fn find(&self, notes: &IdentityNotes) -> Result<Option<ItemIdentity>, SourceError> {
        Ok(self
            .items
            .iter()
            .find(|item| item.identity_notes() == *notes)
            .cloned())
    }
}
