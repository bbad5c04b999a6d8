//! Selection loading
//!
//! Selecting an item is asynchronous: media has to be probed before the
//! output can be engaged. The resolver only applies a load whose item is
//! still the pending selection.

use super::{MediaKind, SourceError};
use crate::identity::ItemIdentity;
use crate::resolver::OutputKind;
use crate::setlist::SetlistItem;
use async_trait::async_trait;
use std::path::Path;

/// What the output needs to present a selected item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedItem {
    pub slide_count: usize,
    pub output: OutputKind,
}

#[async_trait]
pub trait ItemLoader: Send + Sync {
    async fn load(&self, item: &SetlistItem) -> Result<LoadedItem, SourceError>;
}

/// Output kind implied by an item's identity
pub fn output_kind(identity: &ItemIdentity) -> OutputKind {
    match identity {
        ItemIdentity::Media { path, .. } => match MediaKind::from_path(path) {
            Some(MediaKind::Video) => OutputKind::Video,
            Some(MediaKind::Image) => OutputKind::Image,
            Some(MediaKind::Audio) => OutputKind::Audio,
            None => OutputKind::None,
        },
        ItemIdentity::Youtube { .. } => OutputKind::Youtube,
        ItemIdentity::AudioPlaylist { .. } => OutputKind::Audio,
        ItemIdentity::Presentation {
            auto_advance_seconds: Some(_),
            ..
        } => OutputKind::AutoplayingPresentation,
        _ => OutputKind::None,
    }
}

/// Loader that derives everything from the identity and checks media files exist
#[derive(Debug, Default)]
pub struct IdentityLoader;

#[async_trait]
impl ItemLoader for IdentityLoader {
    async fn load(&self, item: &SetlistItem) -> Result<LoadedItem, SourceError> {
        if let ItemIdentity::Media { path, .. } = &item.identity {
            let path = Path::new(path);
            if !tokio::fs::try_exists(path)
                .await
                .map_err(|e| SourceError::io(path, e))?
            {
                return Err(SourceError::Unavailable(format!(
                    "media file {} not found",
                    path.display()
                )));
            }
        }
        Ok(LoadedItem {
            slide_count: item.identity.slide_count(),
            output: output_kind(&item.identity),
        })
    }
}
