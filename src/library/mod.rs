//! Item sources consulted by the resolver
//!
//! Each source answers one question: "which of your items produces these
//! identity notes?". Sources are searched in a fixed order and the first hit
//! wins, so fingerprint collisions resolve deterministically.

pub mod loader;
pub mod media;
pub mod presentations;
pub mod songs;

use crate::identity::{IdentityNotes, ItemIdentity};
use crate::protocol::ItemTypeCode;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use loader::{IdentityLoader, ItemLoader, LoadedItem};
pub use media::{MediaKind, MediaLibrary};
pub use presentations::PresentationStore;
pub use songs::SongLibrary;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("item unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A searchable collection of items
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Source name for logs (e.g. "songs", "media")
    fn name(&self) -> &str;

    /// Whether this source can hold items of `type_code`
    fn serves(&self, type_code: ItemTypeCode) -> bool;

    /// First item whose identity notes equal `notes`
    async fn find(&self, notes: &IdentityNotes) -> Result<Option<ItemIdentity>, SourceError>;
}
