//! Presentation store: one JSON file per presentation

use super::{ItemSource, SourceError};
use crate::identity::{IdentityNotes, ItemIdentity};
use crate::protocol::ItemTypeCode;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentationFile {
    title: String,
    #[serde(default)]
    slides: Vec<String>,
    #[serde(default)]
    auto_advance_seconds: Option<f64>,
}

impl From<PresentationFile> for ItemIdentity {
    fn from(file: PresentationFile) -> Self {
        ItemIdentity::Presentation {
            title: file.title,
            slides: file.slides,
            auto_advance_seconds: file.auto_advance_seconds,
        }
    }
}

pub struct PresentationStore {
    dir: PathBuf,
}

impl PresentationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every readable presentation, ordered by file name
    pub async fn list(&self) -> Result<Vec<ItemIdentity>, SourceError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SourceError::io(&self.dir, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = match tokio::fs::read(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping presentation {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_slice::<PresentationFile>(&contents) {
                Ok(file) => items.push(file.into()),
                Err(e) => warn!("Skipping malformed presentation {}: {}", path.display(), e),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl ItemSource for PresentationStore {
    fn name(&self) -> &str {
        "presentations"
    }

    fn serves(&self, type_code: ItemTypeCode) -> bool {
        type_code == ItemTypeCode::Presentation
    }

    async fn find(&self, notes: &IdentityNotes) -> Result<Option<ItemIdentity>, SourceError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|item| item.identity_notes() == *notes))
    }
}
