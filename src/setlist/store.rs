//! Setlist persistence in sled
//!
//! Keys are the prefix followed by the big-endian item id, so a prefix scan
//! returns items in insertion order.

use super::{ItemId, SetlistItem};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

const SETLIST_PREFIX: &[u8] = b"setlist:";

pub struct SetlistStore {
    db: sled::Db,
}

impl SetlistStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("Failed to open setlist database: {}", path.display()))?;
        Ok(Self::new(db))
    }

    fn key(id: ItemId) -> Vec<u8> {
        let mut key = SETLIST_PREFIX.to_vec();
        key.extend_from_slice(&id.0.to_be_bytes());
        key
    }

    /// Load every persisted item; unreadable entries are skipped
    pub fn load(&self) -> Vec<SetlistItem> {
        let mut items = Vec::new();
        for result in self.db.scan_prefix(SETLIST_PREFIX) {
            match result {
                Ok((_, value)) => match serde_json::from_slice::<SetlistItem>(&value) {
                    Ok(item) => {
                        debug!("Restored setlist item {} ({})", item.id, item.identity.title());
                        items.push(item);
                    }
                    Err(e) => warn!("Skipping unreadable setlist entry: {}", e),
                },
                Err(e) => warn!("Failed to read setlist entry from sled: {}", e),
            }
        }
        info!("Loaded {} setlist item(s) from persistence", items.len());
        items
    }

    /// Insert or replace one item
    pub fn put(&self, item: &SetlistItem) -> Result<()> {
        let value = serde_json::to_vec(item).context("Failed to serialize setlist item")?;
        self.db
            .insert(Self::key(item.id), value)
            .context("Failed to persist setlist item to sled")?;
        self.db.flush().context("Failed to flush setlist database")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ItemIdentity;
    use crate::setlist::Setlist;
    use tempfile::tempdir;

    fn stopwatch(title: &str) -> ItemIdentity {
        ItemIdentity::Stopwatch {
            title: title.into(),
        }
    }

    #[test]
    fn test_restore_in_insertion_order() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("setlist.sled");

        {
            let store = SetlistStore::open(&db_path).unwrap();
            let mut setlist = Setlist::new();
            // ids past 255 exercise the big-endian key order
            for i in 0..300 {
                let item = setlist.append(stopwatch(&format!("t{}", i))).clone();
                store.put(&item).unwrap();
            }
        }

        let store = SetlistStore::open(&db_path).unwrap();
        let items = store.load();
        assert_eq!(items.len(), 300);
        assert!(items.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(items[257].identity.title(), "t257");
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let temp = tempdir().unwrap();
        let store = SetlistStore::open(temp.path().join("s.sled")).unwrap();
        let mut setlist = Setlist::new();
        let mut item = setlist.append(stopwatch("a")).clone();
        store.put(&item).unwrap();

        item.identity = stopwatch("b");
        store.put(&item).unwrap();
        let items = store.load();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity.title(), "b");
    }
}
