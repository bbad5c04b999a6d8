//! Live setlist
//!
//! The one mutable collection the resolver shares with the rest of the show.
//! Writes are append-only; items are never reordered behind the operator's
//! back.

pub mod store;

use crate::identity::{IdentityNotes, ItemIdentity};
use crate::protocol::ItemTypeCode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use store::SetlistStore;

/// Stable setlist item id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One setlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetlistItem {
    pub id: ItemId,
    pub identity: ItemIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_duration_seconds: Option<f64>,
}

impl SetlistItem {
    pub fn type_code(&self) -> ItemTypeCode {
        self.identity.type_code()
    }
}

/// Ordered setlist contents
#[derive(Debug, Default)]
pub struct Setlist {
    items: Vec<SetlistItem>,
    next_id: u64,
}

impl Setlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted items, already in insertion order
    pub fn from_items(items: Vec<SetlistItem>) -> Self {
        let next_id = items.iter().map(|i| i.id.0 + 1).max().unwrap_or(0);
        Self { items, next_id }
    }

    pub fn items(&self) -> &[SetlistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&SetlistItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Append an item and return the stored entry
    pub fn append(&mut self, identity: ItemIdentity) -> &mut SetlistItem {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.push(SetlistItem {
            id,
            identity,
            background: None,
            media_duration_seconds: None,
        });
        let idx = self.items.len() - 1;
        &mut self.items[idx]
    }

    /// First item in setlist order whose notes match and whose type passes `accept`
    pub fn find_by_notes(
        &self,
        notes: &IdentityNotes,
        accept: impl Fn(ItemTypeCode) -> bool,
    ) -> Option<&SetlistItem> {
        self.items
            .iter()
            .filter(|i| accept(i.type_code()))
            .find(|i| i.identity.identity_notes() == *notes)
    }
}
