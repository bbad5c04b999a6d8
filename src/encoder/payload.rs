//! Embedded cue payload
//!
//! The full item metadata travels inside the MIDI file as a text meta event so
//! a receiving application can rebuild and auto-import the item without the
//! original database.

use crate::identity::ItemIdentity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current payload format version
pub const PAYLOAD_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed cue payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported cue payload version {0} (expected {PAYLOAD_VERSION})")]
    UnsupportedVersion(u8),
}

/// Reconstructable item metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuePayload {
    pub version: u8,
    pub item: ItemIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl CuePayload {
    pub fn new(item: ItemIdentity) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            item,
            media_duration_seconds: None,
            background: None,
        }
    }

    pub fn with_background(mut self, background: Option<String>) -> Self {
        self.background = background;
        self
    }

    pub fn with_media_duration(mut self, seconds: Option<f64>) -> Self {
        self.media_duration_seconds = seconds;
        self
    }

    /// Compact JSON; field order is fixed by the struct so output is stable
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, PayloadError> {
        let payload: CuePayload = serde_json::from_slice(bytes)?;
        if payload.version != PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(payload.version));
        }
        Ok(payload)
    }
}
