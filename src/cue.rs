//! Cue point types shared by the recorder, encoder and importer

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trigger at `timestamp_seconds` for arranged position `index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuePoint {
    pub index: u32,
    pub timestamp_seconds: f64,
}

impl CuePoint {
    pub fn new(index: u32, timestamp_seconds: f64) -> Self {
        Self {
            index,
            timestamp_seconds,
        }
    }
}

/// Why a cue could not be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// Note number beyond 127
    NoteOutOfRange,
    /// Content slide beyond the last slide that owns a note
    ContentBeyondReservedBlock,
}

/// A cue left out of an export. Non-fatal; reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedCue {
    pub index: u32,
    pub timestamp_seconds: f64,
    pub reason: DropReason,
}

impl fmt::Display for DroppedCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            DropReason::NoteOutOfRange => "index exceeds note range",
            DropReason::ContentBeyondReservedBlock => "slide index collides with reserved notes",
        };
        write!(
            f,
            "cue {} at {:.3}s dropped ({})",
            self.index, self.timestamp_seconds, why
        )
    }
}
