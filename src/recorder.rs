//! Cue recorder - captures trigger timestamps per arranged slide or action
//!
//! A build is the flattened sequence an item presents: the blank pseudo-slide
//! at position 0, then every content slide, then (for items with a player)
//! the action pseudo-slides. The recorder keeps any number of timestamps per
//! position and produces the cue sheet handed to the encoder.

use crate::cue::{CuePoint, DropReason, DroppedCue};
use crate::identity::ItemIdentity;
use crate::protocol::{ActionVerb, ItemTypeCode, BLANK_NOTE, MAX_CONTENT_INDEX};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("position {position} is outside the build ({len} slots)")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("timestamp {0} is not a finite non-negative number of seconds")]
    InvalidTimestamp(f64),
    #[error("no recorded cue with id {0}")]
    UnknownCue(u64),
}

/// One slot of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ArrangedSlot {
    Blank,
    Content(u32),
    Action(ActionVerb),
}

impl ArrangedSlot {
    /// Cue index written for this slot, or why it cannot be written
    pub fn cue_index(self) -> Result<u32, DropReason> {
        match self {
            ArrangedSlot::Blank => Ok(u32::from(BLANK_NOTE)),
            ArrangedSlot::Action(verb) => Ok(u32::from(verb.note())),
            ArrangedSlot::Content(i) if i <= MAX_CONTENT_INDEX => Ok(i),
            ArrangedSlot::Content(_) => Err(DropReason::ContentBeyondReservedBlock),
        }
    }
}

/// Flattened slide/action sequence for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    slots: Vec<ArrangedSlot>,
}

impl Arrangement {
    /// Build the arrangement for an item
    pub fn for_item(item: &ItemIdentity) -> Self {
        let mut slots = vec![ArrangedSlot::Blank];
        slots.extend((0..item.slide_count() as u32).map(ArrangedSlot::Content));
        if has_player(item) {
            slots.extend(ActionVerb::all().iter().copied().map(ArrangedSlot::Action));
        }
        Self { slots }
    }

    pub fn slots(&self) -> &[ArrangedSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn has_player(item: &ItemIdentity) -> bool {
    match item.type_code() {
        ItemTypeCode::Media | ItemTypeCode::Youtube | ItemTypeCode::AudioPlaylist => true,
        ItemTypeCode::Presentation => matches!(
            item,
            ItemIdentity::Presentation {
                auto_advance_seconds: Some(_),
                ..
            }
        ),
        _ => false,
    }
}

/// A timestamp recorded against a build position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCue {
    pub id: u64,
    pub position: usize,
    pub timestamp_seconds: f64,
}

/// Cues ready for export plus whatever could not be encoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueSheet {
    pub cues: Vec<CuePoint>,
    pub dropped: Vec<DroppedCue>,
}

/// Recorder for one editing session
pub struct Recorder {
    item: ItemIdentity,
    arrangement: Arrangement,
    cues: Vec<RecordedCue>,
    next_id: u64,
}

impl Recorder {
    pub fn new(item: ItemIdentity) -> Self {
        let arrangement = Arrangement::for_item(&item);
        Self {
            item,
            arrangement,
            cues: Vec::new(),
            next_id: 1,
        }
    }

    pub fn item(&self) -> &ItemIdentity {
        &self.item
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    /// Recorded cues in insertion order
    pub fn cues(&self) -> &[RecordedCue] {
        &self.cues
    }

    /// Append a trigger for `position`
    pub fn record(&mut self, position: usize, timestamp_seconds: f64) -> Result<u64, RecordError> {
        self.check_position(position)?;
        check_timestamp(timestamp_seconds)?;

        let id = self.next_id;
        self.next_id += 1;
        self.cues.push(RecordedCue {
            id,
            position,
            timestamp_seconds,
        });
        debug!(id, position, timestamp_seconds, "Cue recorded");
        Ok(id)
    }

    /// Move an existing cue in time; insertion order is kept for tie-breaking
    pub fn update(&mut self, id: u64, timestamp_seconds: f64) -> Result<(), RecordError> {
        check_timestamp(timestamp_seconds)?;
        let cue = self
            .cues
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RecordError::UnknownCue(id))?;
        cue.timestamp_seconds = timestamp_seconds;
        Ok(())
    }

    pub fn remove(&mut self, id: u64) -> Option<RecordedCue> {
        let idx = self.cues.iter().position(|c| c.id == id)?;
        Some(self.cues.remove(idx))
    }

    /// Remove every trigger recorded for `position`, returning how many went
    pub fn clear_position(&mut self, position: usize) -> usize {
        let before = self.cues.len();
        self.cues.retain(|c| c.position != position);
        before - self.cues.len()
    }

    pub fn cues_at(&self, position: usize) -> impl Iterator<Item = &RecordedCue> {
        self.cues.iter().filter(move |c| c.position == position)
    }

    /// Immutable snapshot for export
    pub fn cue_sheet(&self) -> CueSheet {
        let mut sheet = CueSheet::default();
        for cue in &self.cues {
            let slot = self.arrangement.slots()[cue.position];
            match slot.cue_index() {
                Ok(index) => sheet.cues.push(CuePoint::new(index, cue.timestamp_seconds)),
                Err(reason) => sheet.dropped.push(DroppedCue {
                    index: match slot {
                        ArrangedSlot::Content(i) => i,
                        _ => cue.position as u32,
                    },
                    timestamp_seconds: cue.timestamp_seconds,
                    reason,
                }),
            }
        }
        sheet
    }

    fn check_position(&self, position: usize) -> Result<(), RecordError> {
        if position >= self.arrangement.len() {
            return Err(RecordError::PositionOutOfRange {
                position,
                len: self.arrangement.len(),
            });
        }
        Ok(())
    }
}

fn check_timestamp(t: f64) -> Result<(), RecordError> {
    if !t.is_finite() || t < 0.0 {
        return Err(RecordError::InvalidTimestamp(t));
    }
    Ok(())
}

/// Serialized recording session, the input of `midicue-gw export`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub item: ItemIdentity,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_duration_seconds: Option<f64>,
    pub cues: Vec<CuePoint>,
}

impl Recorder {
    /// Snapshot this session as a serializable recording
    pub fn to_recording(&self, duration_seconds: f64, bpm: Option<f64>) -> Recording {
        Recording {
            item: self.item.clone(),
            duration_seconds,
            bpm,
            background: None,
            media_duration_seconds: None,
            cues: self.cue_sheet().cues,
        }
    }
}
