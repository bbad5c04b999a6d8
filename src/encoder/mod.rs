//! MIDI encoder - show timeline to Standard MIDI File bytes
//!
//! Produces a format 0 file with a single track laid out as:
//!
//! ```text
//! tick 0   tempo meta
//! tick 0   CC#3 = item type            (omitted for songs)
//! tick 0   identity note pair #1, #2   (identity channel)
//! tick 0   text meta = JSON payload
//! per cue  note-on + note-off, note = cue index (cue channel)
//! end      end-of-track
//! ```
//!
//! Encoding is a pure function of its input: identical timelines always
//! produce byte-identical files.

pub mod payload;

use crate::cue::{CuePoint, DropReason, DroppedCue};
use crate::identity::IdentityNotes;
use crate::protocol::{
    ItemTypeCode, CUE_CHANNEL, CUE_VELOCITY, IDENTITY_CHANNEL, MAX_BPM, MAX_NOTE, MIN_BPM, PPQ,
    TYPE_CODE_CC,
};
use crate::recorder::Recording;
use anyhow::Context;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub use payload::{CuePayload, PayloadError, PAYLOAD_VERSION};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no playable cues remain ({dropped} dropped)")]
    EmptyTimeline { dropped: usize },
    #[error("tempo {0} bpm is outside {MIN_BPM}..={MAX_BPM}")]
    InvalidTempo(f64),
    #[error("cue {index} has invalid timestamp {seconds}")]
    InvalidTimestamp { index: u32, seconds: f64 },
    #[error("duration {0} is not a finite non-negative number of seconds")]
    InvalidDuration(f64),
    #[error("{seconds}s is past the last encodable tick at {bpm} bpm")]
    TimestampOutOfRange { seconds: f64, bpm: f64 },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("failed to serialize MIDI file: {0}")]
    Write(#[from] std::io::Error),
}

/// Everything one export needs
#[derive(Debug, Clone, Copy)]
pub struct CueTimeline<'a> {
    pub cues: &'a [CuePoint],
    pub duration_seconds: f64,
    pub bpm: f64,
    pub identity: Option<IdentityNotes>,
    pub payload: Option<&'a CuePayload>,
    pub item_type: Option<ItemTypeCode>,
}

impl<'a> CueTimeline<'a> {
    /// Bare timeline: cues only, no identity or payload
    pub fn new(cues: &'a [CuePoint], duration_seconds: f64, bpm: f64) -> Self {
        Self {
            cues,
            duration_seconds,
            bpm,
            identity: None,
            payload: None,
            item_type: None,
        }
    }

    /// Full timeline for a recording, carrying the item's identity and payload
    pub fn for_recording(recording: &'a Recording, payload: &'a CuePayload, default_bpm: f64) -> Self {
        Self {
            cues: &recording.cues,
            duration_seconds: recording.duration_seconds,
            bpm: recording.bpm.unwrap_or(default_bpm),
            identity: Some(recording.item.identity_notes()),
            payload: Some(payload),
            item_type: Some(recording.item.type_code()),
        }
    }
}

/// Encoded file plus the cues that had to be left out
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCueFile {
    pub bytes: Vec<u8>,
    pub dropped: Vec<DroppedCue>,
    pub note_count: usize,
}

impl EncodedCueFile {
    /// Write the file to disk
    pub async fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, &self.bytes)
            .await
            .with_context(|| format!("Failed to write MIDI file: {}", path.display()))
    }
}

/// Last tick a single-track file can address; deltas are 28-bit quantities
pub const MAX_TICK: u32 = (1 << 28) - 1;

/// Seconds to ticks at a constant tempo, rounding half up
pub fn seconds_to_ticks(seconds: f64, bpm: f64) -> u32 {
    let ticks = seconds * (bpm / 60.0) * f64::from(PPQ);
    (ticks + 0.5).floor() as u32
}

/// Like [`seconds_to_ticks`], but `None` past [`MAX_TICK`]
pub fn checked_ticks(seconds: f64, bpm: f64) -> Option<u32> {
    let ticks = (seconds * (bpm / 60.0) * f64::from(PPQ) + 0.5).floor();
    (ticks <= f64::from(MAX_TICK)).then_some(ticks as u32)
}

pub fn ticks_to_seconds(ticks: u32, bpm: f64) -> f64 {
    f64::from(ticks) / f64::from(PPQ) * 60.0 / bpm
}

/// Microseconds per quarter note for the tempo meta event
pub fn tempo_micros(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round() as u32
}

/// Encode a timeline into Standard MIDI File bytes
pub fn encode(timeline: &CueTimeline<'_>) -> Result<EncodedCueFile, EncodeError> {
    let bpm = timeline.bpm;
    if !bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Err(EncodeError::InvalidTempo(bpm));
    }
    if !timeline.duration_seconds.is_finite() || timeline.duration_seconds < 0.0 {
        return Err(EncodeError::InvalidDuration(timeline.duration_seconds));
    }

    let end_tick = checked_ticks(timeline.duration_seconds, bpm).ok_or(
        EncodeError::TimestampOutOfRange {
            seconds: timeline.duration_seconds,
            bpm,
        },
    )?;

    let mut kept: Vec<CuePoint> = Vec::with_capacity(timeline.cues.len());
    let mut dropped = Vec::new();
    for cue in timeline.cues {
        if !cue.timestamp_seconds.is_finite() || cue.timestamp_seconds < 0.0 {
            return Err(EncodeError::InvalidTimestamp {
                index: cue.index,
                seconds: cue.timestamp_seconds,
            });
        }
        if cue.index > MAX_NOTE {
            dropped.push(DroppedCue {
                index: cue.index,
                timestamp_seconds: cue.timestamp_seconds,
                reason: DropReason::NoteOutOfRange,
            });
            continue;
        }
        kept.push(*cue);
    }

    if !dropped.is_empty() {
        warn!(count = dropped.len(), "Dropping cues outside the MIDI note range");
    }
    if kept.is_empty() {
        return Err(EncodeError::EmptyTimeline {
            dropped: dropped.len(),
        });
    }

    // Stable: ties keep input order
    kept.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

    let payload_bytes = match timeline.payload {
        Some(payload) => Some(payload.to_bytes()?),
        None => None,
    };

    let mut events: Vec<(u32, TrackEventKind<'_>)> = Vec::with_capacity(kept.len() * 2 + 8);
    events.push((0, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_micros(bpm))))));

    if let Some(code) = timeline.item_type.filter(|c| *c != ItemTypeCode::Song) {
        events.push((
            0,
            midi(
                IDENTITY_CHANNEL,
                MidiMessage::Controller {
                    controller: u7::from(TYPE_CODE_CC),
                    value: u7::from(code.value()),
                },
            ),
        ));
    }

    if let Some(notes) = timeline.identity {
        for pair in notes.pairs() {
            push_note(&mut events, 0, IDENTITY_CHANNEL, pair.pitch, pair.velocity);
        }
    }

    if let Some(bytes) = payload_bytes.as_deref() {
        events.push((0, TrackEventKind::Meta(MetaMessage::Text(bytes))));
    }

    for cue in &kept {
        let tick = checked_ticks(cue.timestamp_seconds, bpm).ok_or(
            EncodeError::TimestampOutOfRange {
                seconds: cue.timestamp_seconds,
                bpm,
            },
        )?;
        push_note(&mut events, tick, CUE_CHANNEL, cue.index as u8, CUE_VELOCITY);
    }

    let last_tick = events.last().map(|(tick, _)| *tick).unwrap_or(0);
    let end_tick = last_tick.max(end_tick);
    events.push((end_tick, TrackEventKind::Meta(MetaMessage::EndOfTrack)));

    let mut track = Vec::with_capacity(events.len());
    let mut previous = 0u32;
    for (tick, kind) in events {
        // Ticks are sorted and bounded by MAX_TICK, so every delta fits
        track.push(TrackEvent {
            delta: u28::from(tick - previous),
            kind,
        });
        previous = tick;
    }

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::from(PPQ)),
    ));
    smf.tracks.push(track);

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;

    debug!(
        notes = kept.len(),
        dropped = dropped.len(),
        end_tick,
        size = bytes.len(),
        "Encoded cue file"
    );

    Ok(EncodedCueFile {
        bytes,
        dropped,
        note_count: kept.len(),
    })
}

fn midi(channel: u8, message: MidiMessage) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::from(channel),
        message,
    }
}

/// Note-on immediately followed by its note-off
fn push_note(events: &mut Vec<(u32, TrackEventKind<'_>)>, tick: u32, channel: u8, key: u8, vel: u8) {
    events.push((
        tick,
        midi(
            channel,
            MidiMessage::NoteOn {
                key: u7::from(key),
                vel: u7::from(vel),
            },
        ),
    ));
    events.push((
        tick,
        midi(
            channel,
            MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(0),
            },
        ),
    ));
}
