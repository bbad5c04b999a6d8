//! Cue file importer
//!
//! Reads a cue file back: tempo, declared item type, identity notes, the
//! embedded payload and the cue points converted back to seconds. Used by the
//! receiving side to auto-import items and by `midicue-gw inspect`.

use crate::cue::CuePoint;
use crate::encoder::{CuePayload, PayloadError};
use crate::identity::{IdentityNotes, NotePair};
use crate::protocol::{ItemTypeCode, CUE_CHANNEL, IDENTITY_CHANNEL, TYPE_CODE_CC};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tracing::{debug, warn};

/// Tempo assumed when a file carries no tempo event
const DEFAULT_BPM: f64 = 120.0;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),
    #[error("timecode-based MIDI files are not supported")]
    UnsupportedTiming,
}

/// Everything recovered from a cue file
#[derive(Debug)]
pub struct ImportedCueFile {
    pub bpm: f64,
    pub ticks_per_beat: u16,
    /// `Song` when the file carries no type controller
    pub item_type: ItemTypeCode,
    pub identity: Option<IdentityNotes>,
    /// `None` when the file has no payload event
    pub payload: Option<Result<CuePayload, PayloadError>>,
    pub cues: Vec<CuePoint>,
    pub end_seconds: f64,
}

impl ImportedCueFile {
    /// Payload if it parsed; a malformed payload is logged and ignored
    pub fn valid_payload(&self) -> Option<&CuePayload> {
        match &self.payload {
            Some(Ok(payload)) => Some(payload),
            Some(Err(e)) => {
                warn!("Ignoring cue file payload: {}", e);
                None
            }
            None => None,
        }
    }
}

/// Parse a cue file
pub fn read_cue_file(bytes: &[u8]) -> Result<ImportedCueFile, ImportError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => return Err(ImportError::UnsupportedTiming),
    };

    let mut bpm = None;
    let mut item_type = ItemTypeCode::Song;
    let mut identity_pairs = Vec::with_capacity(2);
    let mut payload = None;
    let mut cue_ticks = Vec::new();
    // u64: a track can hold more 28-bit deltas than a u32 sum allows
    let mut end_tick = 0u64;

    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            end_tick = end_tick.max(tick);
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) if bpm.is_none() => {
                    bpm = Some(60_000_000.0 / f64::from(micros.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::Text(text)) if payload.is_none() => {
                    payload = Some(CuePayload::parse(text));
                }
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::Controller { controller, value }
                        if channel.as_int() == IDENTITY_CHANNEL
                            && controller.as_int() == TYPE_CODE_CC =>
                    {
                        match ItemTypeCode::from_value(value.as_int()) {
                            Some(code) => item_type = code,
                            None => warn!("Unknown item type code {}", value.as_int()),
                        }
                    }
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        if channel.as_int() == IDENTITY_CHANNEL && identity_pairs.len() < 2 {
                            identity_pairs.push(NotePair {
                                pitch: key.as_int(),
                                velocity: vel.as_int(),
                            });
                        } else if channel.as_int() == CUE_CHANNEL {
                            cue_ticks.push((key.as_int(), tick));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    let bpm = bpm.unwrap_or(DEFAULT_BPM);
    // Files re-saved by a DAW may use their own resolution
    let to_seconds = |t: u64| t as f64 / f64::from(ticks_per_beat) * 60.0 / bpm;

    let identity = match identity_pairs.as_slice() {
        [first, second] => Some(IdentityNotes::new(*first, *second)),
        _ => None,
    };

    let cues: Vec<CuePoint> = cue_ticks
        .into_iter()
        .map(|(key, tick)| CuePoint::new(u32::from(key), to_seconds(tick)))
        .collect();

    debug!(
        bpm,
        cues = cues.len(),
        item_type = %item_type,
        has_identity = identity.is_some(),
        "Imported cue file"
    );

    Ok(ImportedCueFile {
        bpm,
        ticks_per_beat,
        item_type,
        identity,
        payload,
        cues,
        end_seconds: to_seconds(end_tick),
    })
}
