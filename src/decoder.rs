//! Command decoder - raw MIDI bytes to resolver commands
//!
//! The live transport (port I/O) is outside this crate; it hands every
//! received message to [`CommandDecoder::feed`]. Identity resolution needs
//! two consecutive identity-channel note-ons (optionally preceded by the
//! CC#3 type tag), so the decoder keeps a small amount of state between
//! messages.

use crate::identity::{IdentityNotes, NotePair};
use crate::midi::MidiMessage;
use crate::protocol::{
    ActionVerb, ItemTypeCode, BLANK_NOTE, CUE_CHANNEL, IDENTITY_CHANNEL, MAX_CONTENT_INDEX,
    TYPE_CODE_CC,
};
use tracing::{debug, trace};

/// Navigation target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
    Index(u32),
}

/// Decoded command consumed by the resolver
#[derive(Debug, Clone, PartialEq)]
pub enum CueCommand {
    Navigate(Direction),
    Blank,
    IdentifyByHash {
        notes: IdentityNotes,
        type_code: Option<ItemTypeCode>,
        /// Raw payload text from a cue file; never present on live MIDI
        payload: Option<Vec<u8>>,
    },
    Action(ActionVerb),
}

impl CueCommand {
    pub fn identify(notes: IdentityNotes, type_code: Option<ItemTypeCode>) -> Self {
        CueCommand::IdentifyByHash {
            notes,
            type_code,
            payload: None,
        }
    }
}

/// Stateful raw-message decoder
#[derive(Debug, Default)]
pub struct CommandDecoder {
    declared_type: Option<ItemTypeCode>,
    first_note: Option<NotePair>,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode raw bytes; unparseable data is ignored
    pub fn feed(&mut self, data: &[u8]) -> Option<CueCommand> {
        let msg = MidiMessage::parse(data)?;
        self.feed_message(msg)
    }

    pub fn feed_message(&mut self, msg: MidiMessage) -> Option<CueCommand> {
        trace!("decoder <- {}", msg);
        match msg {
            // Note-offs follow every note-on in a cue file; they carry nothing
            MidiMessage::NoteOff { .. } => None,

            MidiMessage::ControlChange { channel, cc, value }
                if channel == IDENTITY_CHANNEL && cc == TYPE_CODE_CC =>
            {
                self.first_note = None;
                self.declared_type = ItemTypeCode::from_value(value);
                if self.declared_type.is_none() {
                    debug!(value, "Unknown item type code, identify will be untyped");
                }
                None
            }

            MidiMessage::NoteOn { channel, note, velocity } if channel == IDENTITY_CHANNEL => {
                let pair = NotePair { pitch: note, velocity };
                match self.first_note.take() {
                    None => {
                        self.first_note = Some(pair);
                        None
                    }
                    Some(first) => {
                        let type_code = self.declared_type.take();
                        Some(CueCommand::identify(IdentityNotes::new(first, pair), type_code))
                    }
                }
            }

            MidiMessage::NoteOn { channel, note, .. } if channel == CUE_CHANNEL => {
                self.reset();
                cue_note_command(note)
            }

            _ => {
                self.reset();
                None
            }
        }
    }

    /// Drop any half-received identity sequence
    pub fn reset(&mut self) {
        self.declared_type = None;
        self.first_note = None;
    }
}

/// `None` for notes above the reserved block; content is capped below it
fn cue_note_command(note: u8) -> Option<CueCommand> {
    if u32::from(note) <= MAX_CONTENT_INDEX {
        return Some(CueCommand::Navigate(Direction::Index(u32::from(note))));
    }
    if note == BLANK_NOTE {
        return Some(CueCommand::Blank);
    }
    match ActionVerb::from_note(note) {
        Some(verb) => Some(CueCommand::Action(verb)),
        None => {
            debug!(note, "Ignoring unassigned cue note");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ItemIdentity;
    use crate::protocol::STOP_NOTE;

    fn note_on(channel: u8, note: u8, velocity: u8) -> Vec<u8> {
        MidiMessage::NoteOn { channel, note, velocity }.encode()
    }

    #[test]
    fn test_cue_notes() {
        let mut dec = CommandDecoder::new();
        assert_eq!(
            dec.feed(&note_on(CUE_CHANNEL, 7, 127)),
            Some(CueCommand::Navigate(Direction::Index(7)))
        );
        assert_eq!(dec.feed(&note_on(CUE_CHANNEL, BLANK_NOTE, 127)), Some(CueCommand::Blank));
        assert_eq!(
            dec.feed(&note_on(CUE_CHANNEL, STOP_NOTE, 127)),
            Some(CueCommand::Action(ActionVerb::Stop))
        );
        // note-offs are ignored
        assert_eq!(dec.feed(&[0x80, 7, 0]), None);
        assert_eq!(dec.feed(&[0x90, 7, 0]), None);
    }

    #[test]
    fn test_unassigned_cue_notes_are_ignored() {
        let mut dec = CommandDecoder::new();
        for note in [66, 70, 100, 127] {
            assert_eq!(dec.feed(&note_on(CUE_CHANNEL, note, 127)), None, "note {}", note);
        }
        assert_eq!(
            dec.feed(&note_on(CUE_CHANNEL, MAX_CONTENT_INDEX as u8, 127)),
            Some(CueCommand::Navigate(Direction::Index(MAX_CONTENT_INDEX)))
        );
    }

    #[test]
    fn test_identify_sequence() {
        let item = ItemIdentity::Media {
            name: "intro".into(),
            path: "/media/intro.mp4".into(),
        };
        let notes = item.identity_notes();
        let mut dec = CommandDecoder::new();

        let cc = MidiMessage::ControlChange {
            channel: IDENTITY_CHANNEL,
            cc: TYPE_CODE_CC,
            value: ItemTypeCode::Media.value(),
        };
        assert_eq!(dec.feed(&cc.encode()), None);
        assert_eq!(
            dec.feed(&note_on(IDENTITY_CHANNEL, notes.first.pitch, notes.first.velocity)),
            None
        );
        // the first note's note-off arrives before the second note-on
        assert_eq!(dec.feed(&[0x8F, notes.first.pitch, 0]), None);
        assert_eq!(
            dec.feed(&note_on(IDENTITY_CHANNEL, notes.second.pitch, notes.second.velocity)),
            Some(CueCommand::identify(notes, Some(ItemTypeCode::Media)))
        );

        // type tag does not leak into the next identify
        let again = [
            note_on(IDENTITY_CHANNEL, notes.first.pitch, notes.first.velocity),
            note_on(IDENTITY_CHANNEL, notes.second.pitch, notes.second.velocity),
        ];
        assert_eq!(dec.feed(&again[0]), None);
        assert_eq!(dec.feed(&again[1]), Some(CueCommand::identify(notes, None)));
    }

    #[test]
    fn test_unrelated_message_resets_identity() {
        let mut dec = CommandDecoder::new();
        assert_eq!(dec.feed(&note_on(IDENTITY_CHANNEL, 10, 20)), None);
        assert_eq!(
            dec.feed(&note_on(CUE_CHANNEL, 3, 127)),
            Some(CueCommand::Navigate(Direction::Index(3)))
        );
        // a fresh pair is needed after the reset
        assert_eq!(dec.feed(&note_on(IDENTITY_CHANNEL, 30, 40)), None);
    }
}
