//! Cue protocol constant table
//!
//! Note, channel and controller assignments shared by the encoder, the
//! importer and the command decoder. Values are published in exported files
//! and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticks per quarter note used for every exported file
pub const PPQ: u16 = 480;

/// Channel carrying cue notes (0-based, MIDI channel 1)
pub const CUE_CHANNEL: u8 = 0;

/// Channel carrying identity notes and the type-code controller (0-based, MIDI channel 16)
pub const IDENTITY_CHANNEL: u8 = 15;

/// Controller number carrying the item type code
pub const TYPE_CODE_CC: u8 = 3;

/// Velocity used for cue note-on events
pub const CUE_VELOCITY: u8 = 127;

/// "Cleared" pseudo-slide, always position 0 of a build
pub const BLANK_NOTE: u8 = 60;
pub const ACTIVATE_NOTE: u8 = 61;
pub const PAUSE_NOTE: u8 = 62;
pub const STOP_NOTE: u8 = 63;
pub const LOOP_ON_NOTE: u8 = 64;
pub const LOOP_OFF_NOTE: u8 = 65;

/// Highest content slide index that gets its own note
pub const MAX_CONTENT_INDEX: u32 = 59;

/// Highest valid MIDI note number
pub const MAX_NOTE: u32 = 127;

/// Accepted tempo range for exports
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 400.0;

/// Action pseudo-slides, in reserved-note order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionVerb {
    Activate,
    Pause,
    Stop,
    LoopOn,
    LoopOff,
}

impl ActionVerb {
    pub fn all() -> &'static [ActionVerb] {
        &[
            ActionVerb::Activate,
            ActionVerb::Pause,
            ActionVerb::Stop,
            ActionVerb::LoopOn,
            ActionVerb::LoopOff,
        ]
    }

    pub fn note(self) -> u8 {
        match self {
            ActionVerb::Activate => ACTIVATE_NOTE,
            ActionVerb::Pause => PAUSE_NOTE,
            ActionVerb::Stop => STOP_NOTE,
            ActionVerb::LoopOn => LOOP_ON_NOTE,
            ActionVerb::LoopOff => LOOP_OFF_NOTE,
        }
    }

    pub fn from_note(note: u8) -> Option<Self> {
        match note {
            ACTIVATE_NOTE => Some(ActionVerb::Activate),
            PAUSE_NOTE => Some(ActionVerb::Pause),
            STOP_NOTE => Some(ActionVerb::Stop),
            LOOP_ON_NOTE => Some(ActionVerb::LoopOn),
            LOOP_OFF_NOTE => Some(ActionVerb::LoopOff),
            _ => None,
        }
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionVerb::Activate => write!(f, "activate"),
            ActionVerb::Pause => write!(f, "pause"),
            ActionVerb::Stop => write!(f, "stop"),
            ActionVerb::LoopOn => write!(f, "loop-on"),
            ActionVerb::LoopOff => write!(f, "loop-off"),
        }
    }
}

/// Item type tag carried on CC#3
///
/// `Song` is the implicit default and is never written to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemTypeCode {
    Song,
    Bible,
    Presentation,
    Media,
    Countdown,
    Youtube,
    Stopwatch,
    Clock,
    Announcement,
    Messages,
    AudioPlaylist,
}

impl ItemTypeCode {
    pub fn all() -> &'static [ItemTypeCode] {
        &[
            ItemTypeCode::Song,
            ItemTypeCode::Bible,
            ItemTypeCode::Presentation,
            ItemTypeCode::Media,
            ItemTypeCode::Countdown,
            ItemTypeCode::Youtube,
            ItemTypeCode::Stopwatch,
            ItemTypeCode::Clock,
            ItemTypeCode::Announcement,
            ItemTypeCode::Messages,
            ItemTypeCode::AudioPlaylist,
        ]
    }

    /// Controller value written to the file
    pub fn value(self) -> u8 {
        match self {
            ItemTypeCode::Song => 0,
            ItemTypeCode::Bible => 1,
            ItemTypeCode::Presentation => 2,
            ItemTypeCode::Media => 3,
            ItemTypeCode::Countdown => 4,
            ItemTypeCode::Youtube => 5,
            ItemTypeCode::Stopwatch => 6,
            ItemTypeCode::Clock => 7,
            ItemTypeCode::Announcement => 8,
            ItemTypeCode::Messages => 9,
            ItemTypeCode::AudioPlaylist => 10,
        }
    }

    /// Reverse mapping used by the importer and the decoder
    pub fn from_value(value: u8) -> Option<Self> {
        Self::all().iter().copied().find(|code| code.value() == value)
    }

    /// Song and bible items resolve against the full text library
    pub fn is_text_library(self) -> bool {
        matches!(self, ItemTypeCode::Song | ItemTypeCode::Bible)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemTypeCode::Song => "song",
            ItemTypeCode::Bible => "bible",
            ItemTypeCode::Presentation => "presentation",
            ItemTypeCode::Media => "media",
            ItemTypeCode::Countdown => "countdown",
            ItemTypeCode::Youtube => "youtube",
            ItemTypeCode::Stopwatch => "stopwatch",
            ItemTypeCode::Clock => "clock",
            ItemTypeCode::Announcement => "announcement",
            ItemTypeCode::Messages => "messages",
            ItemTypeCode::AudioPlaylist => "audioPlaylist",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ItemTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for code in ItemTypeCode::all() {
            assert_eq!(ItemTypeCode::from_value(code.value()), Some(*code));
            assert_eq!(ItemTypeCode::parse(code.as_str()), Some(*code));
        }
        assert_eq!(ItemTypeCode::from_value(11), None);
        assert_eq!(ItemTypeCode::from_value(127), None);
    }

    #[test]
    fn test_type_code_values_are_unique() {
        let mut values: Vec<u8> = ItemTypeCode::all().iter().map(|c| c.value()).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), ItemTypeCode::all().len());
    }

    #[test]
    fn test_action_notes_sit_above_blank_and_content() {
        for verb in ActionVerb::all() {
            let note = verb.note();
            assert!(note > BLANK_NOTE);
            assert!(u32::from(note) > MAX_CONTENT_INDEX);
            assert_eq!(ActionVerb::from_note(note), Some(*verb));
        }
        assert!(u32::from(BLANK_NOTE) > MAX_CONTENT_INDEX);
        assert_eq!(ActionVerb::from_note(BLANK_NOTE), None);
    }
}
