//! MidiCue GW - MIDI cue protocol gateway
//!
//! Exports show timelines (slide cues recorded against a media item) as
//! Standard MIDI Files that identify the item they belong to, and resolves
//! incoming cue triggers against a live setlist.

pub mod cli;
pub mod config;
pub mod cue;
pub mod decoder;
pub mod drivers;
pub mod encoder;
pub mod identity;
pub mod import;
pub mod library;
pub mod midi;
pub mod paths;
pub mod protocol;
pub mod recorder;
pub mod resolver;
pub mod setlist;
