//! Item identity hashing
//!
//! Reduces an item's identity-defining content to a 28-bit fingerprint and
//! slices that fingerprint into two note events that survive generic MIDI
//! hardware. The resolver never inverts the notes: it recomputes them for
//! each candidate and compares equality.

use crate::protocol::ItemTypeCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field separator inside hash inputs (ASCII unit separator)
const FIELD_SEP: char = '\u{1f}';

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Fingerprint width after folding
pub const FINGERPRINT_BITS: u32 = 28;
const FINGERPRINT_MASK: u32 = (1 << FINGERPRINT_BITS) - 1;

/// Identity of a setlist item
///
/// Each variant carries exactly the content its hash input is built from,
/// plus the fields the payload needs to rebuild the item on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ItemIdentity {
    Song {
        title: String,
        #[serde(default)]
        slides: Vec<String>,
    },
    Bible {
        reference: String,
        #[serde(default)]
        verses: Vec<String>,
    },
    Presentation {
        title: String,
        #[serde(default)]
        slides: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_advance_seconds: Option<f64>,
    },
    Media {
        name: String,
        path: String,
    },
    Countdown {
        title: String,
        seconds: u64,
    },
    Youtube {
        title: String,
        video_id: String,
    },
    Stopwatch {
        title: String,
    },
    Clock {
        title: String,
        #[serde(default)]
        format: String,
    },
    Announcement {
        title: String,
        #[serde(default)]
        text: String,
    },
    Messages {
        title: String,
        #[serde(default)]
        messages: Vec<String>,
    },
    AudioPlaylist {
        name: String,
        #[serde(default)]
        tracks: Vec<String>,
    },
}

impl ItemIdentity {
    pub fn type_code(&self) -> ItemTypeCode {
        match self {
            ItemIdentity::Song { .. } => ItemTypeCode::Song,
            ItemIdentity::Bible { .. } => ItemTypeCode::Bible,
            ItemIdentity::Presentation { .. } => ItemTypeCode::Presentation,
            ItemIdentity::Media { .. } => ItemTypeCode::Media,
            ItemIdentity::Countdown { .. } => ItemTypeCode::Countdown,
            ItemIdentity::Youtube { .. } => ItemTypeCode::Youtube,
            ItemIdentity::Stopwatch { .. } => ItemTypeCode::Stopwatch,
            ItemIdentity::Clock { .. } => ItemTypeCode::Clock,
            ItemIdentity::Announcement { .. } => ItemTypeCode::Announcement,
            ItemIdentity::Messages { .. } => ItemTypeCode::Messages,
            ItemIdentity::AudioPlaylist { .. } => ItemTypeCode::AudioPlaylist,
        }
    }

    /// Human-readable name for logs and listings
    pub fn title(&self) -> &str {
        match self {
            ItemIdentity::Song { title, .. }
            | ItemIdentity::Presentation { title, .. }
            | ItemIdentity::Countdown { title, .. }
            | ItemIdentity::Youtube { title, .. }
            | ItemIdentity::Stopwatch { title }
            | ItemIdentity::Clock { title, .. }
            | ItemIdentity::Announcement { title, .. }
            | ItemIdentity::Messages { title, .. } => title,
            ItemIdentity::Bible { reference, .. } => reference,
            ItemIdentity::Media { name, .. } | ItemIdentity::AudioPlaylist { name, .. } => name,
        }
    }

    /// Number of addressable slides once the item is live
    pub fn slide_count(&self) -> usize {
        match self {
            ItemIdentity::Song { slides, .. } | ItemIdentity::Presentation { slides, .. } => {
                slides.len().max(1)
            }
            ItemIdentity::Bible { verses, .. } => verses.len().max(1),
            ItemIdentity::Messages { messages, .. } => messages.len().max(1),
            ItemIdentity::AudioPlaylist { tracks, .. } => tracks.len().max(1),
            _ => 1,
        }
    }

    /// Canonical hash input
    ///
    /// Pure function of identity-defining content: type tag, title and the
    /// variant's content fields, in declaration order.
    pub fn hash_input(&self) -> String {
        let mut fields: Vec<&str> = vec![self.type_code().as_str()];
        let normalized_path;
        match self {
            ItemIdentity::Song { title, slides } => {
                fields.push(title);
                fields.extend(slides.iter().map(String::as_str));
            }
            ItemIdentity::Bible { reference, verses } => {
                fields.push(reference);
                fields.extend(verses.iter().map(String::as_str));
            }
            // Presentations are identified by title alone; slide data may be re-rendered.
            ItemIdentity::Presentation { title, .. } => fields.push(title),
            ItemIdentity::Media { name, path } => {
                normalized_path = normalize_path(path);
                fields.push(name);
                fields.push(&normalized_path);
            }
            ItemIdentity::Countdown { title, seconds } => {
                fields.push(title);
                return join_with_number(fields, *seconds);
            }
            ItemIdentity::Youtube { title, video_id } => {
                fields.push(title);
                fields.push(video_id);
            }
            ItemIdentity::Stopwatch { title } => fields.push(title),
            ItemIdentity::Clock { title, format } => {
                fields.push(title);
                fields.push(format);
            }
            ItemIdentity::Announcement { title, text } => {
                fields.push(title);
                fields.push(text);
            }
            ItemIdentity::Messages { title, messages } => {
                fields.push(title);
                fields.extend(messages.iter().map(String::as_str));
            }
            ItemIdentity::AudioPlaylist { name, tracks } => {
                fields.push(name);
                fields.extend(tracks.iter().map(String::as_str));
            }
        }
        join_fields(&fields)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.hash_input())
    }

    pub fn identity_notes(&self) -> IdentityNotes {
        IdentityNotes::from(self.fingerprint())
    }
}

fn join_fields(fields: &[&str]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEP);
        }
        out.push_str(field);
    }
    out
}

fn join_with_number(fields: Vec<&str>, number: u64) -> String {
    let number = number.to_string();
    let mut all = fields;
    all.push(&number);
    join_fields(&all)
}

/// Path separators are unified so the same file hashes identically on every OS.
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 28-bit item fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u32);

impl Fingerprint {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:07x}", self.0)
    }
}

/// FNV-1a over the UTF-8 bytes of `input`, xor-folded to 28 bits
pub fn fingerprint(input: &str) -> Fingerprint {
    let hash = input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    });
    Fingerprint((hash & FINGERPRINT_MASK) ^ (hash >> FINGERPRINT_BITS))
}

/// One note-on carrying part of a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotePair {
    pub pitch: u8,
    pub velocity: u8,
}

/// Two identity note events derived from a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityNotes {
    pub first: NotePair,
    pub second: NotePair,
}

impl IdentityNotes {
    pub fn new(first: NotePair, second: NotePair) -> Self {
        Self { first, second }
    }

    pub fn pairs(&self) -> [NotePair; 2] {
        [self.first, self.second]
    }
}

/// Velocity 0 is a note-off on the wire, so velocities are mapped into 1..=127.
fn velocity_from_bits(bits: u32) -> u8 {
    (1 + bits % 127) as u8
}

impl From<Fingerprint> for IdentityNotes {
    fn from(fp: Fingerprint) -> Self {
        let v = fp.value();
        Self {
            first: NotePair {
                pitch: ((v >> 21) & 0x7f) as u8,
                velocity: velocity_from_bits((v >> 14) & 0x7f),
            },
            second: NotePair {
                pitch: ((v >> 7) & 0x7f) as u8,
                velocity: velocity_from_bits(v & 0x7f),
            },
        }
    }
}

impl fmt::Display for IdentityNotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}/{}",
            self.first.pitch, self.first.velocity, self.second.pitch, self.second.velocity
        )
    }
}
