//! Output drivers
//!
//! The resolver never touches a screen or a player directly: every side
//! effect it decides on is an [`OutputEffect`] delivered, in order, to each
//! registered driver.

use crate::resolver::OutputKind;
use crate::setlist::ItemId;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Side effect requested by the resolver
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEffect {
    /// Show a content slide of the selected item
    ShowSlide { item: ItemId, slide: u32 },
    /// Blank the output
    Clear,
    /// Hand the selected item's player to the output
    Engage { item: ItemId, kind: OutputKind },
    Play(OutputKind),
    Pause(OutputKind),
    Stop(OutputKind),
    SetLoop { kind: OutputKind, enabled: bool },
    /// Presentation auto-advance timer
    AutoAdvance { running: bool },
    /// Operator-facing message (unresolved identity, failed load)
    Notice(String),
}

impl fmt::Display for OutputEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputEffect::ShowSlide { item, slide } => write!(f, "show {} slide {}", item, slide),
            OutputEffect::Clear => write!(f, "clear"),
            OutputEffect::Engage { item, kind } => write!(f, "engage {} as {}", item, kind),
            OutputEffect::Play(kind) => write!(f, "play {}", kind),
            OutputEffect::Pause(kind) => write!(f, "pause {}", kind),
            OutputEffect::Stop(kind) => write!(f, "stop {}", kind),
            OutputEffect::SetLoop { kind, enabled } => {
                write!(f, "loop {} {}", kind, if *enabled { "on" } else { "off" })
            }
            OutputEffect::AutoAdvance { running } => {
                write!(f, "auto-advance {}", if *running { "start" } else { "stop" })
            }
            OutputEffect::Notice(text) => write!(f, "notice: {}", text),
        }
    }
}

/// Driver trait - all output integrations implement this
///
/// Note: All methods take &self (not &mut self) to support Arc<dyn OutputDriver>.
#[async_trait]
pub trait OutputDriver: Send + Sync {
    /// Get the driver name (e.g., "console")
    fn name(&self) -> &str;

    /// Initialize the driver (connect to the display, open players, etc.)
    async fn init(&self) -> Result<()>;

    /// Apply one effect
    async fn apply(&self, effect: &OutputEffect) -> Result<()>;

    /// Shutdown the driver gracefully
    async fn shutdown(&self) -> Result<()>;
}

pub mod console;

pub use console::ConsoleDriver;
