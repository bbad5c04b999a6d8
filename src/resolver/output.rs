//! Active output state machine
//!
//! Exactly one output kind is active at a time. Action verbs are dispatched
//! through [`ActiveOutput::apply`], a transition table keyed by the active
//! kind; combinations a kind does not support, and verbs that would not
//! change anything, are explicit no-ops.

use crate::drivers::OutputEffect;
use crate::protocol::ActionVerb;
use crate::setlist::ItemId;
use serde::Serialize;
use std::fmt;

/// Output an item presents through when selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    /// Slides only, no player
    None,
    Video,
    Image,
    Audio,
    Youtube,
    AutoplayingPresentation,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputKind::None => "none",
            OutputKind::Video => "video",
            OutputKind::Image => "image",
            OutputKind::Audio => "audio",
            OutputKind::Youtube => "youtube",
            OutputKind::AutoplayingPresentation => "presentation",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Currently engaged output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActiveOutput {
    #[default]
    Idle,
    Video { state: PlayState, looping: bool },
    Image,
    Audio { state: PlayState, looping: bool },
    Youtube { state: PlayState },
    /// `state` is the auto-advance timer
    Presentation { state: PlayState, looping: bool },
}

/// Result of dispatching one verb
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Apply(Vec<OutputEffect>),
    NoOp,
}

impl ActiveOutput {
    /// Freshly engaged output of `kind`, nothing running
    pub fn fresh(kind: OutputKind) -> Self {
        match kind {
            OutputKind::None => ActiveOutput::Idle,
            OutputKind::Video => ActiveOutput::Video {
                state: PlayState::Stopped,
                looping: false,
            },
            OutputKind::Image => ActiveOutput::Image,
            OutputKind::Audio => ActiveOutput::Audio {
                state: PlayState::Stopped,
                looping: false,
            },
            OutputKind::Youtube => ActiveOutput::Youtube {
                state: PlayState::Stopped,
            },
            OutputKind::AutoplayingPresentation => ActiveOutput::Presentation {
                state: PlayState::Stopped,
                looping: false,
            },
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            ActiveOutput::Idle => OutputKind::None,
            ActiveOutput::Video { .. } => OutputKind::Video,
            ActiveOutput::Image => OutputKind::Image,
            ActiveOutput::Audio { .. } => OutputKind::Audio,
            ActiveOutput::Youtube { .. } => OutputKind::Youtube,
            ActiveOutput::Presentation { .. } => OutputKind::AutoplayingPresentation,
        }
    }

    /// Effects that switch the current output fully off
    ///
    /// Loops and the auto-advance timer go first so a video loop and a
    /// presentation timer are never engaged together.
    pub fn teardown(&self) -> Vec<OutputEffect> {
        let mut effects = Vec::new();
        match *self {
            ActiveOutput::Idle | ActiveOutput::Image => {}
            ActiveOutput::Video { state, looping } | ActiveOutput::Audio { state, looping } => {
                let kind = self.kind();
                if looping {
                    effects.push(OutputEffect::SetLoop { kind, enabled: false });
                }
                if state != PlayState::Stopped {
                    effects.push(OutputEffect::Stop(kind));
                }
            }
            ActiveOutput::Youtube { state } => {
                if state != PlayState::Stopped {
                    effects.push(OutputEffect::Stop(OutputKind::Youtube));
                }
            }
            ActiveOutput::Presentation { state, looping } => {
                if state == PlayState::Playing {
                    effects.push(OutputEffect::AutoAdvance { running: false });
                }
                if looping {
                    effects.push(OutputEffect::SetLoop {
                        kind: OutputKind::AutoplayingPresentation,
                        enabled: false,
                    });
                }
            }
        }
        effects
    }

    /// Switch to a new item's output, tearing down the old one first
    pub fn engage(&mut self, item: ItemId, kind: OutputKind) -> Vec<OutputEffect> {
        let mut effects = self.teardown();
        if kind != OutputKind::None {
            effects.push(OutputEffect::Engage { item, kind });
        }
        *self = ActiveOutput::fresh(kind);
        effects
    }

    /// Dispatch an action verb against the active output
    pub fn apply(&mut self, verb: ActionVerb) -> Transition {
        let kind = self.kind();
        match self {
            ActiveOutput::Idle | ActiveOutput::Image => Transition::NoOp,

            ActiveOutput::Video { state, looping } | ActiveOutput::Audio { state, looping } => {
                match verb {
                    ActionVerb::LoopOn | ActionVerb::LoopOff => {
                        set_loop(looping, kind, verb == ActionVerb::LoopOn)
                    }
                    _ => player_verb(state, verb, kind),
                }
            }

            ActiveOutput::Youtube { state } => match verb {
                ActionVerb::LoopOn | ActionVerb::LoopOff => Transition::NoOp,
                _ => player_verb(state, verb, OutputKind::Youtube),
            },

            ActiveOutput::Presentation { state, looping } => match verb {
                ActionVerb::Activate if *state != PlayState::Playing => {
                    *state = PlayState::Playing;
                    Transition::Apply(vec![OutputEffect::AutoAdvance { running: true }])
                }
                ActionVerb::Pause if *state == PlayState::Playing => {
                    *state = PlayState::Paused;
                    Transition::Apply(vec![OutputEffect::AutoAdvance { running: false }])
                }
                ActionVerb::Stop if *state != PlayState::Stopped => {
                    let was_running = *state == PlayState::Playing;
                    *state = PlayState::Stopped;
                    if was_running {
                        Transition::Apply(vec![OutputEffect::AutoAdvance { running: false }])
                    } else {
                        Transition::Apply(Vec::new())
                    }
                }
                ActionVerb::LoopOn | ActionVerb::LoopOff => {
                    set_loop(looping, kind, verb == ActionVerb::LoopOn)
                }
                _ => Transition::NoOp,
            },
        }
    }
}

fn player_verb(state: &mut PlayState, verb: ActionVerb, kind: OutputKind) -> Transition {
    let (next, effect) = match (verb, *state) {
        (ActionVerb::Activate, PlayState::Stopped | PlayState::Paused) => {
            (PlayState::Playing, OutputEffect::Play(kind))
        }
        (ActionVerb::Pause, PlayState::Playing) => (PlayState::Paused, OutputEffect::Pause(kind)),
        (ActionVerb::Stop, PlayState::Playing | PlayState::Paused) => {
            (PlayState::Stopped, OutputEffect::Stop(kind))
        }
        _ => return Transition::NoOp,
    };
    *state = next;
    Transition::Apply(vec![effect])
}

fn set_loop(looping: &mut bool, kind: OutputKind, enabled: bool) -> Transition {
    if *looping == enabled {
        return Transition::NoOp;
    }
    *looping = enabled;
    Transition::Apply(vec![OutputEffect::SetLoop { kind, enabled }])
}
