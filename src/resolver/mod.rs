//! Command resolver / dispatcher
//!
//! Maps decoded cue commands onto setlist items and playback actions.
//!
//! [`Resolver`] is the synchronous core: it owns the setlist, the control
//! session and the active output, and turns each input into a [`Reaction`]
//! (effects to apply, asynchronous work to start, items to persist). The
//! [`ResolverActor`] runs it on a tokio task and feeds the results of the
//! asynchronous work back in as ordinary inputs, so every state change
//! happens on one logical thread in arrival order.
//!
//! `identifyByHash` resolution order (first match wins):
//!
//! 1. live setlist, restricted to the declared type when one is present
//! 2. declared song/bible (or no declared type): the full text library
//! 3. otherwise the setlist items of every non-text type
//! 4. outside the post-clear cooldown: external media and presentation stores
//! 5. the embedded payload, if its recomputed notes match
//!
//! Steps 2 and 4 run asynchronously and are epoch-guarded; a result that
//! arrives after a newer identify or a blank/stop is discarded.

pub mod actor;
pub mod handle;
pub mod output;
pub mod session;
pub mod warn;

#[cfg(test)]
mod tests;

use crate::decoder::{CueCommand, Direction};
use crate::drivers::OutputEffect;
use crate::encoder::CuePayload;
use crate::identity::{IdentityNotes, ItemIdentity};
use crate::library::{LoadedItem, SourceError};
use crate::protocol::{ActionVerb, ItemTypeCode};
use crate::setlist::{ItemId, Setlist, SetlistItem};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use actor::{ItemSources, ResolverActor, ResolverContext};
pub use handle::ResolverHandle;
pub use output::{ActiveOutput, OutputKind, PlayState, Transition};
pub use session::{ControlSession, Epoch, PendingSelection, PendingView};
pub use warn::WarningLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// External lookups are skipped this long after a blank/stop
    pub clear_cooldown: Duration,
    /// Minimum spacing of unresolved-identity warnings
    pub warning_interval: Duration,
    /// Per-source lookup and selection load timeout
    pub lookup_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            clear_cooldown: Duration::from_secs(3),
            warning_interval: Duration::from_secs(10),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// Source group an asynchronous lookup searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStage {
    TextLibrary,
    External,
}

/// Asynchronous identity lookup, returned with its result
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub epoch: Epoch,
    pub stage: LookupStage,
    pub notes: IdentityNotes,
    pub type_code: Option<ItemTypeCode>,
    pub payload: Option<Vec<u8>>,
}

/// Asynchronous work requested by the core
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Lookup(LookupRequest),
    Load(SetlistItem),
}

/// Everything one input produced
#[derive(Debug, Default, PartialEq)]
pub struct Reaction {
    pub effects: Vec<OutputEffect>,
    pub requests: Vec<Request>,
    /// Items appended to the setlist, to be persisted
    pub appended: Vec<SetlistItem>,
}

/// The loaded, presented item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub item: ItemId,
    pub slide: u32,
    pub slide_count: u32,
    pub blanked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverSnapshot {
    pub setlist: Vec<SetlistItem>,
    pub selection: Option<Selection>,
    pub pending: Option<PendingSelection>,
    pub output: ActiveOutput,
    pub epoch: Epoch,
    pub warnings_emitted: u64,
    pub warnings_suppressed: u64,
}

pub struct Resolver {
    config: ResolverConfig,
    setlist: Setlist,
    session: ControlSession,
    output: ActiveOutput,
    selection: Option<Selection>,
    warnings: WarningLimiter,
}

impl Resolver {
    pub fn new(config: ResolverConfig, setlist: Setlist) -> Self {
        Self {
            warnings: WarningLimiter::new(config.warning_interval),
            config,
            setlist,
            session: ControlSession::new(),
            output: ActiveOutput::Idle,
            selection: None,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ResolverConfig) {
        self.warnings.set_interval(config.warning_interval);
        self.config = config;
        info!(
            cooldown_ms = config.clear_cooldown.as_millis() as u64,
            warning_interval_ms = config.warning_interval.as_millis() as u64,
            lookup_timeout_ms = config.lookup_timeout.as_millis() as u64,
            "Resolver timings updated"
        );
    }

    pub fn setlist(&self) -> &Setlist {
        &self.setlist
    }

    pub fn session(&self) -> &ControlSession {
        &self.session
    }

    pub fn output(&self) -> ActiveOutput {
        self.output
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot {
            setlist: self.setlist.items().to_vec(),
            selection: self.selection,
            pending: self.session.pending(),
            output: self.output,
            epoch: self.session.epoch(),
            warnings_emitted: self.warnings.emitted(),
            warnings_suppressed: self.warnings.suppressed(),
        }
    }

    /// Handle one decoded command
    pub fn handle(&mut self, command: CueCommand, now: Instant) -> Reaction {
        let mut reaction = Reaction::default();
        match command {
            CueCommand::Navigate(direction) => self.navigate(direction, &mut reaction),
            CueCommand::Blank => self.blank(now, &mut reaction),
            CueCommand::Action(ActionVerb::Stop) => self.stop(now, &mut reaction),
            CueCommand::Action(verb) => self.dispatch_verb(verb, &mut reaction),
            CueCommand::IdentifyByHash {
                notes,
                type_code,
                payload,
            } => self.identify(notes, type_code, payload, now, &mut reaction),
        }
        reaction
    }

    /// Append an item chosen by the operator
    pub fn add_item(&mut self, identity: ItemIdentity) -> Reaction {
        let stored = self.setlist.append(identity).clone();
        info!("➕ Added '{}' to setlist as {}", stored.identity.title(), stored.id);
        Reaction {
            appended: vec![stored],
            ..Reaction::default()
        }
    }

    /// Select a setlist item; false when the id is unknown
    pub fn select(&mut self, id: ItemId, reaction: &mut Reaction) -> bool {
        let Some(item) = self.setlist.get(id) else {
            return false;
        };
        if self.session.pending().is_none() && self.selection.is_some_and(|s| s.item == id) {
            debug!(item = %id, "Item already selected");
            return true;
        }
        debug!(item = %id, title = item.identity.title(), "Selecting item");
        self.session.set_pending(id);
        reaction.requests.push(Request::Load(item.clone()));
        true
    }

    fn navigate(&mut self, direction: Direction, reaction: &mut Reaction) {
        if self.session.pending().is_some() {
            // Still loading: an explicit index becomes the first view
            if let Direction::Index(index) = direction {
                self.session.set_pending_view(PendingView::Slide(index));
            }
            return;
        }
        let Some(selection) = self.selection.as_mut() else {
            debug!(?direction, "Navigation ignored, nothing selected");
            return;
        };

        let target = match direction {
            Direction::Next => selection.slide + 1,
            Direction::Prev => match selection.slide.checked_sub(1) {
                Some(prev) => prev,
                None => return,
            },
            Direction::Index(index) => index,
        };
        if target >= selection.slide_count {
            debug!(target, slide_count = selection.slide_count, "Navigation past last slide ignored");
            return;
        }
        if target == selection.slide && !selection.blanked {
            return;
        }

        selection.slide = target;
        selection.blanked = false;
        reaction.effects.push(OutputEffect::ShowSlide {
            item: selection.item,
            slide: target,
        });
    }

    fn blank(&mut self, now: Instant, reaction: &mut Reaction) {
        self.session.mark_cleared(now);
        if self.session.set_pending_view(PendingView::Blank) {
            debug!("Pending selection will land blank");
        }
        if let Some(selection) = self.selection.as_mut() {
            if selection.blanked {
                return;
            }
            selection.blanked = true;
        }
        reaction.effects.push(OutputEffect::Clear);
    }

    fn stop(&mut self, now: Instant, reaction: &mut Reaction) {
        self.session.mark_cleared(now);
        if let Some(pending) = self.session.clear_pending() {
            debug!(item = %pending.item, "Stop cancelled pending selection");
        }
        self.dispatch_verb(ActionVerb::Stop, reaction);
    }

    fn dispatch_verb(&mut self, verb: ActionVerb, reaction: &mut Reaction) {
        match self.output.apply(verb) {
            Transition::Apply(effects) => reaction.effects.extend(effects),
            Transition::NoOp => {
                debug!(%verb, output = %self.output.kind(), "Action has no effect on active output")
            }
        }
    }

    fn identify(
        &mut self,
        notes: IdentityNotes,
        type_code: Option<ItemTypeCode>,
        payload: Option<Vec<u8>>,
        now: Instant,
        reaction: &mut Reaction,
    ) {
        let epoch = self.session.begin_identify();
        debug!(%notes, ?type_code, identity_gen = epoch.identity_gen, "Identify by hash");

        let in_setlist = self
            .setlist
            .find_by_notes(&notes, |t| type_code.map_or(true, |declared| declared == t))
            .map(|item| item.id);
        if let Some(id) = in_setlist {
            self.select(id, reaction);
            return;
        }

        let mut lookup = LookupRequest {
            epoch,
            stage: LookupStage::TextLibrary,
            notes,
            type_code,
            payload,
        };

        if type_code.unwrap_or(ItemTypeCode::Song).is_text_library() {
            reaction.requests.push(Request::Lookup(lookup));
            return;
        }

        let other_type = self
            .setlist
            .find_by_notes(&notes, |t| !t.is_text_library())
            .map(|item| item.id);
        if let Some(id) = other_type {
            self.select(id, reaction);
            return;
        }

        if self.session.in_cooldown(now, self.config.clear_cooldown) {
            debug!(%notes, "Identify inside clear cooldown, external lookup skipped");
            return;
        }
        lookup.stage = LookupStage::External;
        reaction.requests.push(Request::Lookup(lookup));
    }

    /// Apply the result of an asynchronous lookup
    pub fn complete_lookup(
        &mut self,
        request: LookupRequest,
        found: Option<ItemIdentity>,
        now: Instant,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        if !self.session.is_current(request.epoch) {
            debug!(
                stale = ?request.epoch,
                current = ?self.session.epoch(),
                "Discarding stale lookup result"
            );
            return reaction;
        }

        let (identity, payload) = match found {
            Some(identity) => (identity, None),
            None => match payload_item(&request) {
                Some(payload) => (payload.item.clone(), Some(payload)),
                None => {
                    self.unresolved(&request, now, &mut reaction);
                    return reaction;
                }
            },
        };

        let stored = self.setlist.append(identity);
        if let Some(payload) = payload {
            stored.background = payload.background;
            stored.media_duration_seconds = payload.media_duration_seconds;
        }
        let stored = stored.clone();
        info!(
            "➕ Auto-imported '{}' ({}) into setlist as {}",
            stored.identity.title(),
            stored.type_code(),
            stored.id
        );
        let id = stored.id;
        reaction.appended.push(stored);
        self.select(id, &mut reaction);
        reaction
    }

    /// Apply a finished selection load if it is still the pending selection
    pub fn complete_load(
        &mut self,
        item: ItemId,
        result: Result<LoadedItem, SourceError>,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        let Some(pending) = self.session.take_pending_if(item) else {
            debug!(%item, "Discarding superseded selection load");
            return reaction;
        };

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load {}: {}", item, e);
                reaction
                    .effects
                    .push(OutputEffect::Notice(format!("Failed to load {}: {}", item, e)));
                return reaction;
            }
        };

        reaction.effects.extend(self.output.engage(item, loaded.output));
        let slide_count = loaded.slide_count.max(1) as u32;
        let (slide, blanked) = match pending.view {
            PendingView::Slide(index) if index < slide_count => (index, false),
            PendingView::Slide(_) => (0, false),
            PendingView::Blank => (0, true),
        };
        self.selection = Some(Selection {
            item,
            slide,
            slide_count,
            blanked,
        });
        reaction.effects.push(if blanked {
            OutputEffect::Clear
        } else {
            OutputEffect::ShowSlide { item, slide }
        });
        info!(%item, slide, output = %loaded.output, "🎯 Item selected");
        reaction
    }

    fn unresolved(&mut self, request: &LookupRequest, now: Instant, reaction: &mut Reaction) {
        if !self.warnings.allow(now) {
            debug!(notes = %request.notes, "Unresolved identity (warning suppressed)");
            return;
        }
        let declared = request
            .type_code
            .map(|t| t.to_string())
            .unwrap_or_else(|| "untyped".to_string());
        let text = format!("No item matches identity {} ({})", request.notes, declared);
        warn!("⚠️  {}", text);
        reaction.effects.push(OutputEffect::Notice(text));
    }
}

/// Payload item usable for reconstruction, if any
fn payload_item(request: &LookupRequest) -> Option<CuePayload> {
    let bytes = request.payload.as_deref()?;
    match CuePayload::parse(bytes) {
        Ok(payload) if payload.item.identity_notes() == request.notes => Some(payload),
        Ok(_) => {
            warn!("Cue payload does not match its identity notes, ignoring");
            None
        }
        Err(e) => {
            warn!("Ignoring cue payload: {}", e);
            None
        }
    }
}
