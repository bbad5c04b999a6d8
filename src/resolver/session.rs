//! Control session state
//!
//! Generation counters stand in for cancellable tasks: an asynchronous
//! lookup captures the epoch when it starts and its result is applied only
//! if nothing newer happened meanwhile.

use crate::setlist::ItemId;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Generations captured when an asynchronous lookup starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Epoch {
    pub identity_gen: u64,
    pub clear_gen: u64,
}

/// How a pending selection should land once loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PendingView {
    Slide(u32),
    /// A blank arrived while loading; engage the item but keep the output clear
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSelection {
    pub item: ItemId,
    pub view: PendingView,
}

#[derive(Debug, Default)]
pub struct ControlSession {
    identity_gen: u64,
    clear_gen: u64,
    last_cleared_at: Option<Instant>,
    pending: Option<PendingSelection>,
}

impl ControlSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> Epoch {
        Epoch {
            identity_gen: self.identity_gen,
            clear_gen: self.clear_gen,
        }
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch() == epoch
    }

    /// Start a new identify event, invalidating every older one
    pub fn begin_identify(&mut self) -> Epoch {
        self.identity_gen += 1;
        self.epoch()
    }

    /// Record a blank/stop, invalidating in-flight lookups
    pub fn mark_cleared(&mut self, now: Instant) {
        self.clear_gen += 1;
        self.last_cleared_at = Some(now);
    }

    /// True while external lookups are suppressed after a blank/stop
    pub fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_cleared_at
            .is_some_and(|at| now.saturating_duration_since(at) < cooldown)
    }

    pub fn pending(&self) -> Option<PendingSelection> {
        self.pending
    }

    pub fn set_pending(&mut self, item: ItemId) {
        self.pending = Some(PendingSelection {
            item,
            view: PendingView::Slide(0),
        });
    }

    /// Redirect the pending selection's first view; false when nothing is pending
    pub fn set_pending_view(&mut self, view: PendingView) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.view = view;
                true
            }
            None => false,
        }
    }

    /// Take the pending selection if it is still `item`
    pub fn take_pending_if(&mut self, item: ItemId) -> Option<PendingSelection> {
        if self.pending.is_some_and(|p| p.item == item) {
            self.pending.take()
        } else {
            None
        }
    }

    pub fn clear_pending(&mut self) -> Option<PendingSelection> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_changes_on_identify_and_clear() {
        let mut session = ControlSession::new();
        let first = session.begin_identify();
        assert!(session.is_current(first));

        let second = session.begin_identify();
        assert!(!session.is_current(first));

        session.mark_cleared(Instant::now());
        assert!(!session.is_current(second));
    }

    #[test]
    fn test_cooldown_window() {
        let mut session = ControlSession::new();
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(3);
        assert!(!session.in_cooldown(t0, cooldown));

        session.mark_cleared(t0);
        assert!(session.in_cooldown(t0 + Duration::from_millis(2999), cooldown));
        assert!(!session.in_cooldown(t0 + Duration::from_secs(3), cooldown));
    }

    #[test]
    fn test_pending_guard() {
        let mut session = ControlSession::new();
        session.set_pending(ItemId(1));
        session.set_pending(ItemId(2));
        assert_eq!(session.take_pending_if(ItemId(1)), None);
        assert!(session.set_pending_view(PendingView::Blank));
        assert_eq!(
            session.take_pending_if(ItemId(2)),
            Some(PendingSelection {
                item: ItemId(2),
                view: PendingView::Blank
            })
        );
        assert!(!session.set_pending_view(PendingView::Slide(3)));
    }
}
