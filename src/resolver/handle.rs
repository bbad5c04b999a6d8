//! ResolverHandle - public API for the ResolverActor
//!
//! Fire-and-forget methods for the command path, async methods with oneshot
//! channels for queries.

use super::actor::ResolverMessage;
use super::{ResolverConfig, ResolverSnapshot};
use crate::decoder::CueCommand;
use crate::identity::ItemIdentity;
use crate::setlist::ItemId;
use tokio::sync::{mpsc, oneshot};

/// Cloneable handle to a running resolver
#[derive(Clone)]
pub struct ResolverHandle {
    cmd_tx: mpsc::UnboundedSender<ResolverMessage>,
}

impl ResolverHandle {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<ResolverMessage>) -> Self {
        Self { cmd_tx }
    }

    // =========================================================================
    // Command path (fire-and-forget)
    // =========================================================================

    /// Queue a decoded command; never waits for lookups it starts
    pub fn send(&self, command: CueCommand) {
        let _ = self.cmd_tx.send(ResolverMessage::Command(command));
    }

    pub fn update_config(&self, config: ResolverConfig) {
        let _ = self.cmd_tx.send(ResolverMessage::UpdateConfig(config));
    }

    // =========================================================================
    // Queries (async with response)
    // =========================================================================

    /// Select a setlist item; false when the id is unknown or the actor is gone
    pub async fn select(&self, item: ItemId) -> bool {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(ResolverMessage::Select { item, response }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Append an item to the setlist and persist it
    pub async fn add_item(&self, identity: ItemIdentity) -> Option<ItemId> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx
            .send(ResolverMessage::AddItem { identity, response })
            .ok()?;
        rx.await.ok()
    }

    pub async fn snapshot(&self) -> Option<ResolverSnapshot> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx.send(ResolverMessage::Snapshot(response)).ok()?;
        rx.await.ok()
    }

    /// Wait until every earlier command and the lookups and loads it started are applied
    pub async fn flush(&self) {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(ResolverMessage::Flush(response)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop the actor and shut its drivers down
    pub async fn shutdown(&self) {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(ResolverMessage::Shutdown(response)).is_ok() {
            let _ = rx.await;
        }
    }
}
