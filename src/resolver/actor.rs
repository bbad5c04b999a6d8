//! ResolverActor - runs the resolver core on a tokio task
//!
//! All state lives on the actor. Lookups and selection loads are spawned as
//! separate tasks that never block later commands; their results come back
//! through the actor's own channel and are applied (or discarded as stale)
//! in arrival order.

use super::handle::ResolverHandle;
use super::{LookupRequest, LookupStage, Reaction, Request, Resolver, ResolverConfig};
use crate::decoder::CueCommand;
use crate::drivers::OutputDriver;
use crate::identity::{IdentityNotes, ItemIdentity};
use crate::library::{ItemLoader, ItemSource, LoadedItem, SourceError};
use crate::protocol::ItemTypeCode;
use crate::setlist::{ItemId, SetlistStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Messages processed by the ResolverActor
pub enum ResolverMessage {
    Command(CueCommand),
    Select {
        item: ItemId,
        response: oneshot::Sender<bool>,
    },
    AddItem {
        identity: ItemIdentity,
        response: oneshot::Sender<ItemId>,
    },
    LookupDone {
        request: LookupRequest,
        found: Option<ItemIdentity>,
    },
    LoadDone {
        item: ItemId,
        result: Result<LoadedItem, SourceError>,
    },
    UpdateConfig(ResolverConfig),
    Snapshot(oneshot::Sender<super::ResolverSnapshot>),
    /// Answered once no lookup or load is in flight
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Source groups searched by asynchronous lookups, in search order
#[derive(Default, Clone)]
pub struct ItemSources {
    /// Full song/bible library
    pub text: Vec<Arc<dyn ItemSource>>,
    /// External media library and presentation store
    pub external: Vec<Arc<dyn ItemSource>>,
}

impl ItemSources {
    fn for_lookup(&self, request: &LookupRequest) -> Vec<Arc<dyn ItemSource>> {
        let group = match request.stage {
            LookupStage::TextLibrary => &self.text,
            LookupStage::External => &self.external,
        };
        let wanted = request.type_code.unwrap_or(ItemTypeCode::Song);
        group.iter().filter(|s| s.serves(wanted)).cloned().collect()
    }
}

/// Collaborators the actor drives
pub struct ResolverContext {
    pub sources: ItemSources,
    pub loader: Arc<dyn ItemLoader>,
    pub drivers: Vec<Arc<dyn OutputDriver>>,
    pub store: Option<SetlistStore>,
}

pub struct ResolverActor {
    resolver: Resolver,
    sources: ItemSources,
    loader: Arc<dyn ItemLoader>,
    drivers: Vec<Arc<dyn OutputDriver>>,
    store: Option<SetlistStore>,
    rx: mpsc::UnboundedReceiver<ResolverMessage>,
    /// Weak so the actor stops once every handle is dropped
    tx: mpsc::WeakUnboundedSender<ResolverMessage>,
    in_flight: usize,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl ResolverActor {
    /// Spawn the actor and return a handle for interacting with it
    pub fn spawn(resolver: Resolver, ctx: ResolverContext) -> ResolverHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = ResolverActor {
            resolver,
            sources: ctx.sources,
            loader: ctx.loader,
            drivers: ctx.drivers,
            store: ctx.store,
            rx,
            tx: tx.downgrade(),
            in_flight: 0,
            flush_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());
        ResolverHandle::new(tx)
    }

    async fn run(mut self) {
        info!(
            "🎛️  Resolver started ({} setlist item(s), {} driver(s))",
            self.resolver.setlist().len(),
            self.drivers.len()
        );
        let mut shutdown_ack = None;

        while let Some(msg) = self.rx.recv().await {
            match msg {
                ResolverMessage::Command(command) => {
                    debug!(?command, "Resolver command");
                    let reaction = self.resolver.handle(command, Instant::now());
                    self.apply(reaction).await;
                }
                ResolverMessage::Select { item, response } => {
                    let mut reaction = Reaction::default();
                    let known = self.resolver.select(item, &mut reaction);
                    self.apply(reaction).await;
                    let _ = response.send(known);
                }
                ResolverMessage::AddItem { identity, response } => {
                    let reaction = self.resolver.add_item(identity);
                    let id = reaction.appended.first().map(|item| item.id);
                    self.apply(reaction).await;
                    if let Some(id) = id {
                        let _ = response.send(id);
                    }
                }
                ResolverMessage::LookupDone { request, found } => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    let reaction = self.resolver.complete_lookup(request, found, Instant::now());
                    self.apply(reaction).await;
                }
                ResolverMessage::LoadDone { item, result } => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    let reaction = self.resolver.complete_load(item, result);
                    self.apply(reaction).await;
                }
                ResolverMessage::UpdateConfig(config) => self.resolver.set_config(config),
                ResolverMessage::Snapshot(response) => {
                    let _ = response.send(self.resolver.snapshot());
                }
                ResolverMessage::Flush(response) => self.flush_waiters.push(response),
                ResolverMessage::Shutdown(response) => {
                    shutdown_ack = Some(response);
                    break;
                }
            }

            if self.in_flight == 0 {
                for waiter in self.flush_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }

        for driver in &self.drivers {
            if let Err(e) = driver.shutdown().await {
                warn!("Driver '{}' shutdown failed: {:#}", driver.name(), e);
            }
        }
        // Release the database before acknowledging so it can be reopened
        self.store = None;
        info!("Resolver stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    async fn apply(&mut self, reaction: Reaction) {
        if let Some(store) = &self.store {
            for item in &reaction.appended {
                if let Err(e) = store.put(item) {
                    warn!("Failed to persist setlist item {}: {:#}", item.id, e);
                }
            }
        }

        for effect in &reaction.effects {
            for driver in &self.drivers {
                if let Err(e) = driver.apply(effect).await {
                    warn!("Driver '{}' failed to apply {}: {:#}", driver.name(), effect, e);
                }
            }
        }

        for request in reaction.requests {
            self.spawn_request(request);
        }
    }

    fn spawn_request(&mut self, request: Request) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let timeout = self.resolver.config().lookup_timeout;
        self.in_flight += 1;

        match request {
            Request::Lookup(lookup) => {
                let sources = self.sources.for_lookup(&lookup);
                debug!(stage = ?lookup.stage, sources = sources.len(), "Starting identity lookup");
                tokio::spawn(async move {
                    let found = search(&sources, &lookup.notes, timeout).await;
                    let _ = tx.send(ResolverMessage::LookupDone {
                        request: lookup,
                        found,
                    });
                });
            }
            Request::Load(item) => {
                let loader = self.loader.clone();
                tokio::spawn(async move {
                    let result = match tokio::time::timeout(timeout, loader.load(&item)).await {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Unavailable(format!(
                            "loading {} timed out",
                            item.id
                        ))),
                    };
                    let _ = tx.send(ResolverMessage::LoadDone {
                        item: item.id,
                        result,
                    });
                });
            }
        }
    }
}

/// Query sources in order; errors and timeouts count as not found
async fn search(
    sources: &[Arc<dyn ItemSource>],
    notes: &IdentityNotes,
    timeout: Duration,
) -> Option<ItemIdentity> {
    for source in sources {
        match tokio::time::timeout(timeout, source.find(notes)).await {
            Ok(Ok(Some(item))) => {
                debug!(source = source.name(), title = item.title(), "Identity resolved");
                return Some(item);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!("Lookup in '{}' failed: {}", source.name(), e),
            Err(_) => warn!("Lookup in '{}' timed out after {:?}", source.name(), timeout),
        }
    }
    None
}
