//! Tests for the resolver core and actor

use super::*;
use crate::drivers::OutputDriver;
use crate::library::loader::output_kind;
use crate::library::{ItemLoader, ItemSource};
use crate::setlist::SetlistStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

fn song(title: &str, slides: usize) -> ItemIdentity {
    ItemIdentity::Song {
        title: title.into(),
        slides: (0..slides).map(|i| format!("{} {}", title, i)).collect(),
    }
}

fn video(name: &str) -> ItemIdentity {
    ItemIdentity::Media {
        name: name.into(),
        path: format!("/media/{}.mp4", name),
    }
}

fn autoplay(title: &str) -> ItemIdentity {
    ItemIdentity::Presentation {
        title: title.into(),
        slides: vec!["one".into(), "two".into()],
        auto_advance_seconds: Some(5.0),
    }
}

fn youtube(title: &str) -> ItemIdentity {
    ItemIdentity::Youtube {
        title: title.into(),
        video_id: "dQw4w9WgXcQ".into(),
    }
}

fn identify(item: &ItemIdentity, type_code: Option<ItemTypeCode>) -> CueCommand {
    CueCommand::identify(item.identity_notes(), type_code)
}

fn typed_identify(item: &ItemIdentity) -> CueCommand {
    identify(item, Some(item.type_code()))
}

fn resolver_with(items: &[ItemIdentity]) -> Resolver {
    let mut setlist = Setlist::new();
    for item in items {
        setlist.append(item.clone());
    }
    Resolver::new(ResolverConfig::default(), setlist)
}

fn lookups(reaction: &Reaction) -> Vec<LookupRequest> {
    reaction
        .requests
        .iter()
        .filter_map(|r| match r {
            Request::Lookup(l) => Some(l.clone()),
            Request::Load(_) => None,
        })
        .collect()
}

fn loads(reaction: &Reaction) -> Vec<SetlistItem> {
    reaction
        .requests
        .iter()
        .filter_map(|r| match r {
            Request::Load(item) => Some(item.clone()),
            Request::Lookup(_) => None,
        })
        .collect()
}

fn loaded_for(item: &SetlistItem) -> Result<LoadedItem, SourceError> {
    Ok(LoadedItem {
        slide_count: item.identity.slide_count(),
        output: output_kind(&item.identity),
    })
}

/// Select `index` and complete its load
fn select_and_load(resolver: &mut Resolver, index: usize) -> Reaction {
    let id = resolver.setlist().items()[index].id;
    let mut reaction = Reaction::default();
    assert!(resolver.select(id, &mut reaction));
    let item = loads(&reaction).remove(0);
    resolver.complete_load(id, loaded_for(&item))
}

fn notices(reaction: &Reaction) -> usize {
    reaction
        .effects
        .iter()
        .filter(|e| matches!(e, OutputEffect::Notice(_)))
        .count()
}

// ============================================================================
// Core: identify resolution order
// ============================================================================

#[test]
fn test_setlist_hit_wins_over_external_lookup() {
    let clip = video("intro");
    let mut resolver = resolver_with(&[song("A", 2), clip.clone()]);

    let reaction = resolver.handle(typed_identify(&clip), Instant::now());
    assert!(lookups(&reaction).is_empty());
    let load = loads(&reaction);
    assert_eq!(load.len(), 1);
    assert_eq!(load[0].identity, clip);
    assert_eq!(resolver.session().pending().map(|p| p.item), Some(load[0].id));
}

#[test]
fn test_untyped_identify_searches_whole_setlist_then_text_library() {
    let clip = video("intro");
    let mut resolver = resolver_with(&[clip.clone()]);

    // no type code: step 1 is unrestricted
    let reaction = resolver.handle(identify(&clip, None), Instant::now());
    assert_eq!(loads(&reaction)[0].identity, clip);

    // miss: the song branch goes to the text library
    let reaction = resolver.handle(identify(&song("Unknown", 1), None), Instant::now());
    let requests = lookups(&reaction);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].stage, LookupStage::TextLibrary);
}

#[test]
fn test_declared_type_restricts_first_search() {
    let hymn = song("Hymn", 3);
    let mut resolver = resolver_with(&[hymn.clone()]);

    // notes of a setlist song, but declared as media: no text items are considered
    let reaction = resolver.handle(identify(&hymn, Some(ItemTypeCode::Media)), Instant::now());
    assert!(loads(&reaction).is_empty());
    let requests = lookups(&reaction);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].stage, LookupStage::External);
}

#[test]
fn test_other_setlist_types_searched_before_external() {
    let clip = youtube("Walk-in");
    let mut resolver = resolver_with(&[clip.clone()]);

    // declared type disagrees with the setlist item, step 3 still finds it
    let reaction = resolver.handle(identify(&clip, Some(ItemTypeCode::Media)), Instant::now());
    assert!(lookups(&reaction).is_empty());
    assert_eq!(loads(&reaction)[0].identity, clip);
}

#[test]
fn test_cooldown_skips_external_lookup_silently() {
    let mut resolver = resolver_with(&[]);
    let t0 = Instant::now();
    let clip = video("late");

    resolver.handle(CueCommand::Blank, t0);
    let reaction = resolver.handle(typed_identify(&clip), t0 + Duration::from_secs(1));
    assert!(reaction.requests.is_empty());
    assert!(reaction.effects.is_empty());

    let reaction = resolver.handle(typed_identify(&clip), t0 + Duration::from_secs(3));
    assert_eq!(lookups(&reaction)[0].stage, LookupStage::External);
}

#[test]
fn test_stop_also_starts_cooldown() {
    let mut resolver = resolver_with(&[]);
    let t0 = Instant::now();
    resolver.handle(CueCommand::Action(ActionVerb::Stop), t0);
    let reaction = resolver.handle(typed_identify(&video("x")), t0 + Duration::from_millis(500));
    assert!(reaction.requests.is_empty());
}

#[test]
fn test_text_library_lookup_ignores_cooldown() {
    let mut resolver = resolver_with(&[]);
    let t0 = Instant::now();
    resolver.handle(CueCommand::Blank, t0);
    let reaction = resolver.handle(typed_identify(&song("Hymn", 1)), t0);
    assert_eq!(lookups(&reaction)[0].stage, LookupStage::TextLibrary);
}

// ============================================================================
// Core: epoch cancellation
// ============================================================================

#[test]
fn test_newer_identify_invalidates_older_lookup() {
    let mut resolver = resolver_with(&[]);
    let now = Instant::now();
    let first = video("first");
    let second = video("second");

    let stale = lookups(&resolver.handle(typed_identify(&first), now)).remove(0);
    let current = lookups(&resolver.handle(typed_identify(&second), now)).remove(0);

    let reaction = resolver.complete_lookup(stale, Some(first), now);
    assert_eq!(reaction, Reaction::default());
    assert!(resolver.setlist().is_empty());

    let reaction = resolver.complete_lookup(current, Some(second.clone()), now);
    assert_eq!(reaction.appended.len(), 1);
    assert_eq!(resolver.setlist().items()[0].identity, second);
}

#[test]
fn test_blank_invalidates_in_flight_lookup() {
    let mut resolver = resolver_with(&[]);
    let now = Instant::now();
    let hymn = song("Hymn", 2);

    let request = lookups(&resolver.handle(typed_identify(&hymn), now)).remove(0);
    resolver.handle(CueCommand::Blank, now);

    let reaction = resolver.complete_lookup(request, Some(hymn), now);
    assert!(reaction.effects.is_empty());
    assert!(reaction.appended.is_empty());
    assert!(resolver.setlist().is_empty());
}

#[test]
fn test_lookup_hit_appends_selects_and_shows() {
    let mut resolver = resolver_with(&[song("Existing", 1)]);
    let now = Instant::now();
    let hymn = song("Hymn", 2);

    let request = lookups(&resolver.handle(typed_identify(&hymn), now)).remove(0);
    let reaction = resolver.complete_lookup(request, Some(hymn.clone()), now);
    assert_eq!(reaction.appended.len(), 1);
    let stored = reaction.appended[0].clone();
    assert_eq!(resolver.setlist().position(stored.id), Some(1));

    let load = loads(&reaction).remove(0);
    let reaction = resolver.complete_load(load.id, loaded_for(&load));
    assert_eq!(
        reaction.effects,
        vec![OutputEffect::ShowSlide {
            item: stored.id,
            slide: 0
        }]
    );
    assert_eq!(resolver.selection().map(|s| s.slide_count), Some(2));
}

// ============================================================================
// Core: warnings and payload reconstruction
// ============================================================================

#[test]
fn test_three_unresolved_identifies_warn_once() {
    let mut resolver = resolver_with(&[]);
    let t0 = Instant::now();
    let mut total = 0;

    for i in 0..3 {
        let at = t0 + Duration::from_secs(i * 3);
        let request = lookups(&resolver.handle(typed_identify(&song("Ghost", 1)), at)).remove(0);
        total += notices(&resolver.complete_lookup(request, None, at));
    }
    assert_eq!(total, 1);

    let at = t0 + Duration::from_secs(11);
    let request = lookups(&resolver.handle(typed_identify(&song("Ghost", 1)), at)).remove(0);
    assert_eq!(notices(&resolver.complete_lookup(request, None, at)), 1);
    assert_eq!(resolver.snapshot().warnings_suppressed, 2);
}

#[test]
fn test_payload_reconstructs_item_when_libraries_miss() {
    let mut resolver = resolver_with(&[]);
    let now = Instant::now();
    let deck = autoplay("Welcome");
    let payload = CuePayload::new(deck.clone())
        .with_background(Some("loops/waves.mp4".into()))
        .to_bytes()
        .unwrap();

    let command = CueCommand::IdentifyByHash {
        notes: deck.identity_notes(),
        type_code: Some(ItemTypeCode::Presentation),
        payload: Some(payload),
    };
    let request = lookups(&resolver.handle(command, now)).remove(0);
    let reaction = resolver.complete_lookup(request, None, now);

    assert_eq!(notices(&reaction), 0);
    assert_eq!(reaction.appended.len(), 1);
    assert_eq!(reaction.appended[0].identity, deck);
    assert_eq!(reaction.appended[0].background.as_deref(), Some("loops/waves.mp4"));
    assert_eq!(loads(&reaction).len(), 1);
}

#[test]
fn test_malformed_or_foreign_payload_still_warns() {
    let mut resolver = resolver_with(&[]);
    let now = Instant::now();
    let target = video("target");
    let foreign = CuePayload::new(video("other")).to_bytes().unwrap();

    for payload in [b"{broken".to_vec(), foreign] {
        let command = CueCommand::IdentifyByHash {
            notes: target.identity_notes(),
            type_code: Some(ItemTypeCode::Media),
            payload: Some(payload),
        };
        let request = lookups(&resolver.handle(command, now)).remove(0);
        let reaction = resolver.complete_lookup(request, None, now);
        assert!(reaction.appended.is_empty());
    }
    assert!(resolver.setlist().is_empty());
    assert_eq!(resolver.snapshot().warnings_emitted, 1);
}

// ============================================================================
// Core: selection guard and navigation
// ============================================================================

#[test]
fn test_superseded_load_is_discarded() {
    let mut resolver = resolver_with(&[song("A", 2), song("B", 2)]);
    let a = resolver.setlist().items()[0].clone();
    let b = resolver.setlist().items()[1].clone();

    let mut reaction = Reaction::default();
    resolver.select(a.id, &mut reaction);
    resolver.select(b.id, &mut reaction);

    assert_eq!(resolver.complete_load(a.id, loaded_for(&a)), Reaction::default());
    let reaction = resolver.complete_load(b.id, loaded_for(&b));
    assert_eq!(
        reaction.effects,
        vec![OutputEffect::ShowSlide { item: b.id, slide: 0 }]
    );
    assert_eq!(resolver.selection().map(|s| s.item), Some(b.id));
}

#[test]
fn test_blank_during_load_lands_cleared() {
    let mut resolver = resolver_with(&[song("A", 2)]);
    let a = resolver.setlist().items()[0].clone();
    let mut reaction = Reaction::default();
    resolver.select(a.id, &mut reaction);

    resolver.handle(CueCommand::Blank, Instant::now());
    let reaction = resolver.complete_load(a.id, loaded_for(&a));
    assert_eq!(reaction.effects, vec![OutputEffect::Clear]);
    assert!(resolver.selection().is_some_and(|s| s.blanked));
}

#[test]
fn test_stop_during_load_cancels_selection() {
    let mut resolver = resolver_with(&[song("A", 2)]);
    let a = resolver.setlist().items()[0].clone();
    let mut reaction = Reaction::default();
    resolver.select(a.id, &mut reaction);

    resolver.handle(CueCommand::Action(ActionVerb::Stop), Instant::now());
    assert_eq!(resolver.complete_load(a.id, loaded_for(&a)), Reaction::default());
    assert!(resolver.selection().is_none());
}

#[test]
fn test_navigation_within_selected_item() {
    let mut resolver = resolver_with(&[song("A", 3)]);
    select_and_load(&mut resolver, 0);
    let id = resolver.setlist().items()[0].id;
    let now = Instant::now();

    let show = |slide| vec![OutputEffect::ShowSlide { item: id, slide }];
    assert_eq!(resolver.handle(CueCommand::Navigate(Direction::Index(2)), now).effects, show(2));
    assert!(resolver.handle(CueCommand::Navigate(Direction::Index(5)), now).effects.is_empty());
    assert!(resolver.handle(CueCommand::Navigate(Direction::Next), now).effects.is_empty());
    assert_eq!(resolver.handle(CueCommand::Navigate(Direction::Prev), now).effects, show(1));

    assert_eq!(resolver.handle(CueCommand::Blank, now).effects, vec![OutputEffect::Clear]);
    assert!(resolver.handle(CueCommand::Blank, now).effects.is_empty());
    // re-showing the current slide after a blank is not a no-op
    assert_eq!(resolver.handle(CueCommand::Navigate(Direction::Index(1)), now).effects, show(1));
}

#[test]
fn test_index_during_load_becomes_first_view() {
    let mut resolver = resolver_with(&[song("A", 4)]);
    let a = resolver.setlist().items()[0].clone();
    let mut reaction = Reaction::default();
    resolver.select(a.id, &mut reaction);

    resolver.handle(CueCommand::Navigate(Direction::Index(3)), Instant::now());
    let reaction = resolver.complete_load(a.id, loaded_for(&a));
    assert_eq!(
        reaction.effects,
        vec![OutputEffect::ShowSlide { item: a.id, slide: 3 }]
    );
}

#[test]
fn test_failed_load_is_reported() {
    let mut resolver = resolver_with(&[video("gone")]);
    let id = resolver.setlist().items()[0].id;
    let mut reaction = Reaction::default();
    resolver.select(id, &mut reaction);

    let reaction = resolver.complete_load(id, Err(SourceError::Unavailable("missing".into())));
    assert_eq!(notices(&reaction), 1);
    assert!(resolver.selection().is_none());
}

// ============================================================================
// Core: action verbs follow the active output
// ============================================================================

#[test]
fn test_verbs_dispatch_by_active_output() {
    let mut resolver = resolver_with(&[song("A", 1), video("loop"), autoplay("Deck")]);
    let now = Instant::now();

    // slides only: every verb is a no-op
    select_and_load(&mut resolver, 0);
    for verb in [ActionVerb::Activate, ActionVerb::LoopOn, ActionVerb::Pause] {
        assert!(resolver.handle(CueCommand::Action(verb), now).effects.is_empty());
    }

    let reaction = select_and_load(&mut resolver, 1);
    let video_id = resolver.setlist().items()[1].id;
    assert_eq!(
        reaction.effects[0],
        OutputEffect::Engage {
            item: video_id,
            kind: OutputKind::Video
        }
    );
    assert_eq!(
        resolver.handle(CueCommand::Action(ActionVerb::Activate), now).effects,
        vec![OutputEffect::Play(OutputKind::Video)]
    );
    resolver.handle(CueCommand::Action(ActionVerb::LoopOn), now);

    // switching to an auto-advancing presentation turns the video loop off first
    let reaction = select_and_load(&mut resolver, 2);
    let loop_off = reaction
        .effects
        .iter()
        .position(|e| {
            *e == OutputEffect::SetLoop {
                kind: OutputKind::Video,
                enabled: false,
            }
        })
        .unwrap();
    let engage = reaction
        .effects
        .iter()
        .position(|e| matches!(e, OutputEffect::Engage { .. }))
        .unwrap();
    assert!(loop_off < engage);

    assert_eq!(
        resolver.handle(CueCommand::Action(ActionVerb::Activate), now).effects,
        vec![OutputEffect::AutoAdvance { running: true }]
    );
}

// ============================================================================
// Actor
// ============================================================================

/// Source with a fixed item list and an artificial delay
struct FakeSource {
    name: &'static str,
    serves: Vec<ItemTypeCode>,
    items: Vec<ItemIdentity>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(name: &'static str, serves: &[ItemTypeCode], items: Vec<ItemIdentity>) -> Self {
        Self {
            name,
            serves: serves.to_vec(),
            items,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    fn serves(&self, type_code: ItemTypeCode) -> bool {
        self.serves.contains(&type_code)
    }

    async fn find(&self, notes: &IdentityNotes) -> Result<Option<ItemIdentity>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.items.iter().find(|i| i.identity_notes() == *notes).cloned())
    }
}

/// Loader with per-title delays
#[derive(Default)]
struct FakeLoader {
    delays: HashMap<String, Duration>,
}

#[async_trait]
impl ItemLoader for FakeLoader {
    async fn load(&self, item: &SetlistItem) -> Result<LoadedItem, SourceError> {
        if let Some(delay) = self.delays.get(item.identity.title()) {
            tokio::time::sleep(*delay).await;
        }
        loaded_for(item)
    }
}

#[derive(Default)]
struct RecordingDriver {
    effects: Mutex<Vec<OutputEffect>>,
}

#[async_trait]
impl OutputDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn apply(&self, effect: &OutputEffect) -> anyhow::Result<()> {
        self.effects.lock().push(effect.clone());
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Harness {
    handle: ResolverHandle,
    driver: Arc<RecordingDriver>,
}

fn spawn_actor(
    setlist: Setlist,
    config: ResolverConfig,
    sources: ItemSources,
    loader: FakeLoader,
    store: Option<SetlistStore>,
) -> Harness {
    let driver = Arc::new(RecordingDriver::default());
    let handle = ResolverActor::spawn(
        Resolver::new(config, setlist),
        ResolverContext {
            sources,
            loader: Arc::new(loader),
            drivers: vec![driver.clone() as Arc<dyn OutputDriver>],
            store,
        },
    );
    Harness { handle, driver }
}

#[tokio::test]
async fn test_actor_external_lookup_appends_and_persists() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("setlist.sled");
    let clip = video("walk-in");
    let media = Arc::new(FakeSource::new("media", &[ItemTypeCode::Media], vec![clip.clone()]));

    let harness = spawn_actor(
        Setlist::new(),
        ResolverConfig::default(),
        ItemSources {
            text: vec![],
            external: vec![media.clone() as Arc<dyn ItemSource>],
        },
        FakeLoader::default(),
        Some(SetlistStore::open(&db_path).unwrap()),
    );

    harness.handle.send(typed_identify(&clip));
    harness.handle.flush().await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.setlist.len(), 1);
    assert_eq!(snapshot.selection.map(|s| s.item), Some(snapshot.setlist[0].id));
    assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    assert!(harness.driver.effects.lock().contains(&OutputEffect::Engage {
        item: snapshot.setlist[0].id,
        kind: OutputKind::Video
    }));

    harness.handle.shutdown().await;
    let restored = SetlistStore::open(&db_path).unwrap().load();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].identity, clip);
}

#[tokio::test]
async fn test_actor_blank_cancels_slow_lookup() {
    let clip = video("slow");
    let media = FakeSource::new("media", &[ItemTypeCode::Media], vec![clip.clone()])
        .with_delay(Duration::from_millis(100));

    let harness = spawn_actor(
        Setlist::new(),
        ResolverConfig::default(),
        ItemSources {
            text: vec![],
            external: vec![Arc::new(media) as Arc<dyn ItemSource>],
        },
        FakeLoader::default(),
        None,
    );

    harness.handle.send(typed_identify(&clip));
    harness.handle.send(CueCommand::Blank);
    harness.handle.flush().await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert!(snapshot.setlist.is_empty());
    assert!(snapshot.selection.is_none());
    assert_eq!(*harness.driver.effects.lock(), vec![OutputEffect::Clear]);
}

#[tokio::test]
async fn test_actor_commands_not_blocked_by_lookup() {
    let text = FakeSource::new("songs", &[ItemTypeCode::Song], vec![])
        .with_delay(Duration::from_millis(300));
    let harness = spawn_actor(
        Setlist::new(),
        ResolverConfig::default(),
        ItemSources {
            text: vec![Arc::new(text) as Arc<dyn ItemSource>],
            external: vec![],
        },
        FakeLoader::default(),
        None,
    );

    harness.handle.send(typed_identify(&song("Slow", 1)));
    harness.handle.send(CueCommand::Blank);
    let snapshot = tokio::time::timeout(Duration::from_millis(100), harness.handle.snapshot())
        .await
        .expect("snapshot blocked behind lookup")
        .unwrap();
    assert_eq!(snapshot.epoch.clear_gen, 1);
}

#[tokio::test]
async fn test_actor_lookup_timeout_counts_as_not_found() {
    let hymn = song("Hymn", 1);
    let text = FakeSource::new("songs", &[ItemTypeCode::Song], vec![hymn.clone()])
        .with_delay(Duration::from_millis(500));
    let config = ResolverConfig {
        lookup_timeout: Duration::from_millis(20),
        ..ResolverConfig::default()
    };
    let harness = spawn_actor(
        Setlist::new(),
        config,
        ItemSources {
            text: vec![Arc::new(text) as Arc<dyn ItemSource>],
            external: vec![],
        },
        FakeLoader::default(),
        None,
    );

    harness.handle.send(typed_identify(&hymn));
    harness.handle.flush().await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert!(snapshot.setlist.is_empty());
    assert_eq!(snapshot.warnings_emitted, 1);
}

#[tokio::test]
async fn test_actor_slow_load_superseded_by_later_selection() {
    let mut setlist = Setlist::new();
    let slow = setlist.append(song("Slow", 2)).id;
    let fast = setlist.append(song("Fast", 2)).id;
    let loader = FakeLoader {
        delays: HashMap::from([("Slow".to_string(), Duration::from_millis(80))]),
    };
    let harness = spawn_actor(setlist, ResolverConfig::default(), ItemSources::default(), loader, None);

    assert!(harness.handle.select(slow).await);
    assert!(harness.handle.select(fast).await);
    assert!(!harness.handle.select(ItemId(42)).await);
    harness.handle.flush().await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.selection.map(|s| s.item), Some(fast));
    let effects = harness.driver.effects.lock();
    assert_eq!(*effects, vec![OutputEffect::ShowSlide { item: fast, slide: 0 }]);
}
